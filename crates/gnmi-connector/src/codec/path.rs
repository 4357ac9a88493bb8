//! Identifier ⇄ gNMI path mapping and the textual path syntax.

use std::sync::Arc;

use gnmi_proto::gnmi::{Path, PathElem};
use gnmi_yang::{DataSchemaNode, LeafValue, NodeIdentifier, PathArgument, QName, SchemaContext};

use crate::error::{CodecError, CodecResult};

/// Encodes identifiers to gNMI paths and decodes paths back against a schema.
#[derive(Debug, Clone)]
pub struct PathCodec {
    schema: Arc<SchemaContext>,
    prefix_module_name: bool,
}

impl PathCodec {
    /// Creates a codec.
    ///
    /// With `prefix_module_name`, the first element is written as
    /// `module-name:element`; nothing else carries a prefix.
    pub fn new(schema: Arc<SchemaContext>, prefix_module_name: bool) -> Self {
        Self {
            schema,
            prefix_module_name,
        }
    }

    pub fn schema(&self) -> &Arc<SchemaContext> {
        &self.schema
    }

    pub fn prefix_module_name(&self) -> bool {
        self.prefix_module_name
    }

    /// Encodes an identifier. The root encodes to a path without elements.
    pub fn encode(&self, id: &NodeIdentifier) -> CodecResult<Path> {
        let mut elems = Vec::with_capacity(id.len());
        for (index, step) in id.steps().iter().enumerate() {
            let name = step.name();
            let mut elem = PathElem::new(name.local_name());
            if index == 0 && self.prefix_module_name {
                let module = self
                    .schema
                    .module_by_namespace(&name.namespace)
                    .ok_or_else(|| CodecError::UnknownNamespace(name.namespace.clone()))?;
                elem.name = format!("{}:{}", module.name, name.local_name());
            }
            for (key, value) in step.keys() {
                elem.key
                    .insert(key.local_name().to_string(), value.to_key_string());
            }
            elems.push(elem);
        }
        Ok(Path {
            elem: elems,
            ..Default::default()
        })
    }

    /// Decodes a path; an empty path is the root.
    pub fn decode(&self, path: &Path) -> CodecResult<NodeIdentifier> {
        self.decode_elems(&path.elem)
    }

    /// Decodes `prefix` + `path`, as found in notifications.
    pub fn decode_with_prefix(&self, prefix: Option<&Path>, path: &Path) -> CodecResult<NodeIdentifier> {
        match prefix {
            Some(prefix) if !prefix.elem.is_empty() => {
                let elems: Vec<PathElem> = prefix.elem.iter().chain(&path.elem).cloned().collect();
                self.decode_elems(&elems)
            }
            _ => self.decode_elems(&path.elem),
        }
    }

    /// Decodes a textual path such as `/interfaces/interface[name=eth0]`.
    pub fn decode_str(&self, text: &str) -> CodecResult<NodeIdentifier> {
        self.decode_elems(&parse_path(text)?)
    }

    fn decode_elems(&self, elems: &[PathElem]) -> CodecResult<NodeIdentifier> {
        let mut steps: Vec<PathArgument> = Vec::with_capacity(elems.len());
        let mut candidates: &[DataSchemaNode] = self.schema.root_nodes();

        for elem in elems {
            let parent = || NodeIdentifier::from_steps(steps.clone()).to_string();
            let (namespace, local) = match elem.name.split_once(':') {
                Some((module, local)) => (Some(self.module_namespace(module, &elem.name, &parent)?), local),
                None => (None, elem.name.as_str()),
            };
            let node = candidates
                .iter()
                .find(|n| {
                    n.qname().name == local && namespace.map_or(true, |ns| n.qname().namespace == ns)
                })
                .ok_or_else(|| CodecError::UnknownElement {
                    element: elem.name.clone(),
                    parent: parent(),
                })?;

            let step = if elem.key.is_empty() {
                PathArgument::Node(node.qname().clone())
            } else if node.is_list() {
                PathArgument::Entry {
                    name: node.qname().clone(),
                    keys: decode_keys(node, elem)?,
                }
            } else {
                let key = elem.key.keys().next().cloned().unwrap_or_default();
                return Err(CodecError::invalid_key(local, key, "element is not a list"));
            };

            steps.push(step);
            candidates = node.children();
        }

        Ok(NodeIdentifier::from_steps(steps))
    }

    fn module_namespace(
        &self,
        module: &str,
        element: &str,
        parent: &dyn Fn() -> String,
    ) -> CodecResult<&str> {
        self.schema
            .module_by_name(module)
            .or_else(|| {
                self.schema
                    .modules()
                    .iter()
                    .find(|m| m.prefix.as_deref() == Some(module))
            })
            .map(|m| m.namespace.as_str())
            .ok_or_else(|| CodecError::UnknownElement {
                element: element.to_string(),
                parent: parent(),
            })
    }
}

/// Builds key predicates in schema key order, typed by the key leaves.
fn decode_keys(list: &DataSchemaNode, elem: &PathElem) -> CodecResult<Vec<(QName, LeafValue)>> {
    let list_name = list.qname().local_name();
    if let Some(unknown) = elem
        .key
        .keys()
        .find(|k| !list.list_keys().iter().any(|q| q.local_name() == k.as_str()))
    {
        return Err(CodecError::invalid_key(list_name, unknown.clone(), "not a key of this list"));
    }

    list.list_keys()
        .iter()
        .map(|key| {
            let text = elem
                .key
                .get(key.local_name())
                .ok_or_else(|| CodecError::invalid_key(list_name, key.local_name(), "missing key predicate"))?;
            let ty = list
                .child_by_qname(key)
                .and_then(DataSchemaNode::leaf_type)
                .ok_or_else(|| CodecError::invalid_key(list_name, key.local_name(), "key leaf has no type"))?;
            let value = ty
                .parse_value(text)
                .map_err(|e| CodecError::invalid_key(list_name, key.local_name(), e.to_string()))?;
            Ok((key.clone(), value))
        })
        .collect()
}

/// Splits a textual path into elements.
///
/// `/` separates elements, `[`...`]` delimits a predicate block, `;`
/// separates predicates inside a block and each predicate is `key=value`.
/// Several blocks may follow one name (`a[x=1][y=2]`). A backslash escapes
/// the next character. `""` and `"/"` are the root.
pub fn parse_path(text: &str) -> CodecResult<Vec<PathElem>> {
    let malformed = |message: &str| CodecError::MalformedPath {
        path: text.to_string(),
        message: message.to_string(),
    };

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_block = false;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().ok_or_else(|| malformed("dangling escape"))?;
                current.push('\\');
                current.push(escaped);
            }
            '[' if in_block => return Err(malformed("nested '['")),
            '[' => {
                in_block = true;
                current.push(c);
            }
            ']' if !in_block => return Err(malformed("unbalanced ']'")),
            ']' => {
                in_block = false;
                current.push(c);
            }
            '/' if !in_block => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if in_block {
        return Err(malformed("unterminated predicate block"));
    }
    segments.push(current);

    // A leading and a trailing separator are tolerated; empty inner segments are not.
    if segments.first().is_some_and(String::is_empty) {
        segments.remove(0);
    }
    if segments.last().is_some_and(String::is_empty) {
        segments.pop();
    }

    segments
        .iter()
        .map(|segment| parse_segment(segment).map_err(|message| malformed(message)))
        .collect()
}

fn parse_segment(segment: &str) -> Result<PathElem, &'static str> {
    let mut chars = segment.chars();
    let mut name = String::new();
    let mut has_block = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => name.push(chars.next().ok_or("dangling escape")?),
            '[' => {
                has_block = true;
                break;
            }
            _ => name.push(c),
        }
    }
    if name.is_empty() {
        return Err("empty element name");
    }

    let mut elem = PathElem::new(name);
    while has_block {
        let mut key = String::new();
        let mut value = String::new();
        let mut in_value = false;
        loop {
            let c = chars.next().ok_or("unterminated predicate block")?;
            match c {
                '\\' => {
                    let escaped = chars.next().ok_or("dangling escape")?;
                    if in_value {
                        value.push(escaped);
                    } else {
                        key.push(escaped);
                    }
                }
                '=' if !in_value => in_value = true,
                ';' | ']' => {
                    if !in_value || key.is_empty() {
                        return Err("predicate must have the form key=value");
                    }
                    elem.key
                        .insert(std::mem::take(&mut key), std::mem::take(&mut value));
                    in_value = false;
                    if c == ']' {
                        break;
                    }
                }
                _ if in_value => value.push(c),
                _ => key.push(c),
            }
        }
        has_block = match chars.next() {
            None => false,
            Some('[') => true,
            Some(_) => return Err("unexpected text after predicate block"),
        };
    }
    Ok(elem)
}

/// Renders elements in the syntax accepted by [`parse_path`].
pub fn format_path(elems: &[PathElem]) -> String {
    if elems.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for elem in elems {
        out.push('/');
        out.push_str(&escape(&elem.name, &['/', '[', ']', '\\']));
        if !elem.key.is_empty() {
            let predicates: Vec<String> = elem
                .key
                .iter()
                .map(|(k, v)| {
                    format!(
                        "{}={}",
                        escape(k, &['=', ';', '[', ']', '\\']),
                        escape(v, &[';', '[', ']', '\\'])
                    )
                })
                .collect();
            out.push('[');
            out.push_str(&predicates.join(";"));
            out.push(']');
        }
    }
    out
}

fn escape(text: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testing::*;
    use pretty_assertions::assert_eq;

    fn route(prefix: &str, vrf: &str) -> NodeIdentifier {
        NodeIdentifier::root().node(rtq("routes")).entry(
            rtq("route"),
            vec![
                (rtq("prefix"), LeafValue::from(prefix)),
                (rtq("vrf"), LeafValue::from(vrf)),
            ],
        )
    }

    #[test]
    fn test_root_is_empty_path() {
        let codec = PathCodec::new(schema(), true);
        let path = codec.encode(&NodeIdentifier::root()).unwrap();
        assert!(path.elem.is_empty());
        assert_eq!(codec.decode(&path).unwrap(), NodeIdentifier::root());
    }

    #[test]
    fn test_encode_list_entry() {
        let codec = PathCodec::new(schema(), false);
        let path = codec.encode(&interface("eth0").node(ifq("config"))).unwrap();
        assert_eq!(
            path.elem,
            vec![
                PathElem::new("interfaces"),
                PathElem::new("interface").with_key("name", "eth0"),
                PathElem::new("config"),
            ]
        );
    }

    #[test]
    fn test_module_prefix_only_on_first_element() {
        let codec = PathCodec::new(schema(), true);
        let path = codec.encode(&interface("eth0")).unwrap();
        assert_eq!(path.elem[0].name, "openconfig-interfaces:interfaces");
        assert_eq!(path.elem[1].name, "interface");
    }

    #[test]
    fn test_round_trip() {
        let ids = vec![
            NodeIdentifier::root().node(ifq("interfaces")),
            interface("eth0").node(ifq("config")).node(ifq("mtu")),
            route("10.0.0.0/8", "default").node(rtq("metric")),
            NodeIdentifier::root().node(rtq("routes")).entry(
                rtq("route"),
                vec![
                    (rtq("vrf"), LeafValue::from("default")),
                    (rtq("prefix"), LeafValue::from("10.0.0.0/8")),
                ],
            ),
            interface("Ethernet0/1")
                .node(ethq("ethernet"))
                .node(ethq("port-speed")),
        ];
        for prefix in [false, true] {
            let codec = PathCodec::new(schema(), prefix);
            for id in &ids {
                let path = codec.encode(id).unwrap();
                assert_eq!(&codec.decode(&path).unwrap(), id);
            }
        }
    }

    #[test]
    fn test_enum_key_uses_symbolic_name() {
        let codec = PathCodec::new(schema(), false);
        let id = NodeIdentifier::root().entry(
            rtq("route"),
            vec![(rtq("protocol"), LeafValue::Enum("BGP".into()))],
        );
        let path = codec.encode(&id).unwrap();
        assert_eq!(path.elem[0].key.get("protocol").map(String::as_str), Some("BGP"));
    }

    #[test]
    fn test_decode_types_keys_from_schema() {
        let codec = PathCodec::new(schema(), false);
        let id = codec
            .decode_str("/routes/route[vrf=red;prefix=10.1.0.0/16]")
            .unwrap();
        assert_eq!(id, route("10.1.0.0/16", "red"));
    }

    #[test]
    fn test_decode_with_prefix() {
        let codec = PathCodec::new(schema(), false);
        let prefix = Path {
            elem: parse_path("/interfaces/interface[name=eth0]").unwrap(),
            ..Default::default()
        };
        let path = Path {
            elem: parse_path("config/mtu").unwrap(),
            ..Default::default()
        };
        let id = codec.decode_with_prefix(Some(&prefix), &path).unwrap();
        assert_eq!(id, interface("eth0").node(ifq("config")).node(ifq("mtu")));
    }

    #[test]
    fn test_decode_errors() {
        let codec = PathCodec::new(schema(), false);
        assert!(matches!(
            codec.decode_str("/interfaces/bogus"),
            Err(CodecError::UnknownElement { .. })
        ));
        assert!(matches!(
            codec.decode_str("/interfaces/interface[nam=eth0]"),
            Err(CodecError::InvalidKey { .. })
        ));
        assert!(matches!(
            codec.decode_str("/routes/route[prefix=10.0.0.0/8]"),
            Err(CodecError::InvalidKey { .. })
        ));
        assert!(matches!(
            codec.decode_str("/interfaces[name=x]"),
            Err(CodecError::InvalidKey { .. })
        ));
        assert!(matches!(
            codec.decode_str("/unknown-module:interfaces"),
            Err(CodecError::UnknownElement { .. })
        ));
    }

    #[test]
    fn test_decode_accepts_module_prefix() {
        let codec = PathCodec::new(schema(), false);
        let by_name = codec.decode_str("/openconfig-interfaces:interfaces").unwrap();
        let by_prefix = codec.decode_str("/oc-if:interfaces").unwrap();
        assert_eq!(by_name, NodeIdentifier::root().node(ifq("interfaces")));
        assert_eq!(by_name, by_prefix);
    }

    #[test]
    fn test_parse_path_tokens() {
        let elems = parse_path("/routes/route[prefix=10.0.0.0/8;vrf=default]/metric").unwrap();
        assert_eq!(
            elems,
            vec![
                PathElem::new("routes"),
                PathElem::new("route")
                    .with_key("prefix", "10.0.0.0/8")
                    .with_key("vrf", "default"),
                PathElem::new("metric"),
            ]
        );

        let split_blocks = parse_path("route[prefix=10.0.0.0/8][vrf=default]").unwrap();
        assert_eq!(split_blocks[0], elems[1]);

        assert!(parse_path("").unwrap().is_empty());
        assert!(parse_path("/").unwrap().is_empty());
    }

    #[test]
    fn test_parse_path_escapes() {
        let elems = parse_path(r"/a/b[k=x\]y\;z]").unwrap();
        assert_eq!(elems[1].key.get("k").map(String::as_str), Some("x]y;z"));
        assert_eq!(parse_path(&format_path(&elems)).unwrap(), elems);
    }

    #[test]
    fn test_parse_path_errors() {
        for bad in ["/a[k=v", "/a]", "/a[k]", "/a[[k=v]]", "/a//b", "/a[k=v]x", "/a\\"] {
            assert!(
                matches!(parse_path(bad), Err(CodecError::MalformedPath { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_format_path() {
        let elems = parse_path("/interfaces/interface[name=eth0]/config").unwrap();
        assert_eq!(format_path(&elems), "/interfaces/interface[name=eth0]/config");
        assert_eq!(format_path(&[]), "/");
    }
}
