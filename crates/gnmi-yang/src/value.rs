//! Scalar leaf values and leaf types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ParseError;

/// Scalar value carried by a leaf, leaf-list member or list key.
///
/// The set is closed on purpose: codecs match on it exhaustively. Integer
/// variants keep only the signedness class, not the declared bit width; the
/// width lives in the schema ([`LeafType`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeafValue {
    /// `boolean`
    Bool(bool),
    /// Any signed integer width (`int8` .. `int64`).
    Int(i64),
    /// Any unsigned integer width (`uint8` .. `uint64`).
    Uint(u64),
    /// `string` and anything without a closer scalar mapping.
    String(String),
    /// `enumeration`, held by its symbolic name.
    Enum(String),
}

impl LeafValue {
    /// Returns the textual form used in key predicates and JSON strings.
    ///
    /// Enumerations render as their symbolic name, never an ordinal.
    pub fn to_key_string(&self) -> String {
        match self {
            LeafValue::Bool(b) => b.to_string(),
            LeafValue::Int(i) => i.to_string(),
            LeafValue::Uint(u) => u.to_string(),
            LeafValue::String(s) | LeafValue::Enum(s) => s.clone(),
        }
    }

    /// Returns the name of the value class, for diagnostics.
    pub fn class_name(&self) -> &'static str {
        match self {
            LeafValue::Bool(_) => "boolean",
            LeafValue::Int(_) => "signed integer",
            LeafValue::Uint(_) => "unsigned integer",
            LeafValue::String(_) => "string",
            LeafValue::Enum(_) => "enumeration",
        }
    }
}

impl fmt::Display for LeafValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key_string())
    }
}

impl From<bool> for LeafValue {
    fn from(b: bool) -> Self {
        LeafValue::Bool(b)
    }
}

impl From<i64> for LeafValue {
    fn from(i: i64) -> Self {
        LeafValue::Int(i)
    }
}

impl From<u64> for LeafValue {
    fn from(u: u64) -> Self {
        LeafValue::Uint(u)
    }
}

impl From<&str> for LeafValue {
    fn from(s: &str) -> Self {
        LeafValue::String(s.to_string())
    }
}

impl From<String> for LeafValue {
    fn from(s: String) -> Self {
        LeafValue::String(s)
    }
}

/// Declared YANG type of a leaf or leaf-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeafType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    String,
    /// Enumeration with its allowed symbolic names.
    Enumeration(Vec<String>),
}

impl LeafType {
    /// Returns the YANG name of this type.
    pub fn name(&self) -> &'static str {
        match self {
            LeafType::Boolean => "boolean",
            LeafType::Int8 => "int8",
            LeafType::Int16 => "int16",
            LeafType::Int32 => "int32",
            LeafType::Int64 => "int64",
            LeafType::Uint8 => "uint8",
            LeafType::Uint16 => "uint16",
            LeafType::Uint32 => "uint32",
            LeafType::Uint64 => "uint64",
            LeafType::String => "string",
            LeafType::Enumeration(_) => "enumeration",
        }
    }

    /// Returns true for 64-bit integers, which RFC 7951 encodes as JSON strings.
    pub fn is_wide_integer(&self) -> bool {
        matches!(self, LeafType::Int64 | LeafType::Uint64)
    }

    fn signed_range(&self) -> Option<(i64, i64)> {
        match self {
            LeafType::Int8 => Some((i8::MIN.into(), i8::MAX.into())),
            LeafType::Int16 => Some((i16::MIN.into(), i16::MAX.into())),
            LeafType::Int32 => Some((i32::MIN.into(), i32::MAX.into())),
            LeafType::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    fn unsigned_max(&self) -> Option<u64> {
        match self {
            LeafType::Uint8 => Some(u8::MAX.into()),
            LeafType::Uint16 => Some(u16::MAX.into()),
            LeafType::Uint32 => Some(u32::MAX.into()),
            LeafType::Uint64 => Some(u64::MAX),
            _ => None,
        }
    }

    fn invalid(&self, value: impl fmt::Display) -> ParseError {
        ParseError::InvalidValue {
            ty: self.name().to_string(),
            value: value.to_string(),
        }
    }

    fn out_of_range(&self, value: impl fmt::Display) -> ParseError {
        ParseError::OutOfRange {
            ty: self.name().to_string(),
            value: value.to_string(),
        }
    }

    /// Parses the textual form of a value (key predicates, RFC 7951 strings).
    pub fn parse_value(&self, text: &str) -> Result<LeafValue, ParseError> {
        match self {
            LeafType::Boolean => match text {
                "true" => Ok(LeafValue::Bool(true)),
                "false" => Ok(LeafValue::Bool(false)),
                _ => Err(self.invalid(text)),
            },
            LeafType::String => Ok(LeafValue::String(text.to_string())),
            LeafType::Enumeration(_) => self.check(LeafValue::Enum(text.to_string())),
            _ if self.signed_range().is_some() => {
                let v: i64 = text.parse().map_err(|_| self.invalid(text))?;
                self.check(LeafValue::Int(v))
            }
            _ => {
                let v: u64 = text.parse().map_err(|_| self.invalid(text))?;
                self.check(LeafValue::Uint(v))
            }
        }
    }

    /// Converts a value of any class into this type's class, with range checks.
    ///
    /// Numeric values cross the signed/unsigned boundary when they fit;
    /// strings are parsed; everything else must already match.
    pub fn coerce(&self, value: LeafValue) -> Result<LeafValue, ParseError> {
        match (self, value) {
            (_, LeafValue::String(s)) if !matches!(self, LeafType::String) => self.parse_value(&s),
            (LeafType::String, LeafValue::Enum(s)) => Ok(LeafValue::String(s)),
            (LeafType::Enumeration(_), LeafValue::Enum(s)) => self.check(LeafValue::Enum(s)),
            (_, LeafValue::Uint(u)) if self.signed_range().is_some() => {
                let v = i64::try_from(u).map_err(|_| self.out_of_range(u))?;
                self.check(LeafValue::Int(v))
            }
            (_, LeafValue::Int(i)) if self.unsigned_max().is_some() => {
                let v = u64::try_from(i).map_err(|_| self.out_of_range(i))?;
                self.check(LeafValue::Uint(v))
            }
            (_, value) => self.check(value),
        }
    }

    /// Verifies that `value` belongs to this type.
    pub fn check(&self, value: LeafValue) -> Result<LeafValue, ParseError> {
        match (self, &value) {
            (LeafType::Boolean, LeafValue::Bool(_)) => Ok(value),
            (LeafType::String, LeafValue::String(_)) => Ok(value),
            (LeafType::Enumeration(allowed), LeafValue::Enum(name)) => {
                if allowed.iter().any(|a| a == name) {
                    Ok(value)
                } else {
                    Err(ParseError::UnknownEnum {
                        value: name.clone(),
                        allowed: allowed.join("|"),
                    })
                }
            }
            (_, LeafValue::Int(i)) => match self.signed_range() {
                Some((min, max)) if (min..=max).contains(i) => Ok(value),
                Some(_) => Err(self.out_of_range(i)),
                None => Err(self.invalid(i)),
            },
            (_, LeafValue::Uint(u)) => match self.unsigned_max() {
                Some(max) if *u <= max => Ok(value),
                Some(_) => Err(self.out_of_range(u)),
                None => Err(self.invalid(u)),
            },
            (_, other) => Err(self.invalid(other)),
        }
    }
}

impl fmt::Display for LeafType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_string_uses_enum_name() {
        assert_eq!(LeafValue::Enum("ETHERNET".into()).to_key_string(), "ETHERNET");
        assert_eq!(LeafValue::Uint(42).to_key_string(), "42");
        assert_eq!(LeafValue::Bool(false).to_string(), "false");
    }

    #[test]
    fn test_parse_value_by_type() {
        assert_eq!(LeafType::Uint16.parse_value("9100"), Ok(LeafValue::Uint(9100)));
        assert_eq!(LeafType::Int8.parse_value("-5"), Ok(LeafValue::Int(-5)));
        assert_eq!(LeafType::Boolean.parse_value("true"), Ok(LeafValue::Bool(true)));
        assert!(LeafType::Boolean.parse_value("yes").is_err());
        assert!(LeafType::Uint8.parse_value("256").is_err());
    }

    #[test]
    fn test_enum_membership() {
        let ty = LeafType::Enumeration(vec!["UP".into(), "DOWN".into()]);
        assert_eq!(ty.parse_value("UP"), Ok(LeafValue::Enum("UP".into())));
        assert!(matches!(
            ty.parse_value("TESTING"),
            Err(ParseError::UnknownEnum { .. })
        ));
    }

    #[test]
    fn test_coerce_crosses_signedness_when_in_range() {
        assert_eq!(LeafType::Int32.coerce(LeafValue::Uint(7)), Ok(LeafValue::Int(7)));
        assert_eq!(LeafType::Uint32.coerce(LeafValue::Int(7)), Ok(LeafValue::Uint(7)));
        assert!(LeafType::Uint32.coerce(LeafValue::Int(-1)).is_err());
        assert_eq!(
            LeafType::Uint64.coerce(LeafValue::String("18446744073709551615".into())),
            Ok(LeafValue::Uint(u64::MAX))
        );
    }

    #[test]
    fn test_check_rejects_wrong_class() {
        assert!(LeafType::String.check(LeafValue::Bool(true)).is_err());
        assert!(LeafType::Boolean.check(LeafValue::Uint(1)).is_err());
    }

    #[test]
    fn test_leaf_type_serde_names() {
        let ty: LeafType = serde_json::from_str("\"uint32\"").unwrap();
        assert_eq!(ty, LeafType::Uint32);
        let ty: LeafType = serde_json::from_str(r#"{"enumeration":["A","B"]}"#).unwrap();
        assert_eq!(ty, LeafType::Enumeration(vec!["A".into(), "B".into()]));
    }
}
