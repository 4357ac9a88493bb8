//! gNMI and gNOI protocol bindings.
//!
//! Message definitions follow `gnmi.proto` (package `gnmi`) and the gNOI
//! `system`, `os`, `file` and `cert` services, restricted to the fields the
//! southbound bridge uses. Field tags match the upstream protos so the
//! messages interoperate with real targets; unused and deprecated fields
//! are left out (protobuf skips unknown fields on decode).
//!
//! - [`gnmi`]: `Capabilities`, `Get`, `Set`, `Subscribe` messages and the
//!   [`gnmi::GnmiClient`] stub
//! - [`gnoi`]: operational RPCs (time, reboot, OS verify, file stat/remove,
//!   certificate listing) and their client stubs

pub mod gnmi;
pub mod gnoi;

mod client;

pub use client::RpcClient;
