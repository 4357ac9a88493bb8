//! Southbound gNMI connector.
//!
//! This crate makes a remote gNMI target look like a transactional,
//! tree-structured data store:
//!
//! - [`session`]: sessions over pooled, reference-counted gRPC channels
//!   ([`SessionManager`]) plus a scriptable [`session::mock`] for tests
//! - [`codec`]: identifier ⇄ `Path` and node ⇄ `Update` mapping (RFC 7951 JSON)
//! - [`broker`]: read-only, write-only and read-write transactions on top of
//!   Get and Set
//! - [`error`]: error types of the three layers
//!
//! # Example
//!
//! ```ignore
//! use gnmi_connector::{
//!     broker::{BrokerOptions, GnmiDataBroker, LogicalDatastore},
//!     codec::{JsonEncoding, PathCodec, UpdateCodec},
//!     session::{ConnectionParams, SessionManager},
//! };
//!
//! let manager = SessionManager::default();
//! let handle = manager.open_session(&ConnectionParams::plaintext("10.0.0.1:9339"))?;
//! let codec = UpdateCodec::new(PathCodec::new(schema, false), JsonEncoding::JsonIetf);
//! let broker = GnmiDataBroker::new("leaf1", handle.session().clone(), codec, BrokerOptions::default());
//!
//! let tx = broker.new_write_only_transaction();
//! tx.delete(LogicalDatastore::Configuration, id)?;
//! tx.commit().await?;
//! manager.release_session(handle).await?;
//! ```

pub mod broker;
pub mod codec;
pub mod error;
pub mod session;

pub use broker::{GnmiDataBroker, LogicalDatastore};
pub use codec::{JsonEncoding, PathCodec, UpdateCodec};
pub use error::{BrokerError, BrokerResult, CodecError, CodecResult, SessionError, SessionResult};
pub use session::{ConnectionParams, GnmiSession, SessionHandle, SessionManager, SessionProvider};
