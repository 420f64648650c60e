//! Data plane for portico components.
//!
//! Application payloads are a closed [`Payload`] union. [`encode`] turns one
//! into raw bytes, JSON text, an Arrow IPC blob, or JSON plus a map of
//! referenced blobs. Encoding is pure and synchronous.

#![warn(clippy::pedantic)]

pub mod encode;
pub mod error;
pub mod ipc;
pub mod payload;

pub use encode::{encode, placeholder, EncodedPayload, ARROW_REF_KEY};
pub use error::{DataPlaneError, Result};
pub use ipc::{decode_ipc, encode_ipc};
pub use payload::{classify, Payload, PayloadShape};
