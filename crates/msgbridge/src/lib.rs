//! Top-level facade crate for msgbridge.
//!
//! Re-exports the wire contracts and the host library so users can depend on a single crate.

pub mod core {
    pub use msgbridge_core::*;
}

pub mod host {
    pub use msgbridge_host::*;
}

pub use msgbridge_core::protocol::{Envelope, Request};
pub use msgbridge_core::{ErrorCode, MsgBridgeError, Result};
pub use msgbridge_host::{ExecutionContext, MessageProtocol};
