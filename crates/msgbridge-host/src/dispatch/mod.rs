//! Dispatch module exports.
//!
//! Re-exports the protocol, registry, and handler traits so downstream
//! consumers can depend on this module directly.

pub mod dispatcher;
pub mod handler;
pub mod registry;

pub use dispatcher::{EventSender, MessageProtocol};
pub use handler::{Handler, RawHandler, SimpleHandler};
pub use registry::HandlerRegistry;
