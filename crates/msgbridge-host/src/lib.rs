//! msgbridge host library entry.
//!
//! This crate wires the transport binding, handler registry, dispatch engine,
//! execution context, and built-in services into the privileged side of the
//! bridge. It is consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod obs;
pub mod services;
pub mod transport;

pub use context::ExecutionContext;
pub use dispatch::{EventSender, MessageProtocol};
