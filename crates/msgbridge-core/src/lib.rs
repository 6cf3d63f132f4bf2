//! msgbridge core: wire contracts shared by the host and the presentation side.
//!
//! This crate defines the envelope format, the error-code taxonomy, and the
//! closed request/response mapping table. It carries no transport or runtime
//! dependencies so the same contracts can be reused by test harnesses and
//! alternative hosts.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed input coming from the far side of the channel surfaces as
//! `MsgBridgeError` instead of crashing the host.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorCode, MsgBridgeError, Result};
