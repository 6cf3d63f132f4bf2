//! Built-in handlers wired by the binary.
//!
//! Each module registers its message types on a `MessageProtocol`; together
//! they exercise every registration style (typed, simplified, raw).

pub mod repo;
pub mod settings;
pub mod sys;

use crate::dispatch::MessageProtocol;

pub fn register_builtin(protocol: &MessageProtocol) {
    sys::register(protocol);
    settings::register(protocol);
    repo::register(protocol);
}
