//! Protocol modules.
//!
//! - `envelope`: wire shape, error envelopes, boundary validation.
//! - `mapping`: response-type derivation (declared table + convention).
//! - `request`: typed request contract for per-type payload typing.
//!
//! Decoding is panic-free: malformed input is reported as `MsgBridgeError`
//! so a misbehaving presentation side cannot take the host down.

pub mod envelope;
pub mod mapping;
pub mod request;

pub use envelope::{create_error_response, decode_envelope, Envelope, ErrorPayload, ERROR_TYPE};
pub use mapping::{
    convention_response_type, create_convention_response, create_response, RequestType,
    ResponseType, RESPONSE_SUFFIX,
};
pub use request::Request;
