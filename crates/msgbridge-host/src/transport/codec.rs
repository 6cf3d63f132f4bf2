//! Newline-delimited JSON framing for byte-stream channels.
//!
//! - one JSON value per line; serde_json never emits raw newlines
//! - blank lines carry nothing and are skipped by the reader

use bytes::Bytes;
use serde_json::Value;

use msgbridge_core::error::{MsgBridgeError, Result};

/// Encode a value as one framed line (trailing `\n` included).
pub fn encode_line(value: &Value) -> Result<Bytes> {
    let mut buf = serde_json::to_vec(value)
        .map_err(|e| MsgBridgeError::Transport(format!("json encode failed: {e}")))?;
    buf.push(b'\n');
    Ok(Bytes::from(buf))
}

/// Decode one line (without its terminator). `None` for blank lines.
pub fn decode_line(line: &[u8]) -> Option<Result<Value>> {
    let line = trim_ascii(line);
    if line.is_empty() {
        return None;
    }
    Some(
        serde_json::from_slice(line)
            .map_err(|e| MsgBridgeError::BadEnvelope(format!("invalid json line: {e}"))),
    )
}

fn trim_ascii(mut s: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = s {
        if first.is_ascii_whitespace() {
            s = rest;
        } else {
            break;
        }
    }
    while let [rest @ .., last] = s {
        if last.is_ascii_whitespace() {
            s = rest;
        } else {
            break;
        }
    }
    s
}
