//! `sys/*`: liveness and echo, answered through the `.response` convention.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use msgbridge_core::error::Result;
use msgbridge_core::protocol::{Envelope, Request};

use crate::dispatch::MessageProtocol;

#[derive(Debug, Deserialize)]
pub struct Ping {
    #[serde(default)]
    pub nonce: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Pong {
    pub nonce: Option<String>,
    pub version: &'static str,
}

impl Request for Ping {
    const TYPE: &'static str = "sys/ping";
    type Output = Pong;
}

pub const ECHO: &str = "sys/echo";

pub fn register(protocol: &MessageProtocol) {
    protocol.handle(ping);
    protocol.register_handler(ECHO, echo);
}

async fn ping(req: Ping) -> Result<Pong> {
    Ok(Pong {
        nonce: req.nonce,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn echo(req: Envelope) -> Result<Value> {
    Ok(req.into_payload())
}
