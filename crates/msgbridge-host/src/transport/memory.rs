//! In-process channel pair.
//!
//! `MemoryChannel` is the host end; `MemoryPeer` plays the presentation side
//! (posts requests into the intake, receives whatever the host sends).

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use msgbridge_core::error::{MsgBridgeError, Result};
use msgbridge_core::protocol::{decode_envelope, Envelope};

use super::{Channel, Intake};

type IntakeSlot = Arc<Mutex<Option<Intake>>>;

pub struct MemoryChannel {
    to_peer: mpsc::UnboundedSender<Value>,
    intake: IntakeSlot,
}

pub struct MemoryPeer {
    from_host: mpsc::UnboundedReceiver<Value>,
    intake: IntakeSlot,
}

impl MemoryChannel {
    pub fn pair() -> (MemoryChannel, MemoryPeer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let intake: IntakeSlot = Arc::new(Mutex::new(None));
        (
            MemoryChannel {
                to_peer: tx,
                intake: Arc::clone(&intake),
            },
            MemoryPeer {
                from_host: rx,
                intake,
            },
        )
    }
}

impl Channel for MemoryChannel {
    fn post_message(&self, message: Value) -> Result<()> {
        self.to_peer
            .send(message)
            .map_err(|_| MsgBridgeError::Transport("memory peer dropped".into()))
    }

    fn on_did_receive_message(&self, intake: Intake) {
        *self.intake.lock() = Some(intake);
    }
}

impl MemoryPeer {
    /// Post a message to the host. Returns `false` if nothing listens yet.
    pub fn post(&self, message: Value) -> bool {
        // clone out so the intake runs without the slot locked
        let intake = self.intake.lock().clone();
        match intake {
            Some(f) => {
                f(message);
                true
            }
            None => false,
        }
    }

    pub fn post_envelope(&self, envelope: &Envelope) -> bool {
        self.post(envelope.to_value())
    }

    /// Next message from the host; `None` once the host end is dropped.
    pub async fn recv(&mut self) -> Option<Value> {
        self.from_host.recv().await
    }

    /// Next message decoded as an envelope.
    pub async fn recv_envelope(&mut self) -> Option<Envelope> {
        let value = self.recv().await?;
        decode_envelope(value).ok()
    }

    pub fn try_recv(&mut self) -> Option<Value> {
        self.from_host.try_recv().ok()
    }
}
