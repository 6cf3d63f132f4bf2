//! Transport binding.
//!
//! `Channel` abstracts the webview-style pipe (`post_message` out,
//! `on_did_receive_message` in). `Transport` holds at most one attached
//! channel; with nothing attached every send is a silent no-op so the host
//! keeps working while the UI is torn down or not yet rendered.

pub mod codec;
pub mod lines;
pub mod memory;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use msgbridge_core::error::Result;
use msgbridge_core::protocol::Envelope;

pub use lines::LineChannel;
pub use memory::{MemoryChannel, MemoryPeer};

/// Inbound callback registered on a channel.
pub type Intake = Arc<dyn Fn(Value) + Send + Sync>;

/// Bidirectional message channel to the presentation side.
pub trait Channel: Send + Sync {
    /// Deliver one structured message to the far side.
    fn post_message(&self, message: Value) -> Result<()>;
    /// Install the callback invoked for every inbound message.
    /// A later call replaces the earlier callback.
    fn on_did_receive_message(&self, intake: Intake);
}

struct Attached {
    channel: Arc<dyn Channel>,
    generation: u64,
}

/// Slot for the currently attached channel.
#[derive(Default)]
pub struct Transport {
    slot: RwLock<Option<Attached>>,
    generation: AtomicU64,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `channel`, replacing any previous one.
    /// Returns the attachment generation used to tell stale intakes apart.
    pub fn attach(&self, channel: Arc<dyn Channel>) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let previous = self.slot.write().replace(Attached {
            channel,
            generation,
        });
        if let Some(prev) = previous {
            tracing::debug!(replaced = prev.generation, generation, "channel replaced");
        }
        generation
    }

    pub fn detach(&self) {
        if let Some(prev) = self.slot.write().take() {
            tracing::debug!(generation = prev.generation, "channel detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Whether `generation` is still the attached channel.
    pub fn is_current(&self, generation: u64) -> bool {
        self.slot
            .read()
            .as_ref()
            .is_some_and(|a| a.generation == generation)
    }

    /// Forward `envelope` verbatim. Returns `false` when it was dropped
    /// (nothing attached, or the channel refused it). Never errors.
    pub fn send(&self, envelope: &Envelope) -> bool {
        let channel = match self.slot.read().as_ref() {
            Some(a) => Arc::clone(&a.channel),
            None => {
                tracing::trace!(
                    msg_type = %envelope.msg_type(),
                    "no channel attached; send dropped"
                );
                return false;
            }
        };

        match channel.post_message(envelope.to_value()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    msg_type = %envelope.msg_type(),
                    error = %e,
                    "post_message failed; send dropped"
                );
                false
            }
        }
    }
}
