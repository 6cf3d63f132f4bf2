//! `settings/get` and `settings/update` backed by the context's global state.
//!
//! Updates merge the request object into the stored settings (`null` removes
//! a key), answer with the merged object and push `settings/changed`.
//! Updates are serialized so concurrent merges never overwrite each other.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use msgbridge_core::error::MsgBridgeError;
use msgbridge_core::protocol::mapping::EVENT_SETTINGS_CHANGED;
use msgbridge_core::protocol::{create_response, Envelope, RequestType};

use crate::context::ExecutionContext;
use crate::dispatch::MessageProtocol;

/// Global-state key holding the settings object.
pub const SETTINGS_KEY: &str = "settings";

pub fn register(protocol: &MessageProtocol) {
    protocol.on(RequestType::SettingsGet.as_str(), |_req, ctx| async move {
        let current = load(&ctx).await;
        create_response(RequestType::SettingsGet.as_str(), Value::Object(current))
    });

    let events = protocol.event_sender();
    let write_gate = Arc::new(Mutex::new(()));
    protocol.on(
        RequestType::SettingsUpdate.as_str(),
        move |req: Envelope, ctx: Arc<ExecutionContext>| {
            let events = events.clone();
            let write_gate = Arc::clone(&write_gate);
            async move {
                let Value::Object(patch) = req.into_payload() else {
                    return Err(MsgBridgeError::handler(
                        "settings/update expects an object payload",
                    ));
                };

                // held from read to write
                let _gate = write_gate.lock().await;
                let mut current = load(&ctx).await;
                for (k, v) in patch {
                    if v.is_null() {
                        current.remove(&k);
                    } else {
                        current.insert(k, v);
                    }
                }
                let updated = Value::Object(current);
                ctx.global_state().update(SETTINGS_KEY, updated.clone()).await?;

                events.send_event(Envelope::new(EVENT_SETTINGS_CHANGED, updated.clone()));
                create_response(RequestType::SettingsUpdate.as_str(), updated)
            }
        },
    );
}

async fn load(ctx: &ExecutionContext) -> Map<String, Value> {
    match ctx.global_state().get(SETTINGS_KEY).await {
        Some(Value::Object(map)) => map,
        Some(other) => {
            tracing::warn!(found = %other, "stored settings are not an object; starting empty");
            Map::new()
        }
        None => Map::new(),
    }
}
