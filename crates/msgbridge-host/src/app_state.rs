//! Shared application state for the msgbridge host.
//!
//! - Build the execution context once from config and hand it to the protocol.
//! - Register built-in services.
//! - Make startup errors explicit (Result instead of panic).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use msgbridge_core::error::Result;

use crate::config::BridgeConfig;
use crate::context::ExecutionContext;
use crate::dispatch::MessageProtocol;
use crate::services;

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<BridgeConfig>,
    protocol: MessageProtocol,
}

impl AppState {
    pub fn new(cfg: BridgeConfig) -> Result<Self> {
        cfg.validate()?;

        if let Some(root) = &cfg.host.workspace_root {
            if !root.is_dir() {
                tracing::warn!(root = %root.display(), "workspace_root is not a directory");
            }
        }

        let ctx = Arc::new(ExecutionContext::in_memory(cfg.host.workspace_root.clone()));
        let protocol = MessageProtocol::new(ctx);
        services::register_builtin(&protocol);

        tracing::debug!(types = ?protocol.registered_types(), "built-in handlers registered");

        Ok(Self {
            cfg: Arc::new(cfg),
            protocol,
        })
    }

    pub fn cfg(&self) -> &BridgeConfig {
        &self.cfg
    }

    pub fn protocol(&self) -> &MessageProtocol {
        &self.protocol
    }

    /// Start background collaborators (HEAD watcher) if configured.
    /// Must be called inside a tokio runtime.
    pub fn spawn_watchers(&self) -> Option<JoinHandle<()>> {
        let root = self.cfg.host.workspace_root.clone()?;
        if self.cfg.host.watch_interval_ms == 0 {
            return None;
        }
        Some(services::repo::spawn_head_watcher(
            self.protocol.event_sender(),
            root,
            Duration::from_millis(self.cfg.host.watch_interval_ms),
        ))
    }
}
