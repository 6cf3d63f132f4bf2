//! Execution context handed to raw handlers.
//!
//! Built once at startup and passed into `MessageProtocol::new`; the protocol
//! only forwards it. Capabilities synchronize themselves, so the same context
//! can be used by any number of concurrent handlers.

pub mod memory;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use msgbridge_core::error::Result;

pub use memory::{MemorySecretStorage, MemoryStateStore};

/// Key/value state (process-lifetime or longer-lived scopes).
///
/// Each call is atomic on its own; a `get` followed by `update` is not.
/// Callers doing read-modify-write serialize it themselves.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    /// Store `value`; `Value::Null` removes the key.
    async fn update(&self, key: &str, value: Value) -> Result<()>;
    async fn keys(&self) -> Vec<String>;
}

/// Secret storage (tokens, credentials).
#[async_trait]
pub trait SecretStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn store(&self, key: &str, value: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Privileged capabilities bundle.
#[derive(Clone)]
pub struct ExecutionContext {
    global_state: Arc<dyn StateStore>,
    workspace_state: Arc<dyn StateStore>,
    secrets: Arc<dyn SecretStorage>,
    workspace_root: Option<PathBuf>,
}

impl ExecutionContext {
    pub fn new(
        global_state: Arc<dyn StateStore>,
        workspace_state: Arc<dyn StateStore>,
        secrets: Arc<dyn SecretStorage>,
        workspace_root: Option<PathBuf>,
    ) -> Self {
        Self {
            global_state,
            workspace_state,
            secrets,
            workspace_root,
        }
    }

    /// Context backed entirely by in-process stores.
    pub fn in_memory(workspace_root: Option<PathBuf>) -> Self {
        Self::new(
            Arc::new(MemoryStateStore::new()),
            Arc::new(MemoryStateStore::new()),
            Arc::new(MemorySecretStorage::new()),
            workspace_root,
        )
    }

    pub fn global_state(&self) -> &dyn StateStore {
        self.global_state.as_ref()
    }

    pub fn workspace_state(&self) -> &dyn StateStore {
        self.workspace_state.as_ref()
    }

    pub fn secrets(&self) -> &dyn SecretStorage {
        self.secrets.as_ref()
    }

    pub fn workspace_root(&self) -> Option<&Path> {
        self.workspace_root.as_deref()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("workspace_root", &self.workspace_root)
            .finish_non_exhaustive()
    }
}
