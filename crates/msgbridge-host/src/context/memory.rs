//! In-process capability stores. Contents live as long as the process.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use msgbridge_core::error::Result;

use super::{SecretStorage, StateStore};

#[derive(Default)]
pub struct MemoryStateStore {
    map: DashMap<String, Value>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Option<Value> {
        self.map.get(key).map(|r| r.value().clone())
    }

    async fn update(&self, key: &str, value: Value) -> Result<()> {
        if value.is_null() {
            self.map.remove(key);
        } else {
            self.map.insert(key.to_owned(), value);
        }
        Ok(())
    }

    async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.map.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[derive(Default)]
pub struct MemorySecretStorage {
    map: DashMap<String, String>,
}

impl MemorySecretStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStorage for MemorySecretStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.get(key).map(|r| r.value().clone()))
    }

    async fn store(&self, key: &str, value: &str) -> Result<()> {
        self.map.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.map.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use serde_json::json;

    #[tokio::test]
    async fn state_update_and_remove() {
        let ctx = ExecutionContext::in_memory(None);
        let state = ctx.global_state();
        state.update("b", json!(2)).await.unwrap();
        state.update("a", json!({"x": 1})).await.unwrap();
        assert_eq!(state.get("a").await, Some(json!({"x": 1})));
        assert_eq!(state.keys().await, vec!["a".to_string(), "b".to_string()]);

        state.update("a", Value::Null).await.unwrap();
        assert_eq!(state.get("a").await, None);
        // scopes are independent
        assert_eq!(ctx.workspace_state().get("b").await, None);
    }

    #[tokio::test]
    async fn secrets_round() {
        let ctx = ExecutionContext::in_memory(Some("/work".into()));
        let secrets = ctx.secrets();
        assert_eq!(secrets.get("github").await.unwrap(), None);
        secrets.store("github", "tok").await.unwrap();
        assert_eq!(secrets.get("github").await.unwrap().as_deref(), Some("tok"));
        secrets.delete("github").await.unwrap();
        assert_eq!(secrets.get("github").await.unwrap(), None);
        assert_eq!(ctx.workspace_root(), Some(std::path::Path::new("/work")));
    }
}
