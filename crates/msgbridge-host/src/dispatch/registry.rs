//! Handler registry: message type -> handler.
//!
//! One map for both handler styles; inserting under an existing type replaces
//! the entry whatever its style.

use dashmap::DashMap;

use super::handler::Handler;

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, returning the replaced entry if any.
    pub fn insert(&self, msg_type: String, handler: Handler) -> Option<Handler> {
        self.handlers.insert(msg_type, handler)
    }

    pub fn remove(&self, msg_type: &str) -> Option<Handler> {
        self.handlers.remove(msg_type).map(|(_, h)| h)
    }

    /// Clone the entry out so no map guard is held while it runs.
    pub fn get(&self, msg_type: &str) -> Option<Handler> {
        self.handlers.get(msg_type).map(|r| r.value().clone())
    }

    /// Registered types, sorted.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        types.sort();
        types
    }
}
