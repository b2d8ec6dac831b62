use std::collections::HashMap;
use std::sync::Mutex;

/// Key under which the pending code verifier is kept.
pub const VERIFIER_KEY: &str = "playlist_paste_code_verifier";

/// Session-scoped key/value store. Values live only as long as the session
/// and are never written to durable storage.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value);
        }
    }

    fn remove(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.remove(key)
    }
}
