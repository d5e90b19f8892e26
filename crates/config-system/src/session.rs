//! Session persistence for runtime threshold overrides
//!
//! The only persisted state in the system: an opaque key/value store holds a
//! JSON-encoded `ThresholdConfig` so a runtime override survives for the
//! session. Everything else is reconstructed on startup.

use crate::{ConfigError, Result};
use shared_types::ThresholdConfig;
use std::collections::HashMap;

/// Storage key for threshold overrides.
pub const THRESHOLDS_SESSION_KEY: &str = "hybrid-renderer-thresholds";

/// Opaque key/value store supplied by the runtime.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str);
}

/// In-memory store for tests and headless use.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: HashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// Read a persisted threshold override. Malformed payloads are discarded
/// with a warning rather than failing engine construction.
pub fn load_overrides(store: &dyn SessionStore) -> Option<ThresholdConfig> {
    let raw = store.get(THRESHOLDS_SESSION_KEY)?;
    match serde_json::from_str(&raw) {
        Ok(thresholds) => Some(thresholds),
        Err(error) => {
            log::warn!("discarding malformed threshold override: {error}");
            None
        }
    }
}

/// Persist a threshold override for the rest of the session.
pub fn save_overrides(store: &mut dyn SessionStore, thresholds: &ThresholdConfig) -> Result<()> {
    let raw = serde_json::to_string(thresholds)
        .map_err(|error| ConfigError::Serialization(error.to_string()))?;
    store.set(THRESHOLDS_SESSION_KEY, raw);
    Ok(())
}
