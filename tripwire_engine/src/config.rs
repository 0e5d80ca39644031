//! The configuration interface the engine consumes.
//!
//! Hosts own configuration storage; the engine only reads and writes through
//! this trait. Keys are dot-separated paths (`triggers.repeat.interval`).
//! [`MemoryConfig`] backs tests and standalone use.

use crate::value::Value;
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Split a dot-path key into its segments. Empty segments are dropped, so
/// `a..b` and `a.b` address the same entry.
pub fn split_key(key: &str) -> Vec<&str> {
    key.split('.').filter(|segment| !segment.is_empty()).collect()
}

/// Host-owned configuration storage.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    /// # Errors
    /// Implementation-defined; a failed put leaves the old value in place.
    fn put(&self, key: &str, value: Value) -> Result<()>;

    /// Every leaf key, sorted.
    fn keys(&self) -> Vec<String>;

    /// Whether `key` names a section (a prefix of other keys) rather than a
    /// leaf value.
    fn is_section(&self, key: &str) -> bool;

    /// Re-read from the backing store, discarding unsaved changes.
    ///
    /// # Errors
    /// Implementation-defined.
    fn reload(&self) -> Result<()>;

    /// Flush pending changes to the backing store.
    ///
    /// # Errors
    /// Implementation-defined.
    fn save_all(&self) -> Result<()>;

    /// Stop accepting writes; called when the host shuts the engine down.
    fn disable(&self);
}

/// In-memory [`ConfigSource`] with no backing store; `reload` and `save_all`
/// are no-ops.
#[derive(Default)]
pub struct MemoryConfig {
    entries: Mutex<BTreeMap<String, Value>>,
    disabled: Mutex<bool>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(key: &str) -> String {
        split_key(key).join(".")
    }
}

impl ConfigSource for MemoryConfig {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .lock()
            .expect("config lock poisoned")
            .get(&Self::normalize(key))
            .cloned()
    }

    fn put(&self, key: &str, value: Value) -> Result<()> {
        if *self.disabled.lock().expect("config lock poisoned") {
            anyhow::bail!("configuration is disabled");
        }
        self.entries
            .lock()
            .expect("config lock poisoned")
            .insert(Self::normalize(key), value);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("config lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    fn is_section(&self, key: &str) -> bool {
        let prefix = format!("{}.", Self::normalize(key));
        self.entries
            .lock()
            .expect("config lock poisoned")
            .keys()
            .any(|k| k.starts_with(&prefix))
    }

    fn reload(&self) -> Result<()> {
        Ok(())
    }

    fn save_all(&self) -> Result<()> {
        Ok(())
    }

    fn disable(&self) {
        *self.disabled.lock().expect("config lock poisoned") = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_key_drops_empty_segments() {
        assert_eq!(split_key("a.b.c"), vec!["a", "b", "c"]);
        assert_eq!(split_key("a..b."), vec!["a", "b"]);
        assert!(split_key("").is_empty());
    }

    #[test]
    fn sections_are_prefixes_of_leaves() {
        let config = MemoryConfig::new();
        config.put("triggers.repeat.interval", Value::Int(1000)).unwrap();
        config.put("triggers.repeat.autostart", Value::Bool(false)).unwrap();

        assert!(config.is_section("triggers"));
        assert!(config.is_section("triggers.repeat"));
        assert!(!config.is_section("triggers.repeat.interval"));
        assert_eq!(config.get("triggers.repeat.interval"), Some(Value::Int(1000)));
        assert_eq!(
            config.keys(),
            vec![
                "triggers.repeat.autostart".to_string(),
                "triggers.repeat.interval".to_string()
            ]
        );
    }

    #[test]
    fn disabled_config_rejects_writes() {
        let config = MemoryConfig::new();
        config.put("x", Value::Int(1)).unwrap();
        config.disable();
        assert!(config.put("y", Value::Int(2)).is_err());
        assert_eq!(config.get("x"), Some(Value::Int(1)));
        assert_eq!(config.get("y"), None);
    }
}
