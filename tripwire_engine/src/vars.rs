//! Globally shared, persisted script variables.
//!
//! Scripts address these as `$name`. The store outlives activations, is
//! shared across every trigger, and snapshots to a RON file. Saves are
//! guarded by an in-progress flag so two threads cannot interleave a write
//! and produce a torn snapshot.

use crate::value::Value;
use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Rejections for store writes. These are expected interactive outcomes, not
/// faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VarError {
    #[error("'{0}' is not a valid variable name")]
    InvalidName(String),
}

/// The subset of [`Value`] that survives a save/load cycle. Object handles
/// are process-local and are skipped (with a warning) at save time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PersistValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

impl PersistValue {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Int(i) => Some(Self::Int(*i)),
            Value::Double(d) => Some(Self::Double(*d)),
            Value::Str(s) => Some(Self::Str(s.clone())),
            Value::Object(_) => None,
        }
    }
}

impl From<PersistValue> for Value {
    fn from(value: PersistValue) -> Self {
        match value {
            PersistValue::Null => Self::Null,
            PersistValue::Bool(b) => Self::Bool(b),
            PersistValue::Int(i) => Self::Int(i),
            PersistValue::Double(d) => Self::Double(d),
            PersistValue::Str(s) => Self::Str(s),
        }
    }
}

/// The shared global variable store.
#[derive(Debug, Default)]
pub struct GlobalVarStore {
    vars: Mutex<HashMap<String, Value>>,
    saving: AtomicBool,
}

impl GlobalVarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a RON snapshot; a missing file yields an empty
    /// store, so first boot needs no special casing.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no variable snapshot at {}; starting empty", path.display());
            return Ok(Self::new());
        }
        let raw = fs::read_to_string(path).with_context(|| format!("reading variable store {}", path.display()))?;
        let snapshot: BTreeMap<String, PersistValue> =
            ron::from_str(&raw).with_context(|| format!("parsing variable store {}", path.display()))?;
        let vars: HashMap<String, Value> = snapshot.into_iter().map(|(k, v)| (k, v.into())).collect();
        info!("loaded {} global variables from {}", vars.len(), path.display());
        Ok(Self {
            vars: Mutex::new(vars),
            saving: AtomicBool::new(false),
        })
    }

    /// Names may nest with dots (`gifts.item1`) but must be non-empty and
    /// contain no whitespace.
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty() && !name.chars().any(|c| c.is_whitespace() || c.is_control())
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars.lock().expect("variable store lock poisoned").get(name).cloned()
    }

    /// # Errors
    /// Rejects invalid names with [`VarError::InvalidName`].
    pub fn put(&self, name: &str, value: Value) -> Result<(), VarError> {
        if !Self::is_valid_name(name) {
            return Err(VarError::InvalidName(name.to_string()));
        }
        self.vars
            .lock()
            .expect("variable store lock poisoned")
            .insert(name.to_string(), value);
        Ok(())
    }

    /// Remove a variable; `false` when it was not present.
    pub fn remove(&self, name: &str) -> bool {
        self.vars.lock().expect("variable store lock poisoned").remove(name).is_some()
    }

    pub fn has(&self, name: &str) -> bool {
        self.vars.lock().expect("variable store lock poisoned").contains_key(name)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .vars
            .lock()
            .expect("variable store lock poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.vars.lock().expect("variable store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a RON snapshot of the persistable variables.
    ///
    /// Returns `Ok(false)` without writing when another save is already in
    /// progress; the in-flight save covers the current state closely enough
    /// and skipping avoids torn output.
    ///
    /// # Errors
    /// Returns an error when serialization or the file write fails.
    pub fn save(&self, path: &Path) -> Result<bool> {
        if self.saving.swap(true, Ordering::AcqRel) {
            info!("variable store save already in progress; skipping");
            return Ok(false);
        }
        let result = self.save_inner(path);
        self.saving.store(false, Ordering::Release);
        result.map(|()| true)
    }

    fn save_inner(&self, path: &Path) -> Result<()> {
        // Snapshot under the lock, serialize and write outside it.
        let snapshot: BTreeMap<String, PersistValue> = {
            let vars = self.vars.lock().expect("variable store lock poisoned");
            vars.iter()
                .filter_map(|(name, value)| match PersistValue::from_value(value) {
                    Some(persist) => Some((name.clone(), persist)),
                    None => {
                        warn!("global variable '{name}' holds a host object and will not be saved");
                        None
                    },
                })
                .collect()
        };
        let text = ron::ser::to_string(&snapshot).context("serializing variable store")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(path, text).with_context(|| format!("writing variable store {}", path.display()))?;
        info!("saved {} global variables to {}", snapshot.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectHandle;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn put_get_remove_round_trip() {
        let store = GlobalVarStore::new();
        store.put("count", Value::Int(3)).unwrap();
        assert_eq!(store.get("count"), Some(Value::Int(3)));
        assert!(store.remove("count"));
        assert!(!store.remove("count"));
        assert_eq!(store.get("count"), None);
    }

    #[test]
    fn invalid_names_are_rejected() {
        let store = GlobalVarStore::new();
        assert_eq!(
            store.put("", Value::Null).unwrap_err(),
            VarError::InvalidName(String::new())
        );
        assert!(store.put("has space", Value::Null).is_err());
        assert!(store.put("gifts.item1", Value::Int(1)).is_ok());
    }

    #[test]
    fn save_and_load_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("vars.ron");

        let store = GlobalVarStore::new();
        store.put("greeting", Value::Str("hello".into())).unwrap();
        store.put("count", Value::Int(7)).unwrap();
        store.put("rate", Value::Double(0.5)).unwrap();
        assert!(store.save(&path)?);

        let loaded = GlobalVarStore::load(&path)?;
        assert_eq!(loaded.get("greeting"), Some(Value::Str("hello".into())));
        assert_eq!(loaded.get("count"), Some(Value::Int(7)));
        assert_eq!(loaded.get("rate"), Some(Value::Double(0.5)));
        Ok(())
    }

    #[test]
    fn missing_snapshot_loads_empty() -> Result<()> {
        let dir = tempdir()?;
        let store = GlobalVarStore::load(&dir.path().join("absent.ron"))?;
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn object_values_are_skipped_on_save() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("vars.ron");

        let store = GlobalVarStore::new();
        store.put("keep", Value::Int(1)).unwrap();
        store
            .put("handle", Value::Object(ObjectHandle::new("thing", Arc::new(1_u8))))
            .unwrap();
        assert!(store.save(&path)?);

        let loaded = GlobalVarStore::load(&path)?;
        assert!(loaded.has("keep"));
        assert!(!loaded.has("handle"));
        Ok(())
    }

    #[test]
    fn concurrent_save_is_skipped_while_flag_is_held() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("vars.ron");
        let store = GlobalVarStore::new();
        store.put("x", Value::Int(1)).unwrap();

        // Simulate an in-flight save by holding the flag directly.
        store.saving.store(true, Ordering::Release);
        assert!(!store.save(&path)?);
        assert!(!path.exists());

        store.saving.store(false, Ordering::Release);
        assert!(store.save(&path)?);
        assert!(path.exists());
        Ok(())
    }
}
