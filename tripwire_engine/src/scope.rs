//! Per-activation variable scopes.
//!
//! Each activation gets a fresh scope that is discarded when the activation
//! ends. Blocks that need their own bindings (loop bodies, sub-trigger
//! calls) push lexical frames onto it. Reads that miss every frame fall back
//! to the shared [`GlobalVarStore`]; writes never do -- globals are addressed
//! explicitly as `$name`.

use crate::value::Value;
use crate::vars::GlobalVarStore;
use std::collections::HashMap;
use std::sync::Arc;

/// A stack of lexical frames with read-only fallback to the global store.
#[derive(Debug)]
pub struct VariableScope {
    frames: Vec<HashMap<String, Value>>,
    globals: Option<Arc<GlobalVarStore>>,
}

impl VariableScope {
    /// A detached scope with no global fallback (used by tests and tools).
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
            globals: None,
        }
    }

    pub fn with_globals(globals: Arc<GlobalVarStore>) -> Self {
        Self {
            frames: vec![HashMap::new()],
            globals: Some(globals),
        }
    }

    /// Open a nested lexical frame.
    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Close the innermost frame, discarding its bindings. The root frame is
    /// never popped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Look a name up through the frame chain, then the global store.
    pub fn get(&self, name: &str) -> Option<Value> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.get(name) {
                return Some(value.clone());
            }
        }
        self.globals.as_ref().and_then(|store| store.get(name))
    }

    /// Assign a name: updates the innermost frame that already binds it, or
    /// creates a binding in the current frame.
    pub fn set(&mut self, name: &str, value: Value) {
        for frame in self.frames.iter_mut().rev() {
            if let Some(slot) = frame.get_mut(name) {
                *slot = value;
                return;
            }
        }
        self.frames
            .last_mut()
            .expect("scope always has a root frame")
            .insert(name.to_string(), value);
    }

    /// Bind a name in the current frame, shadowing any outer binding (loop
    /// variables use this).
    pub fn declare(&mut self, name: &str, value: Value) {
        self.frames
            .last_mut()
            .expect("scope always has a root frame")
            .insert(name.to_string(), value);
    }
}

impl Default for VariableScope {
    fn default() -> Self {
        Self::new()
    }
}
