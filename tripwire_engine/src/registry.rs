//! Host-supplied capability tables: Executors (verbs) and Placeholders
//! (value readers).
//!
//! Both tables are built by the host and injected into the runtime at
//! construction; scripts bind to them late, by name, so an unknown name is a
//! runtime error rather than a compile error.

use crate::context::ActivationContext;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub type ExecFn = Arc<dyn Fn(&dyn ActivationContext, &[Value]) -> Result<(), String> + Send + Sync>;
pub type PlaceholderFn = Arc<dyn Fn(&dyn ActivationContext, &[Value]) -> Result<Value, String> + Send + Sync>;

/// A host verb callable from scripts as `#NAME`.
#[derive(Clone)]
pub struct Executor {
    name: String,
    main_thread: bool,
    arity: Option<usize>,
    run: ExecFn,
}

impl Executor {
    pub fn new(
        name: impl Into<String>,
        run: impl Fn(&dyn ActivationContext, &[Value]) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            main_thread: false,
            arity: None,
            run: Arc::new(run),
        }
    }

    /// Mark this executor as requiring the single designated main thread;
    /// the interpreter will route it through the main-thread bridge.
    pub fn main_thread(mut self) -> Self {
        self.main_thread = true;
        self
    }

    /// Require an exact argument count. Executors are variadic by default.
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_main_thread(&self) -> bool {
        self.main_thread
    }

    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    pub fn run_fn(&self) -> &ExecFn {
        &self.run
    }
}

/// A pure host value reader, reachable from scripts as a bare or dotted name
/// (`server.online_count`, `player.name`).
#[derive(Clone)]
pub struct Placeholder {
    name: String,
    arity: Option<usize>,
    eval: PlaceholderFn,
}

impl Placeholder {
    pub fn new(
        name: impl Into<String>,
        eval: impl Fn(&dyn ActivationContext, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity: None,
            eval: Arc::new(eval),
        }
    }

    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    pub fn eval_fn(&self) -> &PlaceholderFn {
        &self.eval
    }
}

/// The pair of name-keyed capability tables consulted by the interpreter.
#[derive(Clone, Default)]
pub struct Registry {
    executors: HashMap<String, Executor>,
    placeholders: HashMap<String, Placeholder>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor, replacing any previous one with the same name.
    pub fn register_executor(&mut self, executor: Executor) {
        self.executors.insert(executor.name.clone(), executor);
    }

    pub fn register_placeholder(&mut self, placeholder: Placeholder) {
        self.placeholders.insert(placeholder.name.clone(), placeholder);
    }

    pub fn executor(&self, name: &str) -> Option<&Executor> {
        self.executors.get(name)
    }

    pub fn placeholder(&self, name: &str) -> Option<&Placeholder> {
        self.placeholders.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{SystemContext, TriggerKind};

    #[test]
    fn lookup_finds_registered_entries() {
        let mut registry = Registry::new();
        registry.register_executor(Executor::new("MESSAGE", |_, _| Ok(())).with_arity(1));
        registry.register_placeholder(Placeholder::new("server.name", |_, _| {
            Ok(Value::Str("test".into()))
        }));

        assert!(registry.executor("MESSAGE").is_some());
        assert_eq!(registry.executor("MESSAGE").unwrap().arity(), Some(1));
        assert!(registry.executor("NOPE").is_none());

        let ctx = SystemContext::new(TriggerKind::Command);
        let ph = registry.placeholder("server.name").unwrap();
        assert_eq!((ph.eval_fn())(&ctx, &[]).unwrap(), Value::Str("test".into()));
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut registry = Registry::new();
        registry.register_executor(Executor::new("X", |_, _| Err("first".into())));
        registry.register_executor(Executor::new("X", |_, _| Ok(())).main_thread());
        assert!(registry.executor("X").unwrap().is_main_thread());
    }
}
