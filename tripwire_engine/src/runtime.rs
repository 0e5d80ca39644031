//! The shared runtime every trigger activates against.
//!
//! One [`Runtime`] per host process. It owns the capability registry, the
//! interrupter policy, the main-thread bridge, the async worker pool, the
//! global variable store, and the table of named sub-triggers reachable via
//! `CALL`.

use crate::bridge::{DEFAULT_CALL_TIMEOUT, MainThreadBridge};
use crate::context::ActivationContext;
use crate::interpret::RuntimeError;
use crate::interrupt::{CooldownInterrupter, ProcessInterrupter};
use crate::pool::{DEFAULT_WORKER_COUNT, WorkerPool};
use crate::registry::Registry;
use crate::vars::GlobalVarStore;
use log::error;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tripwire_script::{CompileError, Node, compile};

/// Where script runtime errors go. Activations never panic and never return
/// errors to event dispatch; faults are reported here and the activation
/// ends.
pub trait ErrorSink: Send + Sync {
    fn runtime_error(&self, trigger: &str, ctx: &dyn ActivationContext, err: &RuntimeError);
}

/// Default sink: one structured log line per fault.
pub struct LogSink;

impl ErrorSink for LogSink {
    fn runtime_error(&self, trigger: &str, ctx: &dyn ActivationContext, err: &RuntimeError) {
        match ctx.actor_id() {
            Some(actor) => error!("trigger '{trigger}' ({}, actor {actor}): {err}", ctx.kind()),
            None => error!("trigger '{trigger}' ({}): {err}", ctx.kind()),
        }
    }
}

/// Shared engine state; construct through [`Runtime::builder`].
pub struct Runtime {
    registry: Registry,
    interrupter: Arc<dyn ProcessInterrupter>,
    bridge: Arc<MainThreadBridge>,
    pool: WorkerPool,
    globals: Arc<GlobalVarStore>,
    sink: Arc<dyn ErrorSink>,
    named: RwLock<HashMap<String, Arc<Node>>>,
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn interrupter(&self) -> &Arc<dyn ProcessInterrupter> {
        &self.interrupter
    }

    pub fn bridge(&self) -> &Arc<MainThreadBridge> {
        &self.bridge
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn globals(&self) -> &Arc<GlobalVarStore> {
        &self.globals
    }

    pub fn sink(&self) -> &Arc<dyn ErrorSink> {
        &self.sink
    }

    /// Compile and register a named script reachable from other scripts via
    /// `CALL`. Re-registering a name replaces its body atomically.
    ///
    /// # Errors
    /// Returns the [`CompileError`] when the source does not compile; the
    /// previous body (if any) stays registered.
    pub fn register_sub_trigger(&self, name: &str, source: &str) -> Result<(), CompileError> {
        let program = compile(source)?;
        self.named
            .write()
            .expect("sub-trigger table lock poisoned")
            .insert(name.to_string(), Arc::new(program.body));
        Ok(())
    }

    /// Remove a named script; `false` when it was not registered.
    pub fn remove_sub_trigger(&self, name: &str) -> bool {
        self.named
            .write()
            .expect("sub-trigger table lock poisoned")
            .remove(name)
            .is_some()
    }

    pub fn sub_trigger(&self, name: &str) -> Option<Arc<Node>> {
        self.named
            .read()
            .expect("sub-trigger table lock poisoned")
            .get(name)
            .cloned()
    }

    pub fn sub_trigger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .named
            .read()
            .expect("sub-trigger table lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

/// Builder with workable defaults: cooldown interrupter, log error sink,
/// empty registry, in-memory globals.
pub struct RuntimeBuilder {
    registry: Registry,
    interrupter: Option<Arc<dyn ProcessInterrupter>>,
    globals: Option<Arc<GlobalVarStore>>,
    sink: Option<Arc<dyn ErrorSink>>,
    call_timeout: Duration,
    workers: usize,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self {
            registry: Registry::new(),
            interrupter: None,
            globals: None,
            sink: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            workers: DEFAULT_WORKER_COUNT,
        }
    }
}

impl RuntimeBuilder {
    #[must_use]
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn interrupter(mut self, interrupter: Arc<dyn ProcessInterrupter>) -> Self {
        self.interrupter = Some(interrupter);
        self
    }

    #[must_use]
    pub fn globals(mut self, globals: Arc<GlobalVarStore>) -> Self {
        self.globals = Some(globals);
        self
    }

    #[must_use]
    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Bound on how long a script thread waits for the main thread.
    #[must_use]
    pub fn main_thread_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn build(self) -> Arc<Runtime> {
        Arc::new(Runtime {
            registry: self.registry,
            interrupter: self
                .interrupter
                .unwrap_or_else(|| Arc::new(CooldownInterrupter::new())),
            bridge: Arc::new(MainThreadBridge::new(self.call_timeout)),
            pool: WorkerPool::new(self.workers),
            globals: self.globals.unwrap_or_default(),
            sink: self.sink.unwrap_or_else(|| Arc::new(LogSink)),
            named: RwLock::new(HashMap::new()),
        })
    }
}
