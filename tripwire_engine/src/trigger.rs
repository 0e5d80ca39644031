//! The trigger itself: a named script bound to an activation source.
//!
//! A trigger owns its compiled AST behind an `Arc` so activations running on
//! worker threads keep executing the body they started with even if the
//! script is edited mid-run. Lifecycle managers for each trigger family live
//! in the submodules.

pub mod area;
pub mod inventory;
pub mod keyed;
pub mod repeating;

use crate::context::{ActivationContext, TriggerKind};
use crate::interpret::{Interpreter, Outcome};
use crate::interrupt::Checkpoint;
use crate::runtime::Runtime;
use std::sync::Arc;
use thiserror::Error;
use tripwire_script::{CompileError, IntervalError, Node, compile};

/// Rejections from the name-keyed trigger stores. Expected interactive
/// outcomes surfaced to whoever issued the management command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerStoreError {
    #[error("a trigger named '{0}' already exists")]
    Conflict(String),
    #[error("no trigger named '{0}'")]
    NotFound(String),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Interval(#[from] IntervalError),
}

/// How one activation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The script ran to its end.
    Completed,
    /// An interrupter checkpoint stopped it. Expected, not reported.
    Halted,
    /// A runtime error stopped it; the error went to the sink.
    Failed,
}

/// A compiled script plus the metadata its manager needs.
#[derive(Clone)]
pub struct Trigger {
    name: String,
    kind: TriggerKind,
    source: String,
    ast: Arc<Node>,
    sync: bool,
    enabled: bool,
}

impl Trigger {
    /// Compile `source` into a trigger.
    ///
    /// # Errors
    /// Returns the [`CompileError`] when the source does not compile; no
    /// trigger is created.
    pub fn compile(name: impl Into<String>, kind: TriggerKind, source: &str) -> Result<Self, CompileError> {
        let source = source.to_string();
        let program = compile(&source)?;
        Ok(Self {
            name: name.into(),
            kind,
            source,
            ast: Arc::new(program.body),
            sync: program.sync_hint,
            enabled: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TriggerKind {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Shared handle to the compiled body; loop threads hold this so edits
    /// never tear a running activation.
    pub(crate) fn ast_handle(&self) -> Arc<Node> {
        self.ast.clone()
    }

    /// True when the script asked (via `SYNC`) to run on the caller's thread.
    pub fn is_sync(&self) -> bool {
        self.sync
    }

    /// Flip between caller-thread and worker-pool execution; returns the new
    /// setting. Overrides the script's `SYNC` directive until the next
    /// recompile.
    pub fn toggle_sync(&mut self) -> bool {
        self.sync = !self.sync;
        self.sync
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Replace the script body. The swap only happens when the new source
    /// compiles; on error the trigger keeps running its current body.
    ///
    /// # Errors
    /// Returns the [`CompileError`] from the replacement source.
    pub fn update_script(&mut self, source: &str) -> Result<(), CompileError> {
        let program = compile(source)?;
        self.source = source.to_string();
        self.ast = Arc::new(program.body);
        self.sync = program.sync_hint;
        Ok(())
    }

    /// Activate the trigger for `ctx`.
    ///
    /// Synchronous triggers run on the calling thread and return their
    /// outcome. Asynchronous triggers are queued on the runtime's worker pool
    /// and return `None`; their outcome is observable only through side
    /// effects and the error sink.
    pub fn activate(&self, ctx: Arc<dyn ActivationContext>, rt: &Arc<Runtime>) -> Option<ActivationOutcome> {
        if !self.enabled {
            return Some(ActivationOutcome::Halted);
        }
        if self.sync {
            return Some(run_script(&self.name, &self.ast, ctx, rt));
        }
        let name = self.name.clone();
        let ast = self.ast.clone();
        let rt_for_job = rt.clone();
        rt.pool().execute(move || {
            run_script(&name, &ast, ctx, &rt_for_job);
        });
        None
    }
}

/// Run one script body for one activation, consulting the interrupter first
/// and routing any fault to the error sink.
pub fn run_script(
    name: &str,
    ast: &Arc<Node>,
    ctx: Arc<dyn ActivationContext>,
    rt: &Arc<Runtime>,
) -> ActivationOutcome {
    if rt.interrupter().before_activation(ctx.as_ref()) == Checkpoint::Halt {
        return ActivationOutcome::Halted;
    }
    let mut interp = Interpreter::new(rt, ctx.clone());
    match interp.run(ast) {
        Ok(Outcome::Completed) => ActivationOutcome::Completed,
        Ok(Outcome::Halted) => ActivationOutcome::Halted,
        Err(err) => {
            rt.sink().runtime_error(name, ctx.as_ref(), &err);
            ActivationOutcome::Failed
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SystemContext;
    use crate::registry::{Executor, Registry};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_runtime() -> (Arc<Runtime>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        let counter = count.clone();
        registry.register_executor(Executor::new("TICK", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        (Runtime::builder().registry(registry).build(), count)
    }

    #[test]
    fn sync_trigger_runs_on_caller_thread() {
        let (rt, count) = counting_runtime();
        let trigger = Trigger::compile("t", TriggerKind::Command, "SYNC\n#TICK()").unwrap();
        assert!(trigger.is_sync());
        let outcome = trigger.activate(Arc::new(SystemContext::new(TriggerKind::Command)), &rt);
        assert_eq!(outcome, Some(ActivationOutcome::Completed));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn async_trigger_runs_on_the_pool() {
        let (rt, count) = counting_runtime();
        let trigger = Trigger::compile("t", TriggerKind::Command, "#TICK()").unwrap();
        assert!(!trigger.is_sync());
        let outcome = trigger.activate(Arc::new(SystemContext::new(TriggerKind::Command)), &rt);
        assert_eq!(outcome, None);
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while count.load(Ordering::SeqCst) < 1 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disabled_trigger_does_not_run() {
        let (rt, count) = counting_runtime();
        let mut trigger = Trigger::compile("t", TriggerKind::Command, "SYNC\n#TICK()").unwrap();
        trigger.set_enabled(false);
        let outcome = trigger.activate(Arc::new(SystemContext::new(TriggerKind::Command)), &rt);
        assert_eq!(outcome, Some(ActivationOutcome::Halted));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn update_script_keeps_old_body_on_compile_error() {
        let mut trigger = Trigger::compile("t", TriggerKind::Command, "x = 1").unwrap();
        assert!(trigger.update_script("IF x").is_err());
        assert_eq!(trigger.source(), "x = 1");
    }

    #[test]
    fn failed_activation_reaches_the_sink() {
        struct CollectSink(Mutex<Vec<String>>);
        impl crate::runtime::ErrorSink for CollectSink {
            fn runtime_error(&self, trigger: &str, _ctx: &dyn ActivationContext, err: &crate::interpret::RuntimeError) {
                self.0.lock().unwrap().push(format!("{trigger}: {err}"));
            }
        }

        let sink = Arc::new(CollectSink(Mutex::new(Vec::new())));
        let rt = Runtime::builder().error_sink(sink.clone()).build();
        let trigger = Trigger::compile("broken", TriggerKind::Command, "SYNC\n#MISSING()").unwrap();
        let outcome = trigger.activate(Arc::new(SystemContext::new(TriggerKind::Command)), &rt);
        assert_eq!(outcome, Some(ActivationOutcome::Failed));
        let reports = sink.0.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].starts_with("broken:"));
    }
}
