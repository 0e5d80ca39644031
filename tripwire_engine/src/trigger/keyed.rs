//! Name-keyed trigger stores.
//!
//! Command, click, and walk triggers share one shape: a flat name-to-script
//! table whose entries fire when the host reports the matching event.
//! [`KeyedTriggerManager`] is that table, parameterized by trigger kind.
//! Custom triggers add one twist: each is bound to a host event type, and
//! the binding is validated before the script is ever compiled so a typo in
//! the event name is reported as exactly that.

use crate::context::{ActivationContext, TriggerKind};
use crate::runtime::Runtime;
use crate::trigger::{ActivationOutcome, Trigger, TriggerStoreError};
use log::info;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// A flat name-to-trigger table for one trigger kind.
pub struct KeyedTriggerManager {
    rt: Arc<Runtime>,
    kind: TriggerKind,
    triggers: Mutex<HashMap<String, Trigger>>,
}

impl KeyedTriggerManager {
    pub fn new(rt: Arc<Runtime>, kind: TriggerKind) -> Self {
        Self {
            rt,
            kind,
            triggers: Mutex::new(HashMap::new()),
        }
    }

    pub fn kind(&self) -> TriggerKind {
        self.kind
    }

    /// # Errors
    /// [`TriggerStoreError::Conflict`] on a duplicate name,
    /// [`TriggerStoreError::Compile`] when the source does not compile.
    pub fn create(&self, name: &str, source: &str) -> Result<(), TriggerStoreError> {
        let mut triggers = self.lock();
        if triggers.contains_key(name) {
            return Err(TriggerStoreError::Conflict(name.to_string()));
        }
        let trigger = Trigger::compile(name, self.kind, source)?;
        triggers.insert(name.to_string(), trigger);
        info!("created {} trigger '{name}'", self.kind);
        Ok(())
    }

    /// Replace an existing trigger's script; the old script stays on a
    /// compile error.
    ///
    /// # Errors
    /// [`TriggerStoreError::NotFound`] for an unknown name,
    /// [`TriggerStoreError::Compile`] when the source does not compile.
    pub fn update(&self, name: &str, source: &str) -> Result<(), TriggerStoreError> {
        let mut triggers = self.lock();
        let trigger = triggers
            .get_mut(name)
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))?;
        trigger.update_script(source)?;
        Ok(())
    }

    /// # Errors
    /// [`TriggerStoreError::NotFound`] when the name is not registered.
    pub fn delete(&self, name: &str) -> Result<(), TriggerStoreError> {
        self.lock()
            .remove(name)
            .map(|_| info!("deleted {} trigger '{name}'", self.kind))
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))
    }

    /// # Errors
    /// [`TriggerStoreError::NotFound`] when the name is not registered.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), TriggerStoreError> {
        let mut triggers = self.lock();
        let trigger = triggers
            .get_mut(name)
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))?;
        trigger.set_enabled(enabled);
        Ok(())
    }

    /// Flip a trigger between caller-thread and worker-pool execution;
    /// returns the new setting.
    ///
    /// # Errors
    /// [`TriggerStoreError::NotFound`] when the name is not registered.
    pub fn toggle_sync(&self, name: &str) -> Result<bool, TriggerStoreError> {
        let mut triggers = self.lock();
        let trigger = triggers
            .get_mut(name)
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))?;
        Ok(trigger.toggle_sync())
    }

    /// Fire the named trigger for `ctx`. `Ok(None)` means it was queued on
    /// the worker pool.
    ///
    /// # Errors
    /// [`TriggerStoreError::NotFound`] when the name is not registered.
    pub fn activate(
        &self,
        name: &str,
        ctx: Arc<dyn ActivationContext>,
    ) -> Result<Option<ActivationOutcome>, TriggerStoreError> {
        let trigger = self
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))?;
        Ok(trigger.activate(ctx, &self.rt))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub fn source(&self, name: &str) -> Option<String> {
        self.lock().get(name).map(|t| t.source().to_string())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Trigger>> {
        self.triggers.lock().expect("trigger table lock poisoned")
    }
}

/// Rejections from the custom trigger store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustomTriggerError {
    #[error("unknown event type '{0}'")]
    UnknownEventType(String),
    #[error(transparent)]
    Store(#[from] TriggerStoreError),
}

/// Custom triggers: scripts bound to host-defined event types.
pub struct CustomTriggerManager {
    rt: Arc<Runtime>,
    /// Event name or alias to canonical event key.
    events: Mutex<HashMap<String, String>>,
    /// Trigger name to (canonical event key, trigger).
    triggers: Mutex<HashMap<String, (String, Trigger)>>,
}

impl CustomTriggerManager {
    pub fn new(rt: Arc<Runtime>) -> Self {
        Self {
            rt,
            events: Mutex::new(HashMap::new()),
            triggers: Mutex::new(HashMap::new()),
        }
    }

    /// Declare a host event type and the names scripts may bind it under.
    /// The canonical key is always accepted alongside the aliases.
    pub fn register_event(&self, key: &str, aliases: &[&str]) {
        let mut events = self.lock_events();
        events.insert(key.to_string(), key.to_string());
        for alias in aliases {
            events.insert((*alias).to_string(), key.to_string());
        }
    }

    /// Resolve an event name or alias to its canonical key.
    pub fn resolve_event(&self, name: &str) -> Option<String> {
        self.lock_events().get(name).cloned()
    }

    /// Bind a new trigger to an event type. The event name is resolved
    /// before compilation; a bad event name never reports a script problem.
    ///
    /// # Errors
    /// [`CustomTriggerError::UnknownEventType`] for an unresolvable event,
    /// then the usual store errors.
    pub fn create(&self, name: &str, event: &str, source: &str) -> Result<(), CustomTriggerError> {
        let key = self
            .resolve_event(event)
            .ok_or_else(|| CustomTriggerError::UnknownEventType(event.to_string()))?;
        let mut triggers = self.lock_triggers();
        if triggers.contains_key(name) {
            return Err(TriggerStoreError::Conflict(name.to_string()).into());
        }
        let trigger = Trigger::compile(name, TriggerKind::Custom, source).map_err(TriggerStoreError::from)?;
        triggers.insert(name.to_string(), (key.clone(), trigger));
        info!("created custom trigger '{name}' on event '{key}'");
        Ok(())
    }

    /// # Errors
    /// [`TriggerStoreError::NotFound`] when the name is not registered.
    pub fn delete(&self, name: &str) -> Result<(), TriggerStoreError> {
        self.lock_triggers()
            .remove(name)
            .map(|_| info!("deleted custom trigger '{name}'"))
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))
    }

    pub fn event_for(&self, name: &str) -> Option<String> {
        self.lock_triggers().get(name).map(|(key, _)| key.clone())
    }

    /// Fire every trigger bound to the event; returns how many were
    /// dispatched. Name order keeps multi-trigger dispatch deterministic.
    pub fn dispatch(&self, event: &str, ctx: &Arc<dyn ActivationContext>) -> usize {
        let Some(key) = self.resolve_event(event) else {
            return 0;
        };
        let bound: Vec<Trigger> = {
            let triggers = self.lock_triggers();
            let mut bound: Vec<(&String, &Trigger)> = triggers
                .iter()
                .filter(|(_, (event_key, _))| *event_key == key)
                .map(|(name, (_, trigger))| (name, trigger))
                .collect();
            bound.sort_by_key(|(name, _)| (*name).clone());
            bound.into_iter().map(|(_, trigger)| trigger.clone()).collect()
        };
        let fired = bound.len();
        for trigger in bound {
            trigger.activate(ctx.clone(), &self.rt);
        }
        fired
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock_triggers().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock_events(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.events.lock().expect("event table lock poisoned")
    }

    fn lock_triggers(&self) -> std::sync::MutexGuard<'_, HashMap<String, (String, Trigger)>> {
        self.triggers.lock().expect("custom trigger table lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SystemContext;
    use crate::registry::{Executor, Registry};
    use std::sync::atomic::{AtomicUsize, Ordering};

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

    fn ctx() -> Arc<dyn ActivationContext> {
        Arc::new(SystemContext::new(TriggerKind::Custom))
    }

    #[test]
    fn keyed_store_create_update_delete() {
        let (rt, count) = counting_runtime();
        let mgr = KeyedTriggerManager::new(rt, TriggerKind::Command);

        mgr.create("warp", "SYNC\n#TICK()").unwrap();
        assert_eq!(
            mgr.create("warp", "x = 1").unwrap_err(),
            TriggerStoreError::Conflict("warp".into())
        );

        assert_eq!(
            mgr.activate("warp", ctx()).unwrap(),
            Some(ActivationOutcome::Completed)
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Bad replacement keeps the old script.
        assert!(mgr.update("warp", "IF x").is_err());
        assert_eq!(mgr.source("warp").as_deref(), Some("SYNC\n#TICK()"));

        mgr.delete("warp").unwrap();
        assert!(matches!(
            mgr.activate("warp", ctx()).unwrap_err(),
            TriggerStoreError::NotFound(_)
        ));
    }

    #[test]
    fn disabled_keyed_trigger_halts() {
        let (rt, count) = counting_runtime();
        let mgr = KeyedTriggerManager::new(rt, TriggerKind::Click);
        mgr.create("door", "SYNC\n#TICK()").unwrap();
        mgr.set_enabled("door", false).unwrap();
        assert_eq!(
            mgr.activate("door", ctx()).unwrap(),
            Some(ActivationOutcome::Halted)
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn toggle_sync_flips_execution_mode() {
        let (rt, _) = counting_runtime();
        let mgr = KeyedTriggerManager::new(rt, TriggerKind::Command);
        mgr.create("warp", "#TICK()").unwrap();
        assert!(mgr.toggle_sync("warp").unwrap());
        assert!(!mgr.toggle_sync("warp").unwrap());
        assert!(matches!(
            mgr.toggle_sync("ghost").unwrap_err(),
            TriggerStoreError::NotFound(_)
        ));
    }

    #[test]
    fn unknown_event_is_rejected_before_compilation() {
        let (rt, _) = counting_runtime();
        let mgr = CustomTriggerManager::new(rt);
        // Source would not compile, but the event check comes first.
        assert_eq!(
            mgr.create("t", "no.such.event", "IF x").unwrap_err(),
            CustomTriggerError::UnknownEventType("no.such.event".into())
        );
    }

    #[test]
    fn aliases_resolve_to_the_canonical_event() {
        let (rt, count) = counting_runtime();
        let mgr = CustomTriggerManager::new(rt);
        mgr.register_event("host.player_join", &["join", "PlayerJoinEvent"]);

        mgr.create("welcome", "join", "SYNC\n#TICK()").unwrap();
        assert_eq!(mgr.event_for("welcome").as_deref(), Some("host.player_join"));

        assert_eq!(mgr.dispatch("PlayerJoinEvent", &ctx()), 1);
        assert_eq!(mgr.dispatch("host.player_join", &ctx()), 1);
        assert_eq!(mgr.dispatch("quit", &ctx()), 0);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dispatch_fires_every_bound_trigger_in_name_order() {
        let (rt, count) = counting_runtime();
        let mgr = CustomTriggerManager::new(rt);
        mgr.register_event("host.tick", &[]);
        mgr.create("a", "host.tick", "SYNC\n#TICK()").unwrap();
        mgr.create("b", "host.tick", "SYNC\n#TICK()").unwrap();
        mgr.create("other", "host.tick", "SYNC\n#TICK()").unwrap();
        mgr.delete("other").unwrap();

        assert_eq!(mgr.dispatch("host.tick", &ctx()), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
