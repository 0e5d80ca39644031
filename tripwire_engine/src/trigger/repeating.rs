//! Repeating triggers: scripts that fire on a fixed interval from their own
//! thread.
//!
//! Each started trigger owns one loop thread. Pause, resume, and stop go
//! through a shared control block and a condvar, so the loop reacts to them
//! immediately. Interval edits are gentler: the countdown already in flight
//! finishes on its old schedule and the new interval applies from the next
//! wake. A wake that lands while the trigger is paused skips the activation
//! but keeps the loop alive.

use crate::context::{SystemContext, TriggerKind};
use crate::runtime::Runtime;
use crate::trigger::{Trigger, TriggerStoreError, run_script};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tripwire_script::{format_interval, parse_interval};

pub const DEFAULT_INTERVAL_MS: u64 = 1_000;

/// Lifecycle state of one repeating trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatState {
    Stopped,
    Running,
    Paused,
}

struct Ctl {
    state: RepeatState,
    interval_ms: u64,
    /// Bumped on pause/resume/stop; the loop restarts its countdown when it
    /// sees a new epoch. Interval edits do not bump it, so a pending wake
    /// keeps its schedule.
    epoch: u64,
    /// Identifies the loop generation; a loop exits when its id goes stale.
    run_id: u64,
}

struct RepeatingTrigger {
    trigger: Trigger,
    autostart: bool,
    ctl: Arc<(Mutex<Ctl>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl RepeatingTrigger {
    fn new(trigger: Trigger) -> Self {
        Self {
            trigger,
            autostart: false,
            ctl: Arc::new((
                Mutex::new(Ctl {
                    state: RepeatState::Stopped,
                    interval_ms: DEFAULT_INTERVAL_MS,
                    epoch: 0,
                    run_id: 0,
                }),
                Condvar::new(),
            )),
            handle: None,
        }
    }

    fn state(&self) -> RepeatState {
        self.ctl.0.lock().expect("repeat ctl lock poisoned").state
    }

    fn start(&mut self, rt: &Arc<Runtime>) {
        let my_run = {
            let mut ctl = self.ctl.0.lock().expect("repeat ctl lock poisoned");
            if ctl.state != RepeatState::Stopped {
                return;
            }
            ctl.state = RepeatState::Running;
            ctl.run_id += 1;
            ctl.epoch += 1;
            ctl.run_id
        };
        // A previous generation's thread is exiting; reap it.
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        let name = self.trigger.name().to_string();
        let body = self.trigger.ast_handle();
        let ctl = Arc::clone(&self.ctl);
        let rt = Arc::clone(rt);
        self.handle = Some(
            thread::Builder::new()
                .name(format!("repeat-{name}"))
                .spawn(move || repeat_loop(&name, &body, my_run, &ctl, &rt))
                .expect("spawning repeating trigger thread"),
        );
    }

    /// Signal the loop to exit and hand back its thread handle. The caller
    /// joins the handle after releasing the trigger table, so a loop stuck in
    /// a long activation cannot stall other manager calls.
    fn begin_stop(&mut self) -> Option<JoinHandle<()>> {
        {
            let (lock, cvar) = &*self.ctl;
            let mut ctl = lock.lock().expect("repeat ctl lock poisoned");
            if ctl.state != RepeatState::Stopped {
                ctl.state = RepeatState::Stopped;
                ctl.epoch += 1;
                cvar.notify_all();
            }
        }
        self.handle.take()
    }

    fn set_state(&self, state: RepeatState) {
        let (lock, cvar) = &*self.ctl;
        let mut ctl = lock.lock().expect("repeat ctl lock poisoned");
        if ctl.state == RepeatState::Stopped || ctl.state == state {
            return;
        }
        ctl.state = state;
        ctl.epoch += 1;
        cvar.notify_all();
    }

    /// Takes effect when the loop begins its next countdown; a countdown in
    /// flight finishes on the old schedule.
    fn set_interval(&self, interval_ms: u64) {
        self.ctl.0.lock().expect("repeat ctl lock poisoned").interval_ms = interval_ms;
    }

    fn interval_ms(&self) -> u64 {
        self.ctl.0.lock().expect("repeat ctl lock poisoned").interval_ms
    }
}

fn join_loop(handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle {
        if handle.join().is_err() {
            warn!("repeating trigger thread panicked");
        }
    }
}

fn repeat_loop(
    name: &str,
    body: &Arc<tripwire_script::Node>,
    my_run: u64,
    ctl: &Arc<(Mutex<Ctl>, Condvar)>,
    rt: &Arc<Runtime>,
) {
    debug!("repeating trigger '{name}' loop started");
    let (lock, cvar) = &**ctl;
    let mut guard = lock.lock().expect("repeat ctl lock poisoned");
    loop {
        if guard.run_id != my_run || guard.state == RepeatState::Stopped {
            debug!("repeating trigger '{name}' loop exiting");
            return;
        }
        // The interval is read once per countdown; edits land on the next one.
        let epoch = guard.epoch;
        let deadline = Instant::now() + Duration::from_millis(guard.interval_ms);
        let fire = loop {
            let now = Instant::now();
            if now >= deadline {
                break guard.state == RepeatState::Running;
            }
            let (next, _) = cvar
                .wait_timeout(guard, deadline - now)
                .expect("repeat ctl lock poisoned");
            guard = next;
            if guard.run_id != my_run || guard.state == RepeatState::Stopped {
                debug!("repeating trigger '{name}' loop exiting");
                return;
            }
            // Pause or resume mid-countdown: restart it.
            if guard.epoch != epoch {
                break false;
            }
        };
        if fire {
            drop(guard);
            let ctx = Arc::new(SystemContext::new(TriggerKind::Repeating));
            // Errors went to the sink; the loop keeps its schedule either way.
            run_script(name, body, ctx, rt);
            guard = lock.lock().expect("repeat ctl lock poisoned");
        }
    }
}

/// Name-keyed store of repeating triggers and their loop threads.
pub struct RepeatingTriggerManager {
    rt: Arc<Runtime>,
    triggers: Mutex<HashMap<String, RepeatingTrigger>>,
}

impl RepeatingTriggerManager {
    pub fn new(rt: Arc<Runtime>) -> Self {
        Self {
            rt,
            triggers: Mutex::new(HashMap::new()),
        }
    }

    /// # Errors
    /// [`TriggerStoreError::Conflict`] on a duplicate name,
    /// [`TriggerStoreError::Compile`] when the source does not compile.
    pub fn create(&self, name: &str, source: &str) -> Result<(), TriggerStoreError> {
        let mut triggers = self.lock();
        if triggers.contains_key(name) {
            return Err(TriggerStoreError::Conflict(name.to_string()));
        }
        let trigger = Trigger::compile(name, TriggerKind::Repeating, source)?;
        triggers.insert(name.to_string(), RepeatingTrigger::new(trigger));
        info!("created repeating trigger '{name}'");
        Ok(())
    }

    /// Stop (if running) and remove a trigger.
    ///
    /// # Errors
    /// [`TriggerStoreError::NotFound`] when the name is not registered.
    pub fn delete(&self, name: &str) -> Result<(), TriggerStoreError> {
        let mut entry = self
            .lock()
            .remove(name)
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))?;
        join_loop(entry.begin_stop());
        info!("deleted repeating trigger '{name}'");
        Ok(())
    }

    /// Start the loop thread. Starting an already running trigger is a no-op.
    ///
    /// # Errors
    /// [`TriggerStoreError::NotFound`] when the name is not registered.
    pub fn start(&self, name: &str) -> Result<(), TriggerStoreError> {
        let mut triggers = self.lock();
        let entry = triggers
            .get_mut(name)
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))?;
        entry.start(&self.rt);
        Ok(())
    }

    /// Stop the loop thread and join it. Stopping a stopped trigger is a
    /// no-op.
    ///
    /// # Errors
    /// [`TriggerStoreError::NotFound`] when the name is not registered.
    pub fn stop(&self, name: &str) -> Result<(), TriggerStoreError> {
        let handle = {
            let mut triggers = self.lock();
            let entry = triggers
                .get_mut(name)
                .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))?;
            entry.begin_stop()
        };
        join_loop(handle);
        Ok(())
    }

    /// Flip between running and stopped; returns the new state.
    ///
    /// # Errors
    /// [`TriggerStoreError::NotFound`] when the name is not registered.
    pub fn toggle(&self, name: &str) -> Result<RepeatState, TriggerStoreError> {
        let (state, handle) = {
            let mut triggers = self.lock();
            let entry = triggers
                .get_mut(name)
                .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))?;
            if entry.state() == RepeatState::Stopped {
                entry.start(&self.rt);
                (entry.state(), None)
            } else {
                (RepeatState::Stopped, entry.begin_stop())
            }
        };
        join_loop(handle);
        Ok(state)
    }

    /// Pause a running trigger; wakes while paused skip activation.
    ///
    /// # Errors
    /// [`TriggerStoreError::NotFound`] when the name is not registered.
    pub fn pause(&self, name: &str) -> Result<(), TriggerStoreError> {
        self.with(name, |entry| entry.set_state(RepeatState::Paused))
    }

    /// # Errors
    /// [`TriggerStoreError::NotFound`] when the name is not registered.
    pub fn resume(&self, name: &str) -> Result<(), TriggerStoreError> {
        self.with(name, |entry| entry.set_state(RepeatState::Running))
    }

    /// Set the firing interval from text such as `1h20m50s`. A countdown in
    /// progress finishes on its old schedule; the new interval applies from
    /// the next wake.
    ///
    /// # Errors
    /// [`TriggerStoreError::NotFound`] for an unknown name,
    /// [`TriggerStoreError::Interval`] when the text does not parse.
    pub fn set_interval(&self, name: &str, text: &str) -> Result<(), TriggerStoreError> {
        let interval_ms = parse_interval(text)?;
        self.with(name, |entry| {
            entry.set_interval(interval_ms);
            info!("repeating trigger '{name}' interval set to {}", format_interval(interval_ms));
        })
    }

    /// # Errors
    /// [`TriggerStoreError::NotFound`] when the name is not registered.
    pub fn set_autostart(&self, name: &str, autostart: bool) -> Result<(), TriggerStoreError> {
        let mut triggers = self.lock();
        let entry = triggers
            .get_mut(name)
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))?;
        entry.autostart = autostart;
        Ok(())
    }

    /// Start every trigger flagged for autostart; called once at boot.
    pub fn autostart_all(&self) {
        let mut triggers = self.lock();
        for (name, entry) in triggers.iter_mut() {
            if entry.autostart && entry.state() == RepeatState::Stopped {
                info!("autostarting repeating trigger '{name}'");
                entry.start(&self.rt);
            }
        }
    }

    pub fn state(&self, name: &str) -> Option<RepeatState> {
        self.lock().get(name).map(RepeatingTrigger::state)
    }

    pub fn interval_ms(&self, name: &str) -> Option<u64> {
        self.lock().get(name).map(RepeatingTrigger::interval_ms)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Stop every running trigger; called at shutdown.
    pub fn stop_all(&self) {
        let handles: Vec<_> = self.lock().values_mut().map(RepeatingTrigger::begin_stop).collect();
        for handle in handles {
            join_loop(handle);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, RepeatingTrigger>> {
        self.triggers.lock().expect("repeating trigger table lock poisoned")
    }

    fn with(&self, name: &str, f: impl FnOnce(&RepeatingTrigger)) -> Result<(), TriggerStoreError> {
        let triggers = self.lock();
        let entry = triggers
            .get(name)
            .ok_or_else(|| TriggerStoreError::NotFound(name.to_string()))?;
        f(entry);
        Ok(())
    }
}

impl Drop for RepeatingTriggerManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Executor, Registry};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

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

    fn wait_for(count: &AtomicUsize, at_least: usize, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        while count.load(Ordering::SeqCst) < at_least {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    #[test]
    fn duplicate_names_conflict() {
        let (rt, _) = counting_runtime();
        let mgr = RepeatingTriggerManager::new(rt);
        mgr.create("tick", "#TICK()").unwrap();
        assert_eq!(
            mgr.create("tick", "#TICK()").unwrap_err(),
            TriggerStoreError::Conflict("tick".into())
        );
    }

    #[test]
    fn started_trigger_fires_repeatedly() {
        let (rt, count) = counting_runtime();
        let mgr = RepeatingTriggerManager::new(rt);
        mgr.create("tick", "#TICK()").unwrap();
        mgr.set_interval("tick", "10ms").unwrap_err(); // ms is not a unit
        mgr.set_interval("tick", "1s").unwrap();

        // Use a short interval directly for the test.
        {
            let triggers = mgr.lock();
            triggers.get("tick").unwrap().set_interval(15);
        }
        mgr.start("tick").unwrap();
        assert!(wait_for(&count, 3, Duration::from_secs(3)));
        mgr.stop("tick").unwrap();
        assert_eq!(mgr.state("tick"), Some(RepeatState::Stopped));
    }

    #[test]
    fn paused_trigger_skips_activations() {
        let (rt, count) = counting_runtime();
        let mgr = RepeatingTriggerManager::new(rt);
        mgr.create("tick", "#TICK()").unwrap();
        {
            let triggers = mgr.lock();
            triggers.get("tick").unwrap().set_interval(10);
        }
        mgr.start("tick").unwrap();
        assert!(wait_for(&count, 1, Duration::from_secs(2)));

        mgr.pause("tick").unwrap();
        assert_eq!(mgr.state("tick"), Some(RepeatState::Paused));
        let frozen = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(60));
        // A wake or two may already have been in flight at pause time.
        assert!(count.load(Ordering::SeqCst) <= frozen + 1);

        mgr.resume("tick").unwrap();
        let resumed_from = count.load(Ordering::SeqCst);
        assert!(wait_for(&count, resumed_from + 2, Duration::from_secs(2)));
        mgr.stop("tick").unwrap();
    }

    #[test]
    fn interval_change_lets_the_pending_wake_fire() {
        let (rt, count) = counting_runtime();
        let mgr = RepeatingTriggerManager::new(rt);
        mgr.create("tick", "#TICK()").unwrap();
        {
            let triggers = mgr.lock();
            triggers.get("tick").unwrap().set_interval(80);
        }
        mgr.start("tick").unwrap();
        thread::sleep(Duration::from_millis(20));
        {
            let triggers = mgr.lock();
            triggers.get("tick").unwrap().set_interval(3_600_000);
        }
        // The countdown already in flight keeps its old schedule; only the
        // next one picks up the hour-long interval.
        assert!(wait_for(&count, 1, Duration::from_secs(2)));
        mgr.stop("tick").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_joins_outside_the_trigger_table() {
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let release_rx = std::sync::Mutex::new(release_rx);
        let mut registry = Registry::new();
        registry.register_executor(Executor::new("BLOCK", move |_, _| {
            entered_tx.send(()).ok();
            release_rx.lock().unwrap().recv().ok();
            Ok(())
        }));
        let mgr = RepeatingTriggerManager::new(Runtime::builder().registry(registry).build());
        mgr.create("slow", "#BLOCK()").unwrap();
        {
            let triggers = mgr.lock();
            triggers.get("slow").unwrap().set_interval(10);
        }
        mgr.start("slow").unwrap();
        entered_rx.recv().unwrap();

        thread::scope(|s| {
            s.spawn(|| mgr.stop("slow").unwrap());
            // The join waits on the blocked activation; the table must keep
            // answering queries in the meantime.
            let deadline = Instant::now() + Duration::from_secs(2);
            while mgr.state("slow") != Some(RepeatState::Stopped) {
                assert!(
                    Instant::now() < deadline,
                    "trigger table stayed locked while joining"
                );
                thread::sleep(Duration::from_millis(5));
            }
            release_tx.send(()).unwrap();
        });
    }

    #[test]
    fn toggle_flips_between_running_and_stopped() {
        let (rt, _) = counting_runtime();
        let mgr = RepeatingTriggerManager::new(rt);
        mgr.create("tick", "#TICK()").unwrap();
        assert_eq!(mgr.toggle("tick").unwrap(), RepeatState::Running);
        assert_eq!(mgr.toggle("tick").unwrap(), RepeatState::Stopped);
    }

    #[test]
    fn autostart_only_starts_flagged_triggers() {
        let (rt, _) = counting_runtime();
        let mgr = RepeatingTriggerManager::new(rt);
        mgr.create("a", "#TICK()").unwrap();
        mgr.create("b", "#TICK()").unwrap();
        mgr.set_autostart("a", true).unwrap();
        mgr.autostart_all();
        assert_eq!(mgr.state("a"), Some(RepeatState::Running));
        assert_eq!(mgr.state("b"), Some(RepeatState::Stopped));
        mgr.stop_all();
    }

    #[test]
    fn delete_stops_and_removes() {
        let (rt, _) = counting_runtime();
        let mgr = RepeatingTriggerManager::new(rt);
        mgr.create("tick", "#TICK()").unwrap();
        mgr.start("tick").unwrap();
        mgr.delete("tick").unwrap();
        assert_eq!(mgr.state("tick"), None);
        assert_eq!(
            mgr.delete("tick").unwrap_err(),
            TriggerStoreError::NotFound("tick".into())
        );
    }

    #[test]
    fn default_interval_is_one_second() {
        let (rt, _) = counting_runtime();
        let mgr = RepeatingTriggerManager::new(rt);
        mgr.create("tick", "#TICK()").unwrap();
        assert_eq!(mgr.interval_ms("tick"), Some(DEFAULT_INTERVAL_MS));
        mgr.set_interval("tick", "1m30s").unwrap();
        assert_eq!(mgr.interval_ms("tick"), Some(90_000));
    }
}
