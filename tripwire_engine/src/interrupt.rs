//! The ProcessInterrupter: a pluggable policy consulted by the interpreter
//! at fixed checkpoints.
//!
//! Checkpoints, in activation order:
//! 1. `before_activation` -- may abort before any statement runs (cooldowns).
//! 2. `before_sub_call` -- may veto a named `CALL` (runaway recursion).
//! 3. `after_resume` -- after a cross-thread wait completes, may abort the
//!    remainder when the underlying context went dead in the meantime.
//!
//! An interrupter halt is silent by design: it is an expected outcome, not an
//! error, and never reaches the error sink.

use crate::context::{ActivationContext, ActorId};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Verdict from a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Continue,
    Halt,
}

/// Strategy object injected into the runtime; all checkpoints default to
/// [`Checkpoint::Continue`].
pub trait ProcessInterrupter: Send + Sync {
    fn before_activation(&self, _ctx: &dyn ActivationContext) -> Checkpoint {
        Checkpoint::Continue
    }

    /// `depth` counts sub-trigger frames already on the interpreter's stack.
    fn before_sub_call(&self, _ctx: &dyn ActivationContext, _name: &str, _depth: usize) -> Checkpoint {
        Checkpoint::Continue
    }

    fn after_resume(&self, _ctx: &dyn ActivationContext) -> Checkpoint {
        Checkpoint::Continue
    }

    /// Script-level `COOLDOWN` statements land here. Policies that do not
    /// track cooldowns ignore it.
    fn apply_cooldown(&self, _actor: &ActorId, _duration: Duration) {}
}

/// Interrupter that never halts anything.
#[derive(Debug, Default)]
pub struct NoopInterrupter;

impl ProcessInterrupter for NoopInterrupter {}

/// Default policy: per-actor cooldowns, a sub-call depth cap, and dead-context
/// detection after cross-thread waits.
///
/// Cooldown writes follow latest-wins: whichever source (host configuration
/// or a script `COOLDOWN` statement) wrote last owns the actor's deadline.
#[derive(Debug)]
pub struct CooldownInterrupter {
    deadlines: Mutex<HashMap<ActorId, Instant>>,
    max_call_depth: usize,
}

pub const DEFAULT_MAX_CALL_DEPTH: usize = 16;

impl CooldownInterrupter {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_CALL_DEPTH)
    }

    pub fn with_max_depth(max_call_depth: usize) -> Self {
        Self {
            deadlines: Mutex::new(HashMap::new()),
            max_call_depth,
        }
    }

    /// Time left on an actor's cooldown, if any remains.
    pub fn remaining(&self, actor: &ActorId) -> Option<Duration> {
        let deadlines = self.deadlines.lock().expect("cooldown lock poisoned");
        deadlines
            .get(actor)
            .and_then(|deadline| deadline.checked_duration_since(Instant::now()))
    }
}

impl Default for CooldownInterrupter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessInterrupter for CooldownInterrupter {
    fn before_activation(&self, ctx: &dyn ActivationContext) -> Checkpoint {
        let Some(actor) = ctx.actor_id() else {
            return Checkpoint::Continue;
        };
        let mut deadlines = self.deadlines.lock().expect("cooldown lock poisoned");
        match deadlines.get(&actor) {
            Some(deadline) if Instant::now() < *deadline => {
                debug!("cooldown active for actor {actor}; skipping activation");
                Checkpoint::Halt
            },
            Some(_) => {
                // Expired; drop the stale entry so the map does not grow.
                deadlines.remove(&actor);
                Checkpoint::Continue
            },
            None => Checkpoint::Continue,
        }
    }

    fn before_sub_call(&self, _ctx: &dyn ActivationContext, name: &str, depth: usize) -> Checkpoint {
        if depth >= self.max_call_depth {
            warn!("sub-trigger call to '{name}' vetoed at depth {depth} (max {})", self.max_call_depth);
            Checkpoint::Halt
        } else {
            Checkpoint::Continue
        }
    }

    fn after_resume(&self, ctx: &dyn ActivationContext) -> Checkpoint {
        if ctx.is_live() {
            Checkpoint::Continue
        } else {
            debug!("context for {} activation went dead during a cross-thread wait", ctx.kind());
            Checkpoint::Halt
        }
    }

    fn apply_cooldown(&self, actor: &ActorId, duration: Duration) {
        let deadline = Instant::now() + duration;
        // Latest write wins, even if it shortens an existing cooldown.
        self.deadlines
            .lock()
            .expect("cooldown lock poisoned")
            .insert(actor.clone(), deadline);
        debug!("cooldown for actor {actor} set to {}s", duration.as_secs());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{SystemContext, TriggerKind};
    use crate::value::Value;

    struct ActorCtx {
        live: bool,
    }

    impl ActivationContext for ActorCtx {
        fn actor_id(&self) -> Option<ActorId> {
            Some(ActorId::new("player-1"))
        }

        fn kind(&self) -> TriggerKind {
            TriggerKind::Click
        }

        fn field(&self, _name: &str) -> Option<Value> {
            None
        }

        fn is_live(&self) -> bool {
            self.live
        }
    }

    #[test]
    fn future_deadline_halts_activation() {
        let interrupter = CooldownInterrupter::new();
        let ctx = ActorCtx { live: true };
        interrupter.apply_cooldown(&ActorId::new("player-1"), Duration::from_secs(60));
        assert_eq!(interrupter.before_activation(&ctx), Checkpoint::Halt);
    }

    #[test]
    fn elapsed_deadline_allows_and_cleans_up() {
        let interrupter = CooldownInterrupter::new();
        let ctx = ActorCtx { live: true };
        interrupter.apply_cooldown(&ActorId::new("player-1"), Duration::ZERO);
        assert_eq!(interrupter.before_activation(&ctx), Checkpoint::Continue);
        assert!(interrupter.remaining(&ActorId::new("player-1")).is_none());
    }

    #[test]
    fn actorless_contexts_never_cool_down() {
        let interrupter = CooldownInterrupter::new();
        let ctx = SystemContext::new(TriggerKind::Repeating);
        assert_eq!(interrupter.before_activation(&ctx), Checkpoint::Continue);
    }

    #[test]
    fn latest_cooldown_write_wins() {
        let interrupter = CooldownInterrupter::new();
        let actor = ActorId::new("player-1");
        interrupter.apply_cooldown(&actor, Duration::from_secs(600));
        interrupter.apply_cooldown(&actor, Duration::from_secs(1));
        let remaining = interrupter.remaining(&actor).unwrap();
        assert!(remaining <= Duration::from_secs(1));
    }

    #[test]
    fn depth_cap_vetoes_sub_calls() {
        let interrupter = CooldownInterrupter::with_max_depth(2);
        let ctx = ActorCtx { live: true };
        assert_eq!(interrupter.before_sub_call(&ctx, "helper", 1), Checkpoint::Continue);
        assert_eq!(interrupter.before_sub_call(&ctx, "helper", 2), Checkpoint::Halt);
    }

    #[test]
    fn dead_context_halts_after_resume() {
        let interrupter = CooldownInterrupter::new();
        assert_eq!(interrupter.after_resume(&ActorCtx { live: true }), Checkpoint::Continue);
        assert_eq!(interrupter.after_resume(&ActorCtx { live: false }), Checkpoint::Halt);
    }
}
