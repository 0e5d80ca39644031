//! Activation contexts: what a running script can see about the event that
//! fired it.
//!
//! Platform adapters wrap their concrete event types (a click, a GUI slot
//! interaction, an area crossing) in an [`ActivationContext`] implementation.
//! The engine itself never downcasts a context; executors and placeholders
//! from the same adapter may read its fields through [`ActivationContext::field`].

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of the acting entity, used to key cooldowns. Hosts typically use
/// a player UUID string; any stable token works.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of trigger an activation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    Click,
    Walk,
    Command,
    Custom,
    AreaEnter,
    AreaExit,
    Inventory,
    Repeating,
    /// Sub-trigger invoked through `CALL`.
    Named,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Click => "click",
            Self::Walk => "walk",
            Self::Command => "command",
            Self::Custom => "custom",
            Self::AreaEnter => "area-enter",
            Self::AreaExit => "area-exit",
            Self::Inventory => "inventory",
            Self::Repeating => "repeating",
            Self::Named => "named",
        };
        write!(f, "{text}")
    }
}

/// Capability view of the event behind an activation.
///
/// Implementations must be cheap to share: activations may hop threads (async
/// triggers, main-thread calls) carrying the context with them.
pub trait ActivationContext: Send + Sync {
    /// The entity responsible for the event, when there is one. Timer-driven
    /// activations have none, so cooldowns do not apply to them.
    fn actor_id(&self) -> Option<ActorId>;

    fn kind(&self) -> TriggerKind;

    /// Read a named event field (`"slot"`, `"command_args"`, ...). Adapters
    /// decide the vocabulary; unknown names yield `None`.
    fn field(&self, name: &str) -> Option<Value>;

    /// Whether the underlying event source is still valid. A GUI that was
    /// closed while a cross-thread call was pending reports `false`, which
    /// lets the interrupter abort the remainder of the activation.
    fn is_live(&self) -> bool {
        true
    }
}

/// Minimal context for engine-originated activations (repeating triggers,
/// autostart) with no acting entity.
#[derive(Debug, Clone)]
pub struct SystemContext {
    kind: TriggerKind,
}

impl SystemContext {
    pub fn new(kind: TriggerKind) -> Self {
        Self { kind }
    }
}

impl ActivationContext for SystemContext {
    fn actor_id(&self) -> Option<ActorId> {
        None
    }

    fn kind(&self) -> TriggerKind {
        self.kind
    }

    fn field(&self, _name: &str) -> Option<Value> {
        None
    }
}
