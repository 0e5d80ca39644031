#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
//! tripwire_engine: the runtime half of Tripwire.
//!
//! The script crate compiles source into ASTs; this crate runs them. A host
//! embeds the engine by building a [`Runtime`] with its executors and
//! placeholders registered, then wiring its events into the trigger
//! managers:
//!
//! ```no_run
//! use std::sync::Arc;
//! use tripwire_engine::{Executor, Registry, Runtime};
//! use tripwire_engine::context::{SystemContext, TriggerKind};
//! use tripwire_engine::trigger::keyed::KeyedTriggerManager;
//!
//! let mut registry = Registry::new();
//! registry.register_executor(Executor::new("MESSAGE", |_, args| {
//!     println!("{}", args[0]);
//!     Ok(())
//! }));
//! let rt = Runtime::builder().registry(registry).build();
//!
//! let commands = KeyedTriggerManager::new(rt.clone(), TriggerKind::Command);
//! commands.create("warp", "#MESSAGE:\"whoosh\"").unwrap();
//! commands
//!     .activate("warp", Arc::new(SystemContext::new(TriggerKind::Command)))
//!     .unwrap();
//! ```
//!
//! Scripts never touch the host directly: every side effect goes through a
//! registered [`Executor`], every host value through a [`Placeholder`] or a
//! context field, and everything cross-thread through the
//! [`MainThreadBridge`].

pub mod bridge;
pub mod config;
pub mod context;
pub mod interpret;
pub mod interrupt;
pub mod pool;
pub mod registry;
pub mod runtime;
pub mod scope;
pub mod trigger;
pub mod value;
pub mod vars;

pub use bridge::{BridgeError, MainThreadBridge};
pub use config::{ConfigSource, MemoryConfig};
pub use context::{ActivationContext, ActorId, SystemContext, TriggerKind};
pub use interpret::{Interpreter, Outcome, RuntimeError};
pub use interrupt::{Checkpoint, CooldownInterrupter, NoopInterrupter, ProcessInterrupter};
pub use pool::WorkerPool;
pub use registry::{Executor, Placeholder, Registry};
pub use runtime::{ErrorSink, LogSink, Runtime, RuntimeBuilder};
pub use scope::VariableScope;
pub use trigger::{ActivationOutcome, Trigger, TriggerStoreError};
pub use value::{ObjectHandle, Value};
pub use vars::{GlobalVarStore, VarError};
