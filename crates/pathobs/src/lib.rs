#![forbid(unsafe_code)]

//! Change notification on values addressed by dotted paths.
//!
//! # Role
//! `pathobs` lets callers register a [`Listener`] on a value reachable from a
//! root object through a path such as `"a.b.c.d"`, and delivers a [`Change`]
//! to it whenever that value is replaced through [`Engine::set`] or reported
//! through [`Engine::notify`].
//!
//! # Primary responsibilities
//! - **Object graph**: [`Value`] and the identity-bearing [`Object`] handle.
//! - **Paths**: [`Path`] parsing and [`get`] traversal.
//! - **Registry**: identity-keyed, weak, insertion-ordered listener sets.
//! - **Resolution**: direct notification followed by re-anchoring, so a
//!   listener on `a.b.c.d` keeps working after `a.b` is swapped for a new
//!   object and stops hearing about the detached one.
//!
//! # Surfaces
//! [`Engine`] is the injectable component; clones share one registry.
//! [`global`] wraps a lazily created thread-local engine in free functions.
//!
//! # Features
//! - `tracing`: structured events for resolutions, re-anchoring, pruning and
//!   listener failures.
//! - `json`: [`Value::from_json`] / [`Value::to_json`] via `serde_json`.

pub mod engine;
pub mod global;
pub mod listener;
pub mod path;
pub mod registry;
pub mod value;

pub use engine::{Engine, EngineConfig, FailurePolicy, ListenerFailure, Resolution};
pub use listener::{Change, Listener, ListenerError, ListenerId, ListenerResult};
pub use path::{Path, get};
pub use registry::{Origin, RegistryStats};
pub use value::{Object, ObjectId, Value, WeakObject};
