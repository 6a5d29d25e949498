#![forbid(unsafe_code)]

//! Free functions over a thread-local [`Engine`].
//!
//! The engine is created lazily on first use in each thread and lives until
//! the thread exits; there is nothing to initialize or tear down. Each
//! thread has its own registry (`Engine` is `!Send`), so a listener
//! registered on one thread never sees changes made on another.
//!
//! Prefer an explicit [`Engine`] where tests or components need isolation.

use crate::engine::{Engine, Resolution};
use crate::listener::Listener;
use crate::value::Value;

thread_local! {
    static ENGINE: Engine = Engine::default();
}

/// Run `f` with this thread's engine.
pub fn with_engine<R>(f: impl FnOnce(&Engine) -> R) -> R {
    ENGINE.with(f)
}

/// A handle to this thread's engine.
#[must_use]
pub fn engine() -> Engine {
    with_engine(Engine::clone)
}

/// See [`Engine::observe`].
pub fn observe(root: &Value, path: &str, listener: &Listener) -> bool {
    with_engine(|engine| engine.observe(root, path, listener))
}

/// See [`Engine::unobserve`].
pub fn unobserve(root: &Value, path: &str, listener: &Listener) -> bool {
    with_engine(|engine| engine.unobserve(root, path, listener))
}

/// See [`crate::path::get`].
#[must_use]
pub fn get(object: &Value, path: &str) -> Value {
    crate::path::get(object, path)
}

/// See [`Engine::set`].
pub fn set(object: &Value, path: &str, value: impl Into<Value>) -> Option<Resolution> {
    with_engine(|engine| engine.set(object, path, value))
}

/// See [`Engine::notify`].
pub fn notify(
    object: &Value,
    path: &str,
    old_value: impl Into<Value>,
    new_value: impl Into<Value>,
) -> Resolution {
    with_engine(|engine| engine.notify(object, path, old_value, new_value))
}

/// See [`Engine::resolve`].
pub fn resolve(object: &Value, key: &str, old_value: &Value, new_value: &Value) -> Resolution {
    with_engine(|engine| engine.resolve(object, key, old_value, new_value))
}

/// See [`Engine::sweep`].
pub fn sweep() -> usize {
    with_engine(Engine::sweep)
}
