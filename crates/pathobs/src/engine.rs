#![forbid(unsafe_code)]

//! The path observation engine.
//!
//! # Design
//!
//! [`Engine`] is a shared handle (`Rc<..>`) over one [`Registry`]. Cloning an
//! `Engine` creates a new handle to the **same** registry, so a listener can
//! capture a clone and mutate observed paths from inside its callback.
//!
//! `observe(root, "a.b.c.d", l)` registers `l` at every object along the
//! path: on `root` under `a`, on `root.a` under `b`, on `root.a.b` under `c`
//! and on `root.a.b.c` under `d`. Each registration carries an [`Origin`]
//! recording the root, the full path and the path to that node, which is
//! what lets [`Engine::resolve`] re-anchor listeners when an intermediate
//! object is replaced.
//!
//! # Invariants
//!
//! 1. Listeners fire synchronously, in registration order, before the
//!    triggering `set`/`notify` returns.
//! 2. Re-anchoring runs after every direct listener and never fires a
//!    listener a second time for the same change.
//! 3. No registry borrow is held while a listener runs; listeners may call
//!    back into the engine.
//! 4. The engine never keeps an observed object or root alive.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unreachable path | Non-object intermediate | Operation stops, no error |
//! | Dead root | Root dropped before re-anchoring | Registration pruned |
//! | Listener error | Fallible listener returned `Err` | Recorded in [`Resolution`], see [`FailurePolicy`] |

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[cfg(feature = "tracing")]
use tracing::{debug, trace, warn};

use crate::listener::{Change, Listener, ListenerError};
use crate::path::{Path, get_path, object_at, property};
use crate::registry::{Origin, Registry, RegistryStats};
use crate::value::{Object, Value};

/// What to do with the remaining listeners after one reports an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and keep notifying the remaining listeners.
    #[default]
    Isolate,
    /// Record the failure and skip the remaining listeners of this change.
    /// Re-anchoring still runs.
    Abort,
}

/// Configuration for an [`Engine`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub failure_policy: FailurePolicy,
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listener failure policy.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// A listener error captured during a resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerFailure {
    /// Property whose change was being delivered.
    pub key: String,
    /// Path the failing listener observed.
    pub full_path: Path,
    pub error: ListenerError,
}

/// Outcome of one [`Engine::resolve`] (and therefore of `set`/`notify`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Listeners invoked.
    pub notified: usize,
    /// Listener errors, in firing order.
    pub failures: Vec<ListenerFailure>,
    /// Registrations rebuilt against the current graph after their anchor
    /// object was replaced.
    pub reanchored: usize,
    /// Registrations removed from a detached subtree or for a dead root.
    pub pruned: usize,
}

impl Resolution {
    /// True when no listener reported an error.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct EngineInner {
    registry: RefCell<Registry>,
    config: EngineConfig,
}

/// Registers listeners on dotted paths and delivers changes to them.
///
/// # Example
///
/// ```
/// use pathobs::{Engine, Listener, Object, Value};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let engine = Engine::default();
/// let root = Value::from(Object::new().with("a", Object::new().with("b", 1)));
///
/// let seen = Rc::new(Cell::new(0.0));
/// let seen_clone = Rc::clone(&seen);
/// let listener = Listener::new(move |change| {
///     seen_clone.set(change.new_value.as_f64().unwrap_or_default());
/// });
///
/// engine.observe(&root, "a.b", &listener);
/// engine.set(&root, "a.b", 2);
/// assert_eq!(seen.get(), 2.0);
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("Engine")
            .field("objects", &stats.objects)
            .field("registrations", &stats.registrations)
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            inner: Rc::new(EngineInner {
                registry: RefCell::new(Registry::default()),
                config,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register `listener` on every object along `path` below `root`.
    ///
    /// Returns `false` when `root` is not an object, `path` is empty, or the
    /// walk hit a non-object before the last segment. Registrations made
    /// before that point are kept and still report changes to their own key.
    pub fn observe(&self, root: &Value, path: &str, listener: &Listener) -> bool {
        self.observe_path(root, &Path::new(path), listener)
    }

    /// Remove `listener` from every object along `path` below `root`.
    ///
    /// Missing registrations are ignored. Returns `false` when the walk
    /// stopped early.
    pub fn unobserve(&self, root: &Value, path: &str, listener: &Listener) -> bool {
        self.unobserve_path(root, &Path::new(path), listener)
    }

    fn observe_path(&self, root: &Value, path: &Path, listener: &Listener) -> bool {
        let Some(root_object) = root.as_object() else {
            return false;
        };
        if path.is_empty() {
            return false;
        }
        let mut cursor = root.clone();
        let mut prefix = Path::root();
        for segment in path.segments() {
            let Some(node) = cursor.as_object() else {
                return false;
            };
            self.inner
                .registry
                .borrow_mut()
                .insert(node, segment, listener, || {
                    Origin::new(root_object, path.clone(), prefix.clone())
                });
            let next = property(&cursor, segment);
            cursor = next;
            prefix = prefix.child(segment);
        }
        true
    }

    fn unobserve_path(&self, root: &Value, path: &Path, listener: &Listener) -> bool {
        if !root.is_object() || path.is_empty() {
            return false;
        }
        let id = listener.id();
        let mut cursor = root.clone();
        for segment in path.segments() {
            let Some(node) = cursor.as_object() else {
                return false;
            };
            // Released after the borrow; its listener may re-enter on drop.
            let removed = self
                .inner
                .registry
                .borrow_mut()
                .remove(node.id(), segment, id);
            drop(removed);
            let next = property(&cursor, segment);
            cursor = next;
        }
        true
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Value at `path` below `object`; see [`crate::path::get`].
    #[must_use]
    pub fn get(&self, object: &Value, path: &str) -> Value {
        crate::path::get(object, path)
    }

    /// Assign `value` at `path` and deliver the change.
    ///
    /// Returns `None` (and changes nothing) when `object` is not an object,
    /// `path` is empty, or the parent of the last segment is unreachable.
    pub fn set(&self, object: &Value, path: &str, value: impl Into<Value>) -> Option<Resolution> {
        if !object.is_object() {
            return None;
        }
        let path = Path::new(path);
        let (parent_path, key) = path.split_last()?;
        let parent = object_at(object, &parent_path)?;
        let value = value.into();
        let old = parent.insert(key, value.clone()).unwrap_or_default();
        Some(self.resolve_object(&parent, key, &old, &value))
    }

    /// Deliver a change that was already applied outside of [`set`](Self::set).
    pub fn notify(
        &self,
        object: &Value,
        path: &str,
        old_value: impl Into<Value>,
        new_value: impl Into<Value>,
    ) -> Resolution {
        let path = Path::new(path);
        let Some((parent_path, key)) = path.split_last() else {
            return Resolution::default();
        };
        let parent = get_path(object, &parent_path);
        self.resolve(&parent, key, &old_value.into(), &new_value.into())
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Fire the listeners of (`object`, `key`), then re-anchor listeners
    /// registered beneath `old_value` if it is an observed object.
    ///
    /// A non-object `object` or a key without listeners is a no-op.
    pub fn resolve(
        &self,
        object: &Value,
        key: &str,
        old_value: &Value,
        new_value: &Value,
    ) -> Resolution {
        match object.as_object() {
            Some(object) => self.resolve_object(object, key, old_value, new_value),
            None => Resolution::default(),
        }
    }

    fn resolve_object(
        &self,
        object: &Object,
        key: &str,
        old_value: &Value,
        new_value: &Value,
    ) -> Resolution {
        let registrations = self.inner.registry.borrow().registrations(object.id(), key);
        let mut resolution = Resolution::default();
        if registrations.is_empty() {
            return resolution;
        }

        #[cfg(feature = "tracing")]
        trace!(
            object = %object.id(),
            key,
            listeners = registrations.len(),
            "resolve"
        );

        for registration in &registrations {
            let change = Change {
                object: object.clone(),
                key: key.to_owned(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
                origin: registration.origin.clone(),
            };
            resolution.notified += 1;
            if let Err(error) = registration.listener.call(&change) {
                #[cfg(feature = "tracing")]
                warn!(
                    key,
                    path = %registration.origin.full_path(),
                    error = %error,
                    "listener failed"
                );
                resolution.failures.push(ListenerFailure {
                    key: key.to_owned(),
                    full_path: registration.origin.full_path().clone(),
                    error,
                });
                if self.inner.config.failure_policy == FailurePolicy::Abort {
                    break;
                }
            }
        }

        if let Value::Object(old_object) = old_value {
            self.reanchor(old_object, &mut resolution);
        }
        resolution
    }

    /// Rebuild every registration held by `old` against the current graph
    /// and drop the ones whose anchor no longer routes through `old`.
    fn reanchor(&self, old: &Object, resolution: &mut Resolution) {
        // Iterate a snapshot; the live entry is mutated below.
        let Some(snapshot) = self.inner.registry.borrow().snapshot(old.id()) else {
            return;
        };
        let old_value = Value::Object(old.clone());

        for (key, registration) in snapshot {
            let listener = &registration.listener;
            let origin = &registration.origin;

            let Some(root) = origin.root() else {
                self.detach(&old_value, &key, listener, origin);
                resolution.pruned += 1;
                #[cfg(feature = "tracing")]
                debug!(key = %key, path = %origin.full_path(), "pruned registration with dead root");
                continue;
            };

            let root = Value::Object(root);
            self.unobserve_path(&root, origin.full_path(), listener);
            self.observe_path(&root, origin.full_path(), listener);
            resolution.reanchored += 1;

            #[cfg(feature = "tracing")]
            trace!(
                key = %key,
                path = %origin.full_path(),
                prefix = %origin.prefix_path(),
                "re-anchored registration"
            );

            if !get_path(&root, origin.prefix_path()).is_same_object(&old_value) {
                self.detach(&old_value, &key, listener, origin);
                resolution.pruned += 1;
                #[cfg(feature = "tracing")]
                debug!(key = %key, path = %origin.full_path(), "pruned registration from detached subtree");
            }
        }
    }

    /// Remove a registration and everything below it from a detached subtree.
    fn detach(&self, old: &Value, key: &str, listener: &Listener, origin: &Origin) {
        self.unobserve_path(old, &origin.remainder(), listener);
        if let Some(old_object) = old.as_object() {
            let removed = self
                .inner
                .registry
                .borrow_mut()
                .remove(old_object.id(), key, listener.id());
            drop(removed);
        }
    }

    // ========================================================================
    // Introspection & lifecycle
    // ========================================================================

    /// Number of listeners registered at (`object`, `key`).
    #[must_use]
    pub fn listener_count(&self, object: &Object, key: &str) -> usize {
        self.inner
            .registry
            .borrow()
            .listener_count(object.id(), key)
    }

    /// Whether any listener is registered on `object`.
    #[must_use]
    pub fn is_tracked(&self, object: &Object) -> bool {
        self.inner.registry.borrow().contains(object.id())
    }

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.inner.registry.borrow().stats()
    }

    /// Drop registry entries of objects that no longer exist.
    ///
    /// Returns the number of object entries removed.
    pub fn sweep(&self) -> usize {
        let dead = self.inner.registry.borrow_mut().sweep();
        let removed = dead.len();
        drop(dead);
        #[cfg(feature = "tracing")]
        if removed > 0 {
            debug!(removed, "swept dead registry entries");
        }
        removed
    }

    /// Remove every registration.
    ///
    /// Listeners are dropped after the registry is released, so a listener
    /// whose captured state calls back into the engine on drop is safe.
    pub fn clear(&self) {
        let removed = self.inner.registry.borrow_mut().take();
        drop(removed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
