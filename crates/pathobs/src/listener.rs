#![forbid(unsafe_code)]

//! Change listeners and the record they receive.
//!
//! Closures have no identity of their own, so callbacks are wrapped in a
//! [`Listener`] handle. Clones of a handle are the *same* listener: observing
//! twice with clones of one handle registers once, and unobserving with any
//! clone removes it.

use std::fmt;
use std::rc::Rc;

use crate::registry::Origin;
use crate::value::{Object, Value};

/// Error reported by a fallible listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ListenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener failed: {}", self.message)
    }
}

impl std::error::Error for ListenerError {}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Result type returned by listener callbacks.
pub type ListenerResult = Result<(), ListenerError>;

type ListenerFn = dyn Fn(&Change) -> ListenerResult;

/// Identity of a [`Listener`], shared by all of its clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

/// A change callback with identity.
pub struct Listener {
    callback: Rc<ListenerFn>,
}

// Manual Clone: shares the same Rc, and therefore the same identity.
impl Clone for Listener {
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id()).finish()
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Listener {}

impl Listener {
    /// Wrap an infallible callback.
    pub fn new(callback: impl Fn(&Change) + 'static) -> Self {
        Self::fallible(move |change| {
            callback(change);
            Ok(())
        })
    }

    /// Wrap a callback that may report failure.
    pub fn fallible(callback: impl Fn(&Change) -> ListenerResult + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    #[must_use]
    pub fn id(&self) -> ListenerId {
        ListenerId(Rc::as_ptr(&self.callback) as *const () as usize)
    }

    pub(crate) fn call(&self, change: &Change) -> ListenerResult {
        (self.callback)(change)
    }
}

/// The record handed to a listener when an observed property changes.
#[derive(Debug, Clone)]
pub struct Change {
    /// Object whose property changed (the parent of the leaf).
    pub object: Object,
    /// Name of the changed property on `object`.
    pub key: String,
    pub old_value: Value,
    pub new_value: Value,
    /// Where the registration that fired sits relative to its root.
    pub origin: Origin,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let a = Listener::new(|_| {});
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn distinct_closures_differ() {
        let a = Listener::new(|_| {});
        let b = Listener::new(|_| {});
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn error_display() {
        let err = ListenerError::from("boom");
        assert_eq!(err.message(), "boom");
        assert_eq!(err.to_string(), "listener failed: boom");
    }
}
