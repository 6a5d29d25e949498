#![forbid(unsafe_code)]

//! Shared object graph walked by the observation engine.
//!
//! # Design
//!
//! [`Object`] is a handle to a string-keyed property map stored in shared,
//! reference-counted storage (`Rc<RefCell<..>>`). Cloning a handle never
//! copies the object: every clone observes and mutates the same properties,
//! and every clone has the same [`ObjectId`].
//!
//! [`Value`] is the dynamic value stored in a property. Scalars compare by
//! value, objects compare by **identity**, so two structurally equal objects
//! are different values.
//!
//! # Invariants
//!
//! 1. Property order is insertion order; overwriting a key keeps its slot.
//! 2. An [`ObjectId`] stays unique while any strong or weak handle to the
//!    object exists (a weak handle pins the allocation, not the value).
//! 3. [`WeakObject::upgrade`] returns `None` once every strong handle is gone.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Property storage behind an [`Object`] handle.
#[derive(Default)]
struct ObjectData {
    props: Vec<(String, Value)>,
}

impl ObjectData {
    fn position(&self, key: &str) -> Option<usize> {
        self.props.iter().position(|(k, _)| k == key)
    }
}

/// Identity of an object allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.0)
    }
}

/// A shared, identity-bearing property map.
pub struct Object {
    inner: Rc<RefCell<ObjectData>>,
}

// Manual Clone: shares the same Rc.
impl Clone for Object {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    // Shallow on purpose: object graphs may contain cycles.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self.keys();
        f.debug_struct("Object")
            .field("id", &self.id())
            .field("keys", &keys)
            .finish()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

impl Object {
    /// Create an empty object.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObjectData::default())),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Identity of this object.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        ObjectId(Rc::as_ptr(&self.inner) as *const () as usize)
    }

    /// True when both handles point at the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Create a non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakObject {
        WeakObject {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Property value, or `None` when the key is absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let data = self.inner.borrow();
        data.position(key).map(|i| data.props[i].1.clone())
    }

    /// Set a property, returning the previous value if the key existed.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        let mut data = self.inner.borrow_mut();
        match data.position(&key) {
            Some(i) => Some(std::mem::replace(&mut data.props[i].1, value)),
            None => {
                data.props.push((key, value));
                None
            }
        }
    }

    /// Delete a property, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut data = self.inner.borrow_mut();
        let i = data.position(key)?;
        Some(data.props.remove(i).1)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.borrow().position(key).is_some()
    }

    /// Property names in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .borrow()
            .props
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().props.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of strong handles currently alive.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let object = Object::new();
        for (k, v) in iter {
            object.insert(k, v);
        }
        object
    }
}

/// Non-owning handle to an [`Object`].
#[derive(Clone)]
pub struct WeakObject {
    inner: Weak<RefCell<ObjectData>>,
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObject")
            .field("id", &self.id())
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl WeakObject {
    /// Recover a strong handle if the object is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Object> {
        self.inner.upgrade().map(|inner| Object { inner })
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Identity of the referenced allocation, valid even after the object died.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        ObjectId(self.inner.as_ptr() as *const () as usize)
    }
}

/// A property value.
#[derive(Clone, Default)]
pub enum Value {
    /// The uniform "no value" sentinel; missing properties read as `Null`.
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(Object),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// True when both values are the same object.
    #[must_use]
    pub fn is_same_object(&self, other: &Value) -> bool {
        matches!((self, other), (Value::Object(a), Value::Object(b)) if a.ptr_eq(b))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(o) => write!(f, "Object({})", o.id()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

// Counts and offsets beyond 2^53 lose precision.
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<&Object> for Value {
    fn from(o: &Object) -> Self {
        Value::Object(o.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// JSON interop
// ---------------------------------------------------------------------------

#[cfg(feature = "json")]
mod json {
    use super::{Object, ObjectId, Value};

    impl Value {
        /// Build a fresh object graph from JSON.
        ///
        /// Arrays become objects keyed by their decimal indices.
        #[must_use]
        pub fn from_json(json: &serde_json::Value) -> Value {
            match json {
                serde_json::Value::Null => Value::Null,
                serde_json::Value::Bool(b) => Value::Bool(*b),
                serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
                serde_json::Value::String(s) => Value::String(s.clone()),
                serde_json::Value::Array(items) => Value::Object(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| (i.to_string(), Value::from_json(item)))
                        .collect(),
                ),
                serde_json::Value::Object(map) => Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), Value::from_json(v)))
                        .collect::<Object>(),
                ),
            }
        }

        /// Render as JSON. A reference that closes a cycle renders as `null`.
        #[must_use]
        pub fn to_json(&self) -> serde_json::Value {
            let mut stack = Vec::new();
            render(self, &mut stack)
        }
    }

    fn render(value: &Value, stack: &mut Vec<ObjectId>) -> serde_json::Value {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Object(object) => {
                let id = object.id();
                if stack.contains(&id) {
                    return serde_json::Value::Null;
                }
                stack.push(id);
                let mut map = serde_json::Map::new();
                for key in object.keys() {
                    let child = object.get(&key).unwrap_or_default();
                    map.insert(key, render(&child, stack));
                }
                stack.pop();
                serde_json::Value::Object(map)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_returns_previous() {
        let o = Object::new();
        assert_eq!(o.insert("a", 1), None);
        assert_eq!(o.insert("a", 2), Some(Value::from(1)));
        assert_eq!(o.get("a"), Some(Value::from(2)));
        assert_eq!(o.len(), 1);
    }

    #[test]
    fn overwrite_keeps_insertion_slot() {
        let o = Object::new().with("x", 1).with("y", 2).with("z", 3);
        o.insert("x", 10);
        assert_eq!(o.keys(), vec!["x", "y", "z"]);
    }

    #[test]
    fn remove_deletes_property() {
        let o = Object::new().with("a", true);
        assert_eq!(o.remove("a"), Some(Value::Bool(true)));
        assert!(!o.contains_key("a"));
        assert_eq!(o.remove("a"), None);
        assert!(o.is_empty());
    }

    #[test]
    fn clones_share_identity() {
        let a = Object::new();
        let b = a.clone();
        b.insert("k", "v");
        assert_eq!(a.get("k"), Some(Value::from("v")));
        assert_eq!(a.id(), b.id());
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn structurally_equal_objects_differ() {
        let a = Object::new().with("k", 1);
        let b = Object::new().with("k", 1);
        assert_ne!(Value::from(&a), Value::from(&b));
        assert_ne!(a.id(), b.id());
        assert!(Value::from(&a).is_same_object(&Value::from(&a)));
    }

    #[test]
    fn weak_handle_does_not_keep_object_alive() {
        let o = Object::new();
        let weak = o.downgrade();
        let id = o.id();
        assert!(weak.upgrade().is_some());
        drop(o);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
        assert_eq!(weak.id(), id);
    }

    #[test]
    fn scalar_accessors() {
        assert_eq!(Value::from(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::from("s").as_str(), Some("s"));
        assert_eq!(Value::from(false).as_bool(), Some(false));
        assert!(Value::from(None::<i32>).is_null());
        assert!(Value::Null.as_object().is_none());
    }

    #[test]
    fn wide_integers_convert_to_numbers() {
        assert_eq!(Value::from(3usize).as_f64(), Some(3.0));
        assert_eq!(Value::from(-4i64).as_f64(), Some(-4.0));
        let o = Object::new().with("len", [1, 2, 3].len());
        assert_eq!(o.get("len"), Some(Value::from(3)));
    }

    #[test]
    fn from_iter_builds_object() {
        let o: Object = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(o.keys(), vec!["a", "b"]);
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_round_trip() {
        let json = serde_json::json!({"a": {"b": [1, "two", null]}, "c": true});
        let value = Value::from_json(&json);
        let a = value.as_object().and_then(|o| o.get("a")).unwrap_or_default();
        assert!(a.is_object());
        assert_eq!(
            value.to_json(),
            serde_json::json!({"a": {"b": {"0": 1.0, "1": "two", "2": null}}, "c": true})
        );
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_cycle_renders_null() {
        let o = Object::new().with("n", 1);
        o.insert("me", &o);
        assert_eq!(
            Value::from(&o).to_json(),
            serde_json::json!({"n": 1.0, "me": null})
        );
        // Break the cycle so the test does not leak.
        o.remove("me");
    }
}
