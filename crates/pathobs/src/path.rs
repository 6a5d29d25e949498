#![forbid(unsafe_code)]

//! Dotted property paths and traversal.
//!
//! A path such as `"a.b.c"` names the value reached by reading property `a`
//! of a root object, then `b` of that, then `c`. Segments are plain property
//! names: there is no index or escape syntax, and `"a..b"` has an empty
//! middle segment.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Non-object intermediate | `a` is a number, string, or `Null` | [`get`] returns `Null` |
//! | Missing leaf | Last key absent | [`get`] returns `Null` |
//! | Empty path | `""` | [`get`] returns the root itself |

use std::fmt;

use crate::value::{Object, Value};

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// A dotted property path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    raw: String,
}

impl Path {
    /// The empty path, naming the root itself.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Segments in traversal order. The empty path has none.
    pub fn segments(&self) -> impl Iterator<Item = &str> + '_ {
        let mut split = (!self.raw.is_empty()).then(|| self.raw.split(SEPARATOR));
        std::iter::from_fn(move || split.as_mut()?.next())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments().count()
    }

    /// This path extended by one segment.
    #[must_use]
    pub fn child(&self, segment: &str) -> Path {
        if self.raw.is_empty() {
            Path::new(segment)
        } else {
            Path::new(format!("{}{SEPARATOR}{segment}", self.raw))
        }
    }

    /// Split into the parent path and the last segment.
    #[must_use]
    pub fn split_last(&self) -> Option<(Path, &str)> {
        if self.raw.is_empty() {
            return None;
        }
        Some(match self.raw.rsplit_once(SEPARATOR) {
            Some((parent, last)) => (Path::new(parent), last),
            None => (Path::root(), self.raw.as_str()),
        })
    }

    /// The part of this path below `prefix`, without the separator.
    ///
    /// Returns `None` when `prefix` is not a segment-aligned prefix.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &Path) -> Option<Path> {
        if prefix.is_empty() {
            return Some(self.clone());
        }
        let rest = self.raw.strip_prefix(prefix.as_str())?;
        if rest.is_empty() {
            return Some(Path::root());
        }
        rest.strip_prefix(SEPARATOR).map(Path::new)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Path {
    fn from(raw: &str) -> Self {
        Path::new(raw)
    }
}

impl From<String> for Path {
    fn from(raw: String) -> Self {
        Path::new(raw)
    }
}

impl PartialEq<str> for Path {
    fn eq(&self, other: &str) -> bool {
        self.raw == other
    }
}

impl PartialEq<&str> for Path {
    fn eq(&self, other: &&str) -> bool {
        self.raw == *other
    }
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Read one property, treating non-objects and missing keys as `Null`.
#[must_use]
pub(crate) fn property(value: &Value, key: &str) -> Value {
    value
        .as_object()
        .and_then(|object| object.get(key))
        .unwrap_or_default()
}

/// Walk `path` from `root` and return the object it names.
///
/// `None` when any step (including the last) is not an object.
#[must_use]
pub(crate) fn object_at(root: &Value, path: &Path) -> Option<Object> {
    let mut cursor = root.clone();
    for segment in path.segments() {
        cursor = property(&cursor, segment);
    }
    match cursor {
        Value::Object(object) => Some(object),
        _ => None,
    }
}

/// Value at `path` below `root`, `Null` when unreachable.
///
/// The empty path yields `root` itself.
#[must_use]
pub fn get(root: &Value, path: &str) -> Value {
    get_path(root, &Path::new(path))
}

#[must_use]
pub(crate) fn get_path(root: &Value, path: &Path) -> Value {
    match path.split_last() {
        None => root.clone(),
        Some((parent, key)) => object_at(root, &parent)
            .and_then(|object| object.get(key))
            .unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Value {
        Value::from(Object::new().with(
            "a",
            Object::new().with("b", Object::new().with("c", 7)).with("n", 1),
        ))
    }

    #[test]
    fn segments_split_on_dots() {
        let p = Path::new("a.b.c");
        assert_eq!(p.segments().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(p.len(), 3);
        assert_eq!(Path::root().segments().count(), 0);
        assert_eq!(Path::new("a..b").len(), 3);
    }

    #[test]
    fn child_joins_with_separator() {
        assert_eq!(Path::root().child("a"), "a");
        assert_eq!(Path::new("a").child("b"), "a.b");
    }

    #[test]
    fn split_last_separates_leaf() {
        let p = Path::new("a.b.c");
        let (parent, leaf) = p.split_last().unwrap();
        assert_eq!(parent, "a.b");
        assert_eq!(leaf, "c");

        let single = Path::new("k");
        let (parent, leaf) = single.split_last().unwrap();
        assert!(parent.is_empty());
        assert_eq!(leaf, "k");

        assert!(Path::root().split_last().is_none());
    }

    #[test]
    fn strip_prefix_is_segment_aligned() {
        let full = Path::new("a.b.c.d");
        assert_eq!(full.strip_prefix(&Path::root()).unwrap(), "a.b.c.d");
        assert_eq!(full.strip_prefix(&Path::new("a")).unwrap(), "b.c.d");
        assert_eq!(full.strip_prefix(&Path::new("a.b.c")).unwrap(), "d");
        assert!(full.strip_prefix(&full).unwrap().is_empty());
        assert!(full.strip_prefix(&Path::new("a.b.c.d.e")).is_none());
        assert!(Path::new("ab.c").strip_prefix(&Path::new("a")).is_none());
    }

    #[test]
    fn get_walks_nested_objects() {
        let root = nested();
        assert_eq!(get(&root, "a.b.c"), Value::from(7));
        assert_eq!(get(&root, "a.n"), Value::from(1));
        assert!(get(&root, "a.b").is_object());
    }

    #[test]
    fn get_empty_path_returns_root() {
        let root = nested();
        assert!(get(&root, "").is_same_object(&root));
    }

    #[test]
    fn get_missing_is_null() {
        let root = nested();
        assert!(get(&root, "a.zzz").is_null());
        assert!(get(&root, "a.zzz.deeper").is_null());
        // Through a number.
        assert!(get(&root, "a.n.x").is_null());
        assert!(get(&Value::from(3), "x").is_null());
    }

    #[test]
    fn object_at_requires_object_leaf() {
        let root = nested();
        assert!(object_at(&root, &Path::new("a.b")).is_some());
        assert!(object_at(&root, &Path::new("a.n")).is_none());
        assert!(object_at(&root, &Path::root()).is_some());
    }
}
