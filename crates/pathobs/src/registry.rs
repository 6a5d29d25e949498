#![forbid(unsafe_code)]

//! Identity-keyed listener registry.
//!
//! ```text
//! Registry
//!   object #1  (weak)
//!     "a" -> [ (listener 1, origin), (listener 2, origin) ]
//!     "b" -> [ (listener 3, origin) ]
//!   object #2  (weak)
//!     "b" -> [ (listener 4, origin) ]
//! ```
//!
//! # Invariants
//!
//! 1. At most one registration per (object, key, listener).
//! 2. Registrations within a key keep insertion order (firing order).
//! 3. The registry never holds a strong handle to an observed object or to
//!    an origin root. Each entry's weak handle pins the allocation, so an
//!    [`ObjectId`] in the map cannot be reused by another object.
//! 4. No empty key lists and no empty object entries are retained.
//! 5. Mutating operations hand removed registrations back to the caller
//!    instead of dropping them. A listener's captured state may re-enter the
//!    engine from `Drop`, so it must be released after the registry borrow
//!    ends.

use rustc_hash::FxHashMap;

use crate::listener::{Listener, ListenerId};
use crate::path::Path;
use crate::value::{Object, ObjectId, WeakObject};

/// Where a registration sits relative to the root it was observed from.
#[derive(Debug, Clone)]
pub struct Origin {
    root: WeakObject,
    full_path: Path,
    prefix_path: Path,
}

impl Origin {
    pub(crate) fn new(root: &Object, full_path: Path, prefix_path: Path) -> Self {
        Self {
            root: root.downgrade(),
            full_path,
            prefix_path,
        }
    }

    /// The root passed to `observe`, if it is still alive.
    #[must_use]
    pub fn root(&self) -> Option<Object> {
        self.root.upgrade()
    }

    /// The complete path that was observed.
    #[must_use]
    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    /// Path from the root to the node holding this registration.
    #[must_use]
    pub fn prefix_path(&self) -> &Path {
        &self.prefix_path
    }

    /// `full_path` below this node (starts with this node's key).
    #[must_use]
    pub fn remainder(&self) -> Path {
        self.full_path
            .strip_prefix(&self.prefix_path)
            .unwrap_or_else(|| self.full_path.clone())
    }
}

/// One listener registered at one (object, key).
#[derive(Debug, Clone)]
pub(crate) struct Registration {
    pub(crate) listener: Listener,
    pub(crate) origin: Origin,
}

#[derive(Debug, Default)]
struct KeyEntry {
    key: String,
    registrations: Vec<Registration>,
}

#[derive(Debug)]
pub(crate) struct ObjectEntry {
    object: WeakObject,
    keys: Vec<KeyEntry>,
}

impl ObjectEntry {
    fn key(&self, key: &str) -> Option<&KeyEntry> {
        self.keys.iter().find(|k| k.key == key)
    }

    fn registration_count(&self) -> usize {
        self.keys.iter().map(|k| k.registrations.len()).sum()
    }
}

/// Summary of registry contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Objects with at least one registration.
    pub objects: usize,
    /// (object, key) pairs with at least one registration.
    pub keys: usize,
    /// Total registrations.
    pub registrations: usize,
    /// Objects whose entry remains but whose object has been dropped.
    pub dead_objects: usize,
}

/// Object identity → key → ordered registrations.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    objects: FxHashMap<ObjectId, ObjectEntry>,
}

impl Registry {
    /// Insert unless the listener is already registered at (object, key).
    ///
    /// Returns `true` when a registration was added.
    pub(crate) fn insert(
        &mut self,
        object: &Object,
        key: &str,
        listener: &Listener,
        origin: impl FnOnce() -> Origin,
    ) -> bool {
        let entry = self
            .objects
            .entry(object.id())
            .or_insert_with(|| ObjectEntry {
                object: object.downgrade(),
                keys: Vec::new(),
            });
        let key_entry = match entry.keys.iter().position(|k| k.key == key) {
            Some(i) => &mut entry.keys[i],
            None => {
                entry.keys.push(KeyEntry {
                    key: key.to_owned(),
                    registrations: Vec::new(),
                });
                let last = entry.keys.len() - 1;
                &mut entry.keys[last]
            }
        };
        let id = listener.id();
        if key_entry
            .registrations
            .iter()
            .any(|r| r.listener.id() == id)
        {
            return false;
        }
        key_entry.registrations.push(Registration {
            listener: listener.clone(),
            origin: origin(),
        });
        true
    }

    /// Remove the listener at (object, key) and return its registration.
    pub(crate) fn remove(
        &mut self,
        object: ObjectId,
        key: &str,
        listener: ListenerId,
    ) -> Option<Registration> {
        let entry = self.objects.get_mut(&object)?;
        let ki = entry.keys.iter().position(|k| k.key == key)?;
        let registrations = &mut entry.keys[ki].registrations;
        let ri = registrations.iter().position(|r| r.listener.id() == listener)?;
        let removed = registrations.remove(ri);
        if registrations.is_empty() {
            entry.keys.remove(ki);
        }
        if entry.keys.is_empty() {
            self.objects.remove(&object);
        }
        Some(removed)
    }

    /// Registrations at (object, key), cloned so callers can run listeners
    /// without holding the registry.
    pub(crate) fn registrations(&self, object: ObjectId, key: &str) -> Vec<Registration> {
        self.objects
            .get(&object)
            .and_then(|entry| entry.key(key))
            .map(|k| k.registrations.clone())
            .unwrap_or_default()
    }

    /// Every (key, registration) held by `object`, in key then insertion order.
    pub(crate) fn snapshot(&self, object: ObjectId) -> Option<Vec<(String, Registration)>> {
        let entry = self.objects.get(&object)?;
        Some(
            entry
                .keys
                .iter()
                .flat_map(|k| {
                    k.registrations
                        .iter()
                        .map(move |r| (k.key.clone(), r.clone()))
                })
                .collect(),
        )
    }

    pub(crate) fn listener_count(&self, object: ObjectId, key: &str) -> usize {
        self.objects
            .get(&object)
            .and_then(|entry| entry.key(key))
            .map_or(0, |k| k.registrations.len())
    }

    pub(crate) fn contains(&self, object: ObjectId) -> bool {
        self.objects.contains_key(&object)
    }

    /// Drop entries whose object has been dropped. Returns how many.
    /// Take out the entries of objects that have been dropped.
    pub(crate) fn sweep(&mut self) -> Vec<ObjectEntry> {
        let dead: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|(_, entry)| !entry.object.is_alive())
            .map(|(&id, _)| id)
            .collect();
        dead.into_iter()
            .filter_map(|id| self.objects.remove(&id))
            .collect()
    }

    /// Take out every entry, leaving the registry empty.
    pub(crate) fn take(&mut self) -> Vec<ObjectEntry> {
        std::mem::take(&mut self.objects).into_values().collect()
    }

    pub(crate) fn stats(&self) -> RegistryStats {
        self.objects
            .values()
            .fold(RegistryStats::default(), |mut stats, entry| {
                stats.objects += 1;
                stats.keys += entry.keys.len();
                stats.registrations += entry.registration_count();
                if !entry.object.is_alive() {
                    stats.dead_objects += 1;
                }
                stats
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
