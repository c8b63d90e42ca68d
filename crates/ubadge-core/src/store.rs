//! # Generic In-Memory Store
//!
//! Thread-safe, cloneable keyed record store. Clones share the same
//! underlying map, so a store handed to several components is one store.
//!
//! All operations are synchronous (the lock is `parking_lot`, not
//! `tokio::sync`) because the lock is never held across an `.await` point.
//! `parking_lot::RwLock` is non-poisonable: a panicking writer does not
//! permanently corrupt the store.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

/// Thread-safe keyed record store.
#[derive(Debug)]
pub struct Store<K, T> {
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K, T> Clone for Store<K, T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K, T> Store<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: K, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by key.
    pub fn get(&self, id: &K) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// First record matching the predicate, if any.
    ///
    /// Map iteration order is unspecified, so callers should only use this
    /// with predicates that match at most one record.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.data.read().values().find(|v| pred(v)).cloned()
    }

    /// All records matching the predicate.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data
            .read()
            .values()
            .filter(|v| pred(v))
            .cloned()
            .collect()
    }

    /// Update a record in place. Returns the updated record, or `None` if not found.
    pub fn update(&self, id: &K, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut guard = self.data.write();
        let entry = guard.get_mut(id)?;
        f(entry);
        Some(entry.clone())
    }

    /// Atomically read-validate-update a record.
    ///
    /// The closure receives a `&mut T` and may inspect the current state,
    /// validate preconditions, mutate the record, and return `Ok(R)` or
    /// `Err(E)`. The entire operation runs under a single write lock.
    /// A closure that returns `Err` must leave the record untouched.
    ///
    /// Returns `None` if the record doesn't exist, or `Some(result)` with
    /// the closure's `Result`.
    pub fn try_update<R, E>(
        &self,
        id: &K,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    /// Run a compound operation against the whole map under one write lock.
    ///
    /// Used for checks that span records, such as "no other record has
    /// this name" followed by an insert.
    pub fn transact<R>(&self, f: impl FnOnce(&mut HashMap<K, T>) -> R) -> R {
        f(&mut self.data.write())
    }

    /// Remove a record by key.
    pub fn remove(&self, id: &K) -> Option<T> {
        self.data.write().remove(id)
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &K) -> bool {
        self.data.read().contains_key(id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, T> Default for Store<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: String,
        count: u32,
    }

    fn item(name: &str) -> Item {
        Item {
            name: name.to_string(),
            count: 0,
        }
    }

    #[test]
    fn insert_and_get() {
        let store: Store<u32, Item> = Store::new();
        assert!(store.insert(1, item("a")).is_none());
        assert_eq!(store.get(&1), Some(item("a")));
        assert!(store.get(&2).is_none());
    }

    #[test]
    fn clones_share_data() {
        let store: Store<u32, Item> = Store::new();
        let other = store.clone();
        store.insert(1, item("a"));
        assert!(other.contains(&1));
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn update_mutates_in_place() {
        let store: Store<u32, Item> = Store::new();
        store.insert(1, item("a"));
        let updated = store.update(&1, |i| i.count += 1).unwrap();
        assert_eq!(updated.count, 1);
        assert_eq!(store.get(&1).unwrap().count, 1);
        assert!(store.update(&9, |i| i.count += 1).is_none());
    }

    #[test]
    fn try_update_propagates_closure_error() {
        let store: Store<u32, Item> = Store::new();
        store.insert(1, item("a"));
        let result: Option<Result<(), &str>> = store.try_update(&1, |_| Err("rejected"));
        assert_eq!(result, Some(Err("rejected")));
        assert!(store.try_update::<(), ()>(&2, |_| Ok(())).is_none());
    }

    #[test]
    fn find_and_filter() {
        let store: Store<u32, Item> = Store::new();
        store.insert(1, item("a"));
        store.insert(2, item("b"));
        store.insert(3, item("b"));
        assert_eq!(store.find(|i| i.name == "a"), Some(item("a")));
        assert_eq!(store.filter(|i| i.name == "b").len(), 2);
        assert!(store.find(|i| i.name == "z").is_none());
    }

    #[test]
    fn transact_sees_whole_map() {
        let store: Store<u32, Item> = Store::new();
        store.insert(1, item("a"));
        let inserted = store.transact(|map| {
            if map.values().any(|i| i.name == "a") {
                false
            } else {
                map.insert(2, item("a"));
                true
            }
        });
        assert!(!inserted);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_and_is_empty() {
        let store: Store<u32, Item> = Store::default();
        assert!(store.is_empty());
        store.insert(1, item("a"));
        assert_eq!(store.remove(&1), Some(item("a")));
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let store: Store<u32, Item> = Store::new();
        store.insert(1, item("a"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.update(&1, |i| i.count += 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get(&1).unwrap().count, 800);
    }
}
