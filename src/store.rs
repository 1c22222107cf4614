use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::AppResult;

/// Pluggable keyed storage for a single entity type.
///
/// Components receive an `Arc<dyn EntityStore<T>>` at construction, so the same
/// orchestration logic runs against the in-memory map in tests and a durable
/// store in production.
pub trait EntityStore<T>: Send + Sync
where
    T: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> AppResult<Option<T>>;

    fn put(&self, key: &str, value: T) -> AppResult<()>;

    /// Removes and returns the stored value, if any
    fn delete(&self, key: &str) -> AppResult<Option<T>>;

    fn values(&self) -> AppResult<Vec<T>>;
}

pub struct InMemoryStore<T> {
    entries: RwLock<HashMap<String, T>>,
}

impl<T> InMemoryStore<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EntityStore<T> for InMemoryStore<T>
where
    T: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> AppResult<Option<T>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: T) -> AppResult<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> AppResult<Option<T>> {
        Ok(self.entries.write().remove(key))
    }

    fn values(&self) -> AppResult<Vec<T>> {
        Ok(self.entries.read().values().cloned().collect())
    }
}

/// Per-key mutual exclusion: mutations on one key are serialized while
/// distinct keys proceed concurrently.
#[derive(Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock slot for `key`; hold `slot.lock()` for the duration of the mutation
    pub fn slot(&self, key: &str) -> Arc<Mutex<()>> {
        self.slots
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops idle slots so the table does not grow with every key ever seen
    pub fn prune(&self) {
        self.slots
            .lock()
            .retain(|_, slot| Arc::strong_count(slot) > 1 || slot.is_locked());
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store_crud() {
        let store: InMemoryStore<u32> = InMemoryStore::new();
        assert!(store.get("a").unwrap().is_none());

        store.put("a", 1).unwrap();
        store.put("b", 2).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(1));
        assert_eq!(store.len(), 2);

        assert_eq!(store.delete("a").unwrap(), Some(1));
        assert_eq!(store.delete("a").unwrap(), None);
        assert_eq!(store.values().unwrap(), vec![2]);
    }

    #[test]
    fn test_keyed_locks_share_slot_per_key() {
        let locks = KeyedLocks::new();
        let a1 = locks.slot("alice");
        let a2 = locks.slot("alice");
        let b = locks.slot("bob");

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));

        let _guard = a1.lock();
        assert!(a2.try_lock().is_none());
        assert!(b.try_lock().is_some());
    }

    #[test]
    fn test_prune_keeps_held_slots() {
        let locks = KeyedLocks::new();
        let held = locks.slot("held");
        drop(locks.slot("idle"));

        locks.prune();
        assert_eq!(locks.len(), 1);
        drop(held);

        locks.prune();
        assert!(locks.is_empty());
    }
}
