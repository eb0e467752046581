//! Cache storage backends.
//!
//! The cache layer is storage-agnostic: anything implementing [`CacheStore`]
//! can hold compressed payloads. Two in-memory stores ship with the crate; a
//! shared backend (redis, memcached) plugs in the same way.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;

/// Pluggable storage for compressed payloads.
///
/// Operations are infallible by signature: a backend that can fail (network
/// store, disk) maps its errors to "miss" on reads and "no-op" on writes, so
/// a broken store degrades to recompressing rather than failing responses.
pub trait CacheStore: Send + Sync {
    /// Look up a payload by key.
    fn get(&self, key: &str) -> Option<Bytes>;

    /// Store a payload under a key, replacing any existing entry.
    fn set(&self, key: &str, payload: Bytes);

    /// Check for a key without copying the payload out.
    fn has(&self, key: &str) -> bool;

    /// Remove a key. Removing an absent key is a no-op.
    fn delete(&self, key: &str);
}

/// Unbounded in-memory store.
///
/// The default backend; suitable when entry lifetimes are bounded by TTLs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Bytes> {
        self.entries.read().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, payload: Bytes) {
        self.entries.write().unwrap().insert(key.to_string(), payload);
    }

    fn has(&self, key: &str) -> bool {
        self.entries.read().unwrap().contains_key(key)
    }

    fn delete(&self, key: &str) {
        self.entries.write().unwrap().remove(key);
    }
}

/// Bounded in-memory store with least-recently-used eviction.
///
/// Reads refresh recency; inserting past capacity evicts the coldest entry.
#[derive(Debug)]
pub struct LruStore {
    entries: RwLock<HashMap<Box<str>, Bytes>>,
    order: RwLock<Vec<Box<str>>>,
    capacity: usize,
}

impl LruStore {
    /// Create a store holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(capacity)),
            order: RwLock::new(Vec::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Move a key to the most-recently-used position.
    fn touch(&self, key: &str) {
        let mut order = self.order.write().unwrap();
        if let Some(pos) = order.iter().position(|k| k.as_ref() == key) {
            let entry = order.remove(pos);
            order.push(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for LruStore {
    fn get(&self, key: &str) -> Option<Bytes> {
        let payload = self.entries.read().unwrap().get(key).cloned();
        if payload.is_some() {
            self.touch(key);
        }
        payload
    }

    fn set(&self, key: &str, payload: Bytes) {
        let mut entries = self.entries.write().unwrap();
        let mut order = self.order.write().unwrap();

        if let Some(pos) = order.iter().position(|k| k.as_ref() == key) {
            let entry = order.remove(pos);
            order.push(entry);
            entries.insert(key.into(), payload);
            return;
        }

        if entries.len() >= self.capacity {
            if !order.is_empty() {
                let coldest = order.remove(0);
                entries.remove(&coldest);
            }
        }
        entries.insert(key.into(), payload);
        order.push(key.into());
    }

    fn has(&self, key: &str) -> bool {
        self.entries.read().unwrap().contains_key(key)
    }

    fn delete(&self, key: &str) {
        self.entries.write().unwrap().remove(key);
        let mut order = self.order.write().unwrap();
        if let Some(pos) = order.iter().position(|k| k.as_ref() == key) {
            order.remove(pos);
        }
    }
}
