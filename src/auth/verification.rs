use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;

/// Short-lived key-value store for one-shot credentials
pub trait ExpiringStore<K, V>: Send + Sync {
    fn put(&self, key: K, value: V, ttl: Duration);

    /// Removes and returns the value if it is present and not expired.
    fn take_if_present(&self, key: &K) -> Option<V>;
}

/// In-process [`ExpiringStore`] guarded by a single mutex
pub struct MemoryExpiringStore<K, V> {
    entries: Mutex<HashMap<K, (V, DateTime<Utc>)>>,
    clock: Arc<dyn Clock>,
}

impl<K: Eq + Hash, V> MemoryExpiringStore<K, V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, (V, DateTime<Utc>)>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<K: Eq + Hash + Send, V: Send> ExpiringStore<K, V> for MemoryExpiringStore<K, V> {
    fn put(&self, key: K, value: V, ttl: Duration) {
        let now = self.clock.now();
        let mut entries = self.lock();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(key, (value, now + ttl));
    }

    fn take_if_present(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let (value, expires_at) = self.lock().remove(key)?;
        if expires_at > now {
            Some(value)
        } else {
            None
        }
    }
}

/// Random numeric code of `length` digits
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
