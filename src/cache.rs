//! Time-bounded cache of loaded sources.
//!
//! Several selections over the same export should not re-read and re-decode
//! the file each time. Entries are shared as `Arc`s and expire after a fixed
//! time-to-live; callers may also drop them explicitly.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use anyhow::{Result, anyhow};
use log::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

pub struct SourceCache<V> {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, Arc<V>)>>,
}

impl<V> Default for SourceCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<V> SourceCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn fresh(&self, loaded_at: Instant) -> bool {
        loaded_at.elapsed() < self.ttl
    }

    /// Returns the cached value for `key`, running `loader` on a miss or
    /// after expiry. A failed load leaves the cache unchanged.
    pub fn get_or_load<F>(&self, key: &str, loader: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Result<V>,
    {
        {
            let entries = self
                .entries
                .read()
                .map_err(|_| anyhow!("Source cache lock poisoned"))?;
            if let Some((loaded_at, value)) = entries.get(key)
                && self.fresh(*loaded_at)
            {
                debug!("Source cache hit for '{key}'");
                return Ok(Arc::clone(value));
            }
        }

        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow!("Source cache lock poisoned"))?;
        // Another caller may have loaded it while we waited.
        if let Some((loaded_at, value)) = entries.get(key)
            && self.fresh(*loaded_at)
        {
            return Ok(Arc::clone(value));
        }
        debug!("Source cache miss for '{key}'");
        let value = Arc::new(loader()?);
        entries.insert(key.to_string(), (Instant::now(), Arc::clone(&value)));
        Ok(value)
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.entries
            .write()
            .map(|mut entries| entries.remove(key).is_some())
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn loads_once_until_invalidated() {
        let cache = SourceCache::default();
        let calls = Cell::new(0);
        let load = || {
            calls.set(calls.get() + 1);
            Ok(calls.get())
        };
        assert_eq!(*cache.get_or_load("a", load).unwrap(), 1);
        assert_eq!(*cache.get_or_load("a", load).unwrap(), 1);
        assert_eq!(calls.get(), 1);

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(*cache.get_or_load("a", load).unwrap(), 2);
    }

    #[test]
    fn expired_entries_reload() {
        let cache = SourceCache::new(Duration::ZERO);
        let first = cache.get_or_load("k", || Ok("one".to_string())).unwrap();
        let second = cache.get_or_load("k", || Ok("two".to_string())).unwrap();
        assert_eq!(*first, "one");
        assert_eq!(*second, "two");
    }

    #[test]
    fn failed_loads_are_not_cached() {
        let cache: SourceCache<u32> = SourceCache::default();
        assert!(cache.get_or_load("k", || Err(anyhow!("boom"))).is_err());
        assert!(cache.is_empty());
        assert_eq!(*cache.get_or_load("k", || Ok(7)).unwrap(), 7);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
