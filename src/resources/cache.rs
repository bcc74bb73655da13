//! Keyed cache of resolved resource bundles.
//!
//! Lookups for a key that is already populated only take the read lock.
//! Population for a key is single-flight: concurrent callers for the same
//! key block on that key's cell while one of them resolves, callers for
//! other keys proceed independently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use super::{ResourceBundle, ResourceError, ResourceKey, ResourceResolver};

type Slot = Arc<OnceCell<Arc<ResourceBundle>>>;

/// Memoizing front for a [`ResourceResolver`].
pub struct ResourceCache {
    resolver: Arc<dyn ResourceResolver>,
    entries: RwLock<HashMap<ResourceKey, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResourceCache {
    pub fn new(resolver: Arc<dyn ResourceResolver>) -> Self {
        Self {
            resolver,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the bundle for `key`, resolving it on first use.
    ///
    /// A failed resolution is not cached and leaves no entry behind; the next
    /// call for the key tries again.
    pub fn get_or_resolve(&self, key: &ResourceKey) -> Result<Arc<ResourceBundle>, ResourceError> {
        if let Some(bundle) = self.entries.read().get(key).and_then(|slot| slot.get()) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(identity = %key.identity, "Resource cache hit");
            return Ok(Arc::clone(bundle));
        }

        let slot = {
            let mut entries = self.entries.write();
            Arc::clone(entries.entry(key.clone()).or_default())
        };

        let mut resolved_here = false;
        let result = slot.get_or_try_init(|| {
            resolved_here = true;
            tracing::debug!(
                identity = %key.identity,
                config_key = %key.config_key,
                input_schema_key = %key.input_schema_key,
                output_schema_key = %key.output_schema_key,
                "Resolving mapping resources"
            );
            self.resolver.resolve(key).map(Arc::new)
        });
        let bundle = match result {
            Ok(bundle) => bundle,
            Err(e) => {
                self.discard_empty_slot(key, &slot);
                return Err(e);
            }
        };

        if resolved_here {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Arc::clone(bundle))
    }

    /// Remove `slot` from the map if it is still the entry for `key` and was
    /// never populated. A concurrent retry may have replaced or filled it.
    fn discard_empty_slot(&self, key: &ResourceKey, slot: &Slot) {
        let mut entries = self.entries.write();
        let stale = entries
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && current.get().is_none());
        if stale {
            entries.remove(key);
        }
    }

    /// Drop the cached bundle for `key`.
    pub fn invalidate(&self, key: &ResourceKey) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Drop every cached bundle.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of populated entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{MappingConfig, Schema};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    struct CountingResolver {
        calls: AtomicUsize,
        fail: bool,
        delay: Duration,
    }

    impl CountingResolver {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
                delay: Duration::from_millis(20),
            }
        }
    }

    impl ResourceResolver for CountingResolver {
        fn resolve(&self, key: &ResourceKey) -> Result<ResourceBundle, ResourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            if self.fail {
                return Err(ResourceError::NotFound(key.config_key.clone()));
            }
            Ok(ResourceBundle {
                config: MappingConfig::default(),
                input_schema: Schema::from_json(r#"{"name":"in"}"#).unwrap(),
                output_schema: Schema::from_json(r#"{"name":"out"}"#).unwrap(),
            })
        }
    }

    fn key(identity: &str) -> ResourceKey {
        ResourceKey::new(identity, "conf:m.dmc", "conf:in.json", "conf:out.json")
    }

    #[test]
    fn test_resolves_once_per_key() {
        let resolver = Arc::new(CountingResolver::new(false));
        let cache = ResourceCache::new(resolver.clone());

        let first = cache.get_or_resolve(&key("a")).unwrap();
        let second = cache.get_or_resolve(&key("a")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_identity_is_part_of_key() {
        let resolver = Arc::new(CountingResolver::new(false));
        let cache = ResourceCache::new(resolver.clone());

        cache.get_or_resolve(&key("a")).unwrap();
        cache.get_or_resolve(&key("b")).unwrap();

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_concurrent_first_lookup_is_single_flight() {
        let resolver = Arc::new(CountingResolver::new(false));
        let cache = Arc::new(ResourceCache::new(resolver.clone()));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_resolve(&key("shared")).unwrap()
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let resolver = Arc::new(CountingResolver::new(true));
        let cache = ResourceCache::new(resolver.clone());

        assert!(cache.get_or_resolve(&key("a")).is_err());
        assert!(cache.get_or_resolve(&key("a")).is_err());

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_keys_leave_no_entries() {
        let resolver = Arc::new(CountingResolver {
            delay: Duration::ZERO,
            ..CountingResolver::new(true)
        });
        let cache = ResourceCache::new(resolver.clone());

        for i in 0..1000 {
            assert!(cache.get_or_resolve(&key(&format!("dynamic-{}", i))).is_err());
        }

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1000);
        assert_eq!(cache.entries.read().len(), 0);
    }

    #[test]
    fn test_concurrent_failures_leave_no_entries() {
        let resolver = Arc::new(CountingResolver::new(true));
        let cache = Arc::new(ResourceCache::new(resolver.clone()));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_resolve(&key("missing")).is_err()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert!(cache.entries.read().is_empty());
    }

    #[test]
    fn test_invalidate_forces_reresolution() {
        let resolver = Arc::new(CountingResolver::new(false));
        let cache = ResourceCache::new(resolver.clone());

        cache.get_or_resolve(&key("a")).unwrap();
        assert!(cache.invalidate(&key("a")));
        cache.get_or_resolve(&key("a")).unwrap();

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }
}
