use crate::entry::CacheEntry;
use crate::error::FetchError;
use crate::metrics::Metrics;
use crate::shared::CacheShared;
use crate::store::ShardedStore;
use crate::task::{expire, refresh};
use crate::MetricsSnapshot;

use core::fmt;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::Arc;

/// A thread-safe, self-refreshing and self-expiring cache keyed by strings.
///
/// `V` is the cached value type, `S` the seed type accepted by
/// [`get_or_reset`](Cache::get_or_reset) and `H` the hasher used to pick
/// shards. Share it across threads with an `Arc`.
pub struct Cache<V: Send + Sync, S = V, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<V, S, H>>,
}

impl<V: Send + Sync, S, H> fmt::Debug for Cache<V, S, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Cache").field("shared", &self.shared).finish()
  }
}

impl<V, S, H> Cache<V, S, H>
where
  V: Send + Sync + 'static,
  H: BuildHasher + Clone,
{
  /// Inserts `value` under `key` if the key is not cached yet.
  ///
  /// Returns `true` if the key already existed. An existing entry keeps its
  /// value but is marked as recently used, postponing its expiry. Useful for
  /// warming the cache up.
  pub fn set_default(&self, key: &str, value: V) -> bool {
    let core = &self.shared.core;
    let entry = Arc::new(CacheEntry::with_value(Arc::new(value)));
    match core.store.insert_if_absent(key, entry) {
      Ok(()) => {
        Metrics::incr(&core.metrics.defaults_set);
        false
      }
      Err(existing) => {
        existing.touch();
        true
      }
    }
  }

  /// Returns the value cached for `key`, fetching it on a miss.
  ///
  /// Concurrent misses on one key share a single fetcher call. Whatever that
  /// call returns is cached, errors included: a failed key keeps returning
  /// the same error until a refresh pass succeeds for it, so a broken key
  /// is retried at most once per refresh interval rather than once per read.
  ///
  /// Without a configured fetcher a miss returns
  /// [`CacheError::MissingFetcher`](crate::CacheError::MissingFetcher) and
  /// caches nothing.
  pub fn get(&self, key: &str) -> Result<Arc<V>, FetchError> {
    let core = &self.shared.core;
    if let Some(entry) = core.store.get(key) {
      entry.touch();
      Metrics::incr(&core.metrics.hits);
      return entry.load();
    }

    Metrics::incr(&core.metrics.misses);
    let (slot, _) = core.fetches.run(key, || {
      // Another flight may have installed the key since our lookup.
      if let Some(entry) = core.store.get(key) {
        entry.touch();
        return entry.load();
      }
      if core.fetcher.is_none() {
        return core.call_fetcher(key);
      }
      let slot = core.fetch(key);
      core.install(key, slot.clone());
      slot
    });
    slot
  }

  /// Returns the value cached for `key`, never failing.
  ///
  /// On a miss the fetcher is consulted (shared between concurrent misses);
  /// if it fails, `default` is cached in its place. If the key is cached in
  /// error state, `default` immediately replaces the error without another
  /// fetch. The entry left behind is never in error state.
  pub fn get_or_set(&self, key: &str, default: V) -> Arc<V> {
    let core = &self.shared.core;
    if let Some(entry) = core.store.get(key) {
      Metrics::incr(&core.metrics.hits);
      match entry.load() {
        Ok(value) => {
          entry.touch();
          return value;
        }
        Err(_) => {
          let default = Arc::new(default);
          core.install(key, Ok(default.clone()));
          return default;
        }
      }
    }

    Metrics::incr(&core.metrics.misses);
    let default = Arc::new(default);
    let (slot, _) = core.fetches.run(key, || {
      if let Some(entry) = core.store.get(key) {
        if let Ok(value) = entry.load() {
          entry.touch();
          return Ok(value);
        }
      }
      let value = core.fetch(key).unwrap_or_else(|_| default.clone());
      core.install(key, Ok(value.clone()));
      Ok(value)
    });

    match slot {
      Ok(value) => value,
      // Joined a `get` whose fetch failed and was cached as an error.
      Err(_) => {
        core.install(key, Ok(default.clone()));
        default
      }
    }
  }

  /// Returns the value cached for `key`, regenerating it from `seed` with the
  /// data fetcher when the key is missing or in error state.
  ///
  /// On a miss, concurrent callers share one data fetcher call (the seeds of
  /// the callers that joined are ignored). A failed miss is returned without
  /// caching anything, so the next call tries again. A key already in error
  /// state is regenerated synchronously, and the outcome (value or new
  /// error) replaces the entry.
  pub fn get_or_reset(&self, key: &str, seed: S) -> Result<Arc<V>, FetchError> {
    let core = &self.shared.core;
    if let Some(entry) = core.store.get(key) {
      Metrics::incr(&core.metrics.hits);
      match entry.load() {
        Ok(value) => {
          entry.touch();
          return Ok(value);
        }
        Err(_) => {
          let slot = core.reset(key, seed);
          core.install(key, slot.clone());
          return slot;
        }
      }
    }

    Metrics::incr(&core.metrics.misses);
    let (slot, _) = core.resets.run(key, || {
      if let Some(entry) = core.store.get(key) {
        if let Ok(value) = entry.load() {
          entry.touch();
          return Ok(value);
        }
      }
      let value = core.reset(key, seed)?;
      core.install(key, Ok(value.clone()));
      Ok(value)
    });
    slot
  }

  /// Returns a snapshot of every cached key and its current value.
  ///
  /// Entries in error state map to `None`. Taking a dump does not count as
  /// using an entry, so it never postpones expiry. The snapshot is consistent
  /// per entry, not across entries.
  pub fn dump(&self) -> HashMap<String, Option<Arc<V>>> {
    let core = &self.shared.core;
    let mut data = HashMap::with_capacity(core.store.len());
    for shard in core.store.iter_shards() {
      let guard = shard.read();
      for (key, entry) in guard.iter() {
        data.insert(key.clone(), entry.value());
      }
    }
    data
  }

  /// Removes every entry whose key matches `should_delete`, notifying the
  /// delete handler for each one. Returns the number of entries removed.
  ///
  /// The predicate is evaluated without any internal lock held.
  pub fn delete_if<F>(&self, should_delete: F) -> usize
  where
    F: Fn(&str) -> bool,
  {
    let core = &self.shared.core;
    let mut removed = 0;

    for shard in core.store.iter_shards() {
      let doomed: Vec<String> = ShardedStore::snapshot_shard(shard)
        .into_iter()
        .map(|(key, _)| key)
        .filter(|key| should_delete(key.as_str()))
        .collect();
      if doomed.is_empty() {
        continue;
      }

      let victims: Vec<_> = {
        let mut guard = shard.write();
        doomed
          .into_iter()
          .filter_map(|key| guard.remove(&key).map(|entry| (key, entry)))
          .collect()
      };

      for (key, entry) in victims {
        removed += 1;
        if let Some(notifier) = &core.notifier {
          notifier.delete(key, entry.value());
        }
      }
    }

    Metrics::add(&core.metrics.deleted, removed as u64);
    removed
  }

  /// Stops the background refresh and expire sweepers.
  ///
  /// Safe to call any number of times, and whether or not either sweeper was
  /// enabled. A sweep that is already running finishes; no new one starts.
  /// The cache stays usable for reads afterwards. Dropping the cache closes
  /// it as well.
  pub fn close(&self) {
    self.shared.sweepers.lock().stop_all();
  }

  /// Returns the number of cached entries.
  pub fn len(&self) -> usize {
    self.shared.core.store.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns `true` if `key` is cached. Does not count as using the entry.
  pub fn contains_key(&self, key: &str) -> bool {
    self.shared.core.store.contains_key(key)
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.core.metrics.snapshot()
  }

  /// Runs one refresh pass on the calling thread. Does nothing if no fetcher
  /// is configured.
  #[doc(hidden)]
  pub fn run_refresh_sweep(&self) {
    refresh::run_pass(&self.shared.core);
  }

  /// Runs one expire pass on the calling thread.
  #[doc(hidden)]
  pub fn run_expire_sweep(&self) {
    expire::run_pass(&self.shared.core);
  }
}
