use crate::entry::CacheEntry;

use core::fmt;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

pub(crate) type ShardMap<V, H> = HashMap<String, Arc<CacheEntry<V>>, H>;

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
pub(crate) fn hash_key<Q: Hash + ?Sized, H: BuildHasher>(hasher: &H, key: &Q) -> u64 {
  let mut state = hasher.build_hasher();
  key.hash(&mut state);
  state.finish()
}

/// A key-to-entry map partitioned into multiple, independently locked shards.
///
/// Operations on different keys rarely contend for the same lock, and bulk
/// walks only ever hold one shard at a time.
pub(crate) struct ShardedStore<V, H> {
  shards: Box<[CachePadded<RwLock<ShardMap<V, H>>>]>,
  hasher: H,
}

impl<V, H> fmt::Debug for ShardedStore<V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShardedStore")
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl<V, H> ShardedStore<V, H>
where
  H: BuildHasher + Clone,
{
  /// Creates a store with `num_shards` shards. The count must be a non-zero
  /// power of two; the builder guarantees both.
  pub(crate) fn new(num_shards: usize, hasher: H) -> Self {
    debug_assert!(num_shards.is_power_of_two());
    let shards = (0..num_shards)
      .map(|_| CachePadded::new(RwLock::new(HashMap::with_hasher(hasher.clone()))))
      .collect::<Vec<_>>()
      .into_boxed_slice();

    Self { shards, hasher }
  }

  #[inline]
  fn shard(&self, key: &str) -> &RwLock<ShardMap<V, H>> {
    let hash = hash_key(&self.hasher, key);
    &self.shards[hash as usize & (self.shards.len() - 1)]
  }

  /// Returns the entry stored under `key`, if any.
  #[inline]
  pub(crate) fn get(&self, key: &str) -> Option<Arc<CacheEntry<V>>> {
    self.shard(key).read().get(key).cloned()
  }

  /// Installs `entry` under `key`, replacing whatever was there.
  pub(crate) fn insert(&self, key: &str, entry: Arc<CacheEntry<V>>) -> Option<Arc<CacheEntry<V>>> {
    self.shard(key).write().insert(key.to_owned(), entry)
  }

  /// Installs `entry` only if `key` is vacant. On conflict the entry already
  /// present is returned and the store is left untouched.
  pub(crate) fn insert_if_absent(
    &self,
    key: &str,
    entry: Arc<CacheEntry<V>>,
  ) -> Result<(), Arc<CacheEntry<V>>> {
    let mut guard = self.shard(key).write();
    if let Some(existing) = guard.get(key) {
      return Err(existing.clone());
    }
    guard.insert(key.to_owned(), entry);
    Ok(())
  }

  /// Returns an iterator over all the shard locks.
  pub(crate) fn iter_shards(&self) -> impl Iterator<Item = &RwLock<ShardMap<V, H>>> {
    self.shards.iter().map(|padded| &**padded)
  }

  /// Clones the contents of one shard out from under its read lock.
  pub(crate) fn snapshot_shard(shard: &RwLock<ShardMap<V, H>>) -> Vec<(String, Arc<CacheEntry<V>>)> {
    shard
      .read()
      .iter()
      .map(|(key, entry)| (key.clone(), entry.clone()))
      .collect()
  }

  pub(crate) fn len(&self) -> usize {
    self.iter_shards().map(|shard| shard.read().len()).sum()
  }

  pub(crate) fn contains_key(&self, key: &str) -> bool {
    self.shard(key).read().contains_key(key)
  }
}
