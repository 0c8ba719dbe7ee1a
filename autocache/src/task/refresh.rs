use crate::metrics::Metrics;
use crate::shared::CacheCore;
use crate::store::ShardedStore;

use std::hash::BuildHasher;

/// Counters for one completed refresh pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RefreshStats {
  pub(crate) visited: u64,
  pub(crate) failed: u64,
  pub(crate) changed: u64,
}

/// Re-fetches every live entry once.
///
/// A failed fetch fires the error handler. It only replaces the stored error
/// if the entry was already broken; a healthy entry keeps its last good value.
/// A successful fetch always installs the new value and clears any error.
/// Liveness markers are never read or written here.
pub(crate) fn run_pass<V, S, H>(core: &CacheCore<V, S, H>) -> RefreshStats
where
  V: Send + Sync + 'static,
  H: BuildHasher + Clone,
{
  let mut stats = RefreshStats::default();
  if core.fetcher.is_none() {
    return stats;
  }

  for shard in core.store.iter_shards() {
    // Work from a copy so no shard lock is held while user code runs.
    for (key, entry) in ShardedStore::snapshot_shard(shard) {
      stats.visited += 1;

      match core.call_fetcher(&key) {
        Err(err) => {
          stats.failed += 1;
          if let Some(notifier) = &core.notifier {
            notifier.error(&key, &err);
          }
          entry.refresh_error(err);
        }
        Ok(new) => {
          if let Some(is_same) = &core.is_same {
            let old = entry.value();
            if core.values_differ(is_same, &key, old.as_deref(), &new) {
              stats.changed += 1;
              if let Some(notifier) = &core.notifier {
                notifier.change(&key, old, new.clone());
              }
            }
          }
          entry.swap_value(new);
        }
      }
    }
  }

  Metrics::add(&core.metrics.refreshes, stats.visited - stats.failed);
  Metrics::add(&core.metrics.refresh_errors, stats.failed);
  Metrics::add(&core.metrics.changes, stats.changed);
  tracing::debug!(
    visited = stats.visited,
    failed = stats.failed,
    changed = stats.changed,
    "refresh sweep complete"
  );
  stats
}
