use crate::metrics::Metrics;
use crate::shared::CacheCore;

use std::hash::BuildHasher;

/// Counters for one completed expire pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExpireStats {
  pub(crate) visited: u64,
  pub(crate) evicted: u64,
}

/// Advances the CLOCK hand over every entry once.
///
/// Fresh entries are marked stale and kept. Entries that were already stale
/// have not been touched since the previous pass, so they are removed and the
/// delete handler is notified with their last value. An untouched entry thus
/// lives at least one interval and at most two.
pub(crate) fn run_pass<V, S, H>(core: &CacheCore<V, S, H>) -> ExpireStats
where
  V: Send + Sync + 'static,
  H: BuildHasher + Clone,
{
  let mut stats = ExpireStats::default();
  let mut victims = Vec::new();

  for shard in core.store.iter_shards() {
    {
      let mut guard = shard.write();
      stats.visited += guard.len() as u64;
      guard.retain(|key, entry| {
        if entry.sweep_marker() {
          victims.push((key.clone(), entry.clone()));
          false
        } else {
          true
        }
      });
    }

    // Notify after the shard lock is released.
    for (key, entry) in victims.drain(..) {
      stats.evicted += 1;
      tracing::trace!(key = key.as_str(), "entry expired");
      if let Some(notifier) = &core.notifier {
        notifier.delete(key, entry.value());
      }
    }
  }

  Metrics::add(&core.metrics.evicted_by_expire, stats.evicted);
  tracing::debug!(
    visited = stats.visited,
    evicted = stats.evicted,
    "expire sweep complete"
  );
  stats
}
