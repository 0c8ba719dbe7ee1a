use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the cache.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub struct Metrics {
  // --- Foreground reads ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,
  pub(crate) fetches: CachePadded<AtomicU64>,
  pub(crate) fetch_errors: CachePadded<AtomicU64>,
  pub(crate) defaults_set: CachePadded<AtomicU64>,

  // --- Refresh sweeper ---
  pub(crate) refreshes: CachePadded<AtomicU64>,
  pub(crate) refresh_errors: CachePadded<AtomicU64>,
  pub(crate) changes: CachePadded<AtomicU64>,

  // --- Removals ---
  pub(crate) evicted_by_expire: CachePadded<AtomicU64>,
  pub(crate) deleted: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      fetches: CachePadded::new(AtomicU64::new(0)),
      fetch_errors: CachePadded::new(AtomicU64::new(0)),
      defaults_set: CachePadded::new(AtomicU64::new(0)),
      refreshes: CachePadded::new(AtomicU64::new(0)),
      refresh_errors: CachePadded::new(AtomicU64::new(0)),
      changes: CachePadded::new(AtomicU64::new(0)),
      evicted_by_expire: CachePadded::new(AtomicU64::new(0)),
      deleted: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn incr(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn add(counter: &AtomicU64, n: u64) {
    if n > 0 {
      counter.fetch_add(n, Ordering::Relaxed);
    }
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      fetches: self.fetches.load(Ordering::Relaxed),
      fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
      defaults_set: self.defaults_set.load(Ordering::Relaxed),
      refreshes: self.refreshes.load(Ordering::Relaxed),
      refresh_errors: self.refresh_errors.load(Ordering::Relaxed),
      changes: self.changes.load(Ordering::Relaxed),
      evicted_by_expire: self.evicted_by_expire.load(Ordering::Relaxed),
      deleted: self.deleted.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the cache's metrics.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
  /// Reads served from an existing entry.
  pub hits: u64,
  /// Reads that found no entry and went through a (possibly shared) fetch.
  pub misses: u64,
  /// The cache hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// Fetcher or data fetcher invocations made on behalf of foreground reads.
  pub fetches: u64,
  /// Foreground fetches that failed.
  pub fetch_errors: u64,
  /// Entries created by `set_default`.
  pub defaults_set: u64,
  /// Successful refresh fetches.
  pub refreshes: u64,
  /// Failed refresh fetches.
  pub refresh_errors: u64,
  /// Refreshes whose new value differed from the old one.
  pub changes: u64,
  /// Entries evicted by the expire sweeper.
  pub evicted_by_expire: u64,
  /// Entries removed by `delete_if`.
  pub deleted: u64,
  /// The number of seconds the cache has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("fetches", &self.fetches)
      .field("fetch_errors", &self.fetch_errors)
      .field("defaults_set", &self.defaults_set)
      .field("refreshes", &self.refreshes)
      .field("refresh_errors", &self.refresh_errors)
      .field("changes", &self.changes)
      .field("evicted_by_expire", &self.evicted_by_expire)
      .field("deleted", &self.deleted)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
