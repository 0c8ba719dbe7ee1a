use crate::entry::{CacheEntry, Slot};
use crate::error::{BoxError, CacheError, FetchError};
use crate::flight::FlightGroup;
use crate::listener::{ErrLog, IsSame};
use crate::metrics::Metrics;
use crate::store::ShardedStore;
use crate::task::notifier::NotificationSender;
use crate::task::sweeper::Sweeper;

use std::fmt;
use std::hash::BuildHasher;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

/// Computes the value for a key: used on misses and by the refresh sweeper.
pub(crate) type Fetcher<V> = Arc<dyn Fn(&str) -> Result<V, BoxError> + Send + Sync>;

/// Computes a value from a caller-supplied seed: used by `get_or_reset`.
pub(crate) type DataFetcher<S, V> = Arc<dyn Fn(S) -> Result<V, BoxError> + Send + Sync>;

/// Everything the foreground handle and the background sweepers share.
pub(crate) struct CacheCore<V: Send + Sync, S, H> {
  pub(crate) store: ShardedStore<V, H>,
  /// In-flight `fetcher` calls, shared by `get` and `get_or_set`.
  pub(crate) fetches: FlightGroup<Slot<V>, H>,
  /// In-flight `data_fetcher` calls made by `get_or_reset`.
  pub(crate) resets: FlightGroup<Slot<V>, H>,
  pub(crate) metrics: Metrics,
  pub(crate) fetcher: Option<Fetcher<V>>,
  pub(crate) data_fetcher: Option<DataFetcher<S, V>>,
  pub(crate) is_same: Option<IsSame<V>>,
  pub(crate) notifier: Option<NotificationSender<V>>,
  pub(crate) err_log: ErrLog,
}

impl<V, S, H> CacheCore<V, S, H>
where
  V: Send + Sync + 'static,
  H: BuildHasher + Clone,
{
  /// Calls the fetcher for `key`, turning a panic into a fetch error.
  pub(crate) fn call_fetcher(&self, key: &str) -> Slot<V> {
    let Some(fetcher) = &self.fetcher else {
      return Err(CacheError::MissingFetcher.into());
    };
    match panic::catch_unwind(AssertUnwindSafe(|| fetcher(key))) {
      Ok(result) => result.map(Arc::new).map_err(FetchError::from_boxed),
      Err(_) => {
        (self.err_log)(&format!("fetcher panicked for key {key:?}"));
        Err(CacheError::FetcherPanicked.into())
      }
    }
  }

  /// Calls the data fetcher with `seed`, turning a panic into a fetch error.
  pub(crate) fn call_data_fetcher(&self, key: &str, seed: S) -> Slot<V> {
    let Some(data_fetcher) = &self.data_fetcher else {
      return Err(CacheError::MissingDataFetcher.into());
    };
    match panic::catch_unwind(AssertUnwindSafe(|| data_fetcher(seed))) {
      Ok(result) => result.map(Arc::new).map_err(FetchError::from_boxed),
      Err(_) => {
        (self.err_log)(&format!("data fetcher panicked for key {key:?}"));
        Err(CacheError::FetcherPanicked.into())
      }
    }
  }

  /// A fetch made on behalf of a foreground read, counted in the metrics.
  pub(crate) fn fetch(&self, key: &str) -> Slot<V> {
    Metrics::incr(&self.metrics.fetches);
    let slot = self.call_fetcher(key);
    if slot.is_err() {
      Metrics::incr(&self.metrics.fetch_errors);
    }
    slot
  }

  pub(crate) fn reset(&self, key: &str, seed: S) -> Slot<V> {
    Metrics::incr(&self.metrics.fetches);
    let slot = self.call_data_fetcher(key, seed);
    if slot.is_err() {
      Metrics::incr(&self.metrics.fetch_errors);
    }
    slot
  }

  /// Installs a new, fresh entry for `key`, replacing any existing one.
  pub(crate) fn install(&self, key: &str, slot: Slot<V>) {
    self.store.insert(key, Arc::new(CacheEntry::new(slot)));
  }

  /// Runs the user's equality predicate, treating a panic as "same".
  pub(crate) fn values_differ(&self, is_same: &IsSame<V>, key: &str, old: Option<&V>, new: &V) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| is_same(key, old, new))) {
      Ok(same) => !same,
      Err(_) => {
        (self.err_log)(&format!("is_same panicked for key {key:?}"));
        false
      }
    }
  }
}

/// The running background sweepers. Each is `None` if it was never enabled
/// or has already been stopped.
#[derive(Default)]
pub(crate) struct Sweepers {
  pub(crate) refresh: Option<Sweeper>,
  pub(crate) expire: Option<Sweeper>,
}

impl Sweepers {
  /// Stops whichever sweepers are still running.
  pub(crate) fn stop_all(&mut self) {
    if let Some(refresh) = self.refresh.take() {
      refresh.stop();
    }
    if let Some(expire) = self.expire.take() {
      expire.stop();
    }
  }
}

/// The internal, thread-safe core of the cache handle.
pub(crate) struct CacheShared<V: Send + Sync, S, H> {
  pub(crate) core: Arc<CacheCore<V, S, H>>,
  pub(crate) sweepers: Mutex<Sweepers>,
}

impl<V: Send + Sync, S, H> fmt::Debug for CacheShared<V, S, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sweepers = self.sweepers.lock();
    f.debug_struct("CacheShared")
      .field("store", &self.core.store)
      .field("refreshing", &sweepers.refresh.is_some())
      .field("expiring", &sweepers.expire.is_some())
      .field("metrics", &self.core.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<V: Send + Sync, S, H> Drop for CacheShared<V, S, H> {
  fn drop(&mut self) {
    self.sweepers.get_mut().stop_all();
  }
}
