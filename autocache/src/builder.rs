use crate::error::{BoxError, BuildError, FetchError};
use crate::flight::FlightGroup;
use crate::handles::Cache;
use crate::listener::{ErrLog, Handlers, IsSame};
use crate::metrics::Metrics;
use crate::shared::{CacheCore, CacheShared, DataFetcher, Fetcher, Sweepers};
use crate::store::ShardedStore;
use crate::task::sweeper::Sweeper;
use crate::task::{expire, notifier, refresh};

use core::fmt;
use std::hash::BuildHasher;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// Upper bound on the shard count. Larger requests are clamped.
const MAX_SHARDS: usize = 1 << 16;

/// A builder for creating [`Cache`] instances.
///
/// `S` is the seed type accepted by `get_or_reset`; it is fixed by
/// [`data_fetcher`](CacheBuilder::data_fetcher) and defaults to `V`.
pub struct CacheBuilder<V: Send + Sync, S = V, H = ahash::RandomState> {
  fetcher: Option<Fetcher<V>>,
  data_fetcher: Option<DataFetcher<S, V>>,
  refresh: Option<Duration>,
  expire: Option<Duration>,
  handlers: Handlers<V>,
  is_same: Option<IsSame<V>>,
  err_log: Option<ErrLog>,
  shards: usize,
  hasher: H,
}

impl<V: Send + Sync, S, H> fmt::Debug for CacheBuilder<V, S, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("shards", &self.shards)
      .field("refresh", &self.refresh)
      .field("expire", &self.expire)
      .field("has_fetcher", &self.fetcher.is_some())
      .field("has_data_fetcher", &self.data_fetcher.is_some())
      .field("has_handlers", &!self.handlers.is_empty())
      .finish_non_exhaustive()
  }
}

impl<V: Send + Sync> CacheBuilder<V, V, ahash::RandomState> {
  /// Creates a new `CacheBuilder` with default settings: no fetchers, no
  /// sweepers, no handlers.
  pub fn new() -> Self {
    Self {
      fetcher: None,
      data_fetcher: None,
      refresh: None,
      expire: None,
      handlers: Handlers::default(),
      is_same: None,
      err_log: None,
      shards: num_cpus::get() * 4,
      hasher: ahash::RandomState::new(),
    }
  }
}

impl<V: Send + Sync> Default for CacheBuilder<V, V, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

// --- General Configuration Methods ---
impl<V: Send + Sync, S, H> CacheBuilder<V, S, H> {
  /// Sets the function that computes a key's value on a miss and on every
  /// refresh pass.
  pub fn fetcher<F>(mut self, f: F) -> Self
  where
    F: Fn(&str) -> Result<V, BoxError> + Send + Sync + 'static,
  {
    self.fetcher = Some(Arc::new(f));
    self
  }

  /// Sets the function `get_or_reset` uses to regenerate a value from a
  /// caller-supplied seed. This fixes the cache's seed type.
  pub fn data_fetcher<S2, F>(self, f: F) -> CacheBuilder<V, S2, H>
  where
    F: Fn(S2) -> Result<V, BoxError> + Send + Sync + 'static,
  {
    CacheBuilder {
      fetcher: self.fetcher,
      data_fetcher: Some(Arc::new(f)),
      refresh: self.refresh,
      expire: self.expire,
      handlers: self.handlers,
      is_same: self.is_same,
      err_log: self.err_log,
      shards: self.shards,
      hasher: self.hasher,
    }
  }

  /// Enables the refresh sweeper, which re-fetches every entry once per
  /// `interval`. Requires a [`fetcher`](CacheBuilder::fetcher).
  pub fn refresh(mut self, interval: Duration) -> Self {
    self.refresh = Some(interval);
    self
  }

  /// Enables the expire sweeper. An entry that is not read for between one
  /// and two `interval`s is removed.
  pub fn expire(mut self, interval: Duration) -> Self {
    self.expire = Some(interval);
    self
  }

  /// Called when a refresh fetch fails.
  pub fn on_error<F>(mut self, f: F) -> Self
  where
    F: Fn(&str, &FetchError) + Send + Sync + 'static,
  {
    self.handlers.on_error = Some(Arc::new(f));
    self
  }

  /// Called when a refresh replaces a value that `is_same` reports as
  /// different. Has no effect without [`is_same`](CacheBuilder::is_same).
  pub fn on_change<F>(mut self, f: F) -> Self
  where
    F: Fn(&str, Option<&Arc<V>>, &Arc<V>) + Send + Sync + 'static,
  {
    self.handlers.on_change = Some(Arc::new(f));
    self
  }

  /// Called for every entry removed by `delete_if` or by expiry.
  pub fn on_delete<F>(mut self, f: F) -> Self
  where
    F: Fn(&str, Option<&Arc<V>>) + Send + Sync + 'static,
  {
    self.handlers.on_delete = Some(Arc::new(f));
    self
  }

  /// Sets the predicate the refresh sweeper uses to decide whether a newly
  /// fetched value differs from the cached one. The old value is `None` when
  /// the entry was in error state.
  pub fn is_same<F>(mut self, f: F) -> Self
  where
    F: Fn(&str, Option<&V>, &V) -> bool + Send + Sync + 'static,
  {
    self.is_same = Some(Arc::new(f));
    self
  }

  /// Sets the sink for internal errors such as panicking handlers.
  ///
  /// Defaults to logging through `tracing::error!`.
  pub fn err_log<F>(mut self, f: F) -> Self
  where
    F: Fn(&str) + Send + Sync + 'static,
  {
    self.err_log = Some(Arc::new(f));
    self
  }

  /// Sets the number of concurrent shards to use. Rounded up to a power of
  /// two at build time, and capped at 65536.
  pub fn shards(mut self, shards: usize) -> Self {
    self.shards = shards;
    self
  }

  /// Sets the hasher used to pick shards and index them.
  pub fn hasher<H2>(self, hasher: H2) -> CacheBuilder<V, S, H2> {
    CacheBuilder {
      fetcher: self.fetcher,
      data_fetcher: self.data_fetcher,
      refresh: self.refresh,
      expire: self.expire,
      handlers: self.handlers,
      is_same: self.is_same,
      err_log: self.err_log,
      shards: self.shards,
      hasher,
    }
  }
}

fn default_err_log() -> ErrLog {
  Arc::new(|msg: &str| tracing::error!("{}", msg))
}

fn spawn_failed(err: io::Error) -> BuildError {
  BuildError::SpawnFailed(err.to_string())
}

// --- Build Methods ---
impl<V, S, H> CacheBuilder<V, S, H>
where
  V: Send + Sync + 'static,
  S: 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Validates the configuration and builds the cache, starting whichever
  /// background threads it needs.
  pub fn build(self) -> Result<Cache<V, S, H>, BuildError> {
    self.validate()?;

    let num_shards = self.shards.min(MAX_SHARDS).next_power_of_two();
    let err_log = self.err_log.unwrap_or_else(default_err_log);

    let notifier = if self.handlers.is_empty() {
      None
    } else {
      Some(notifier::spawn(self.handlers, err_log.clone()).map_err(spawn_failed)?)
    };

    let core = Arc::new(CacheCore {
      store: ShardedStore::new(num_shards, self.hasher.clone()),
      fetches: FlightGroup::with_hasher(self.hasher.clone()),
      resets: FlightGroup::with_hasher(self.hasher),
      metrics: Metrics::new(),
      fetcher: self.fetcher,
      data_fetcher: self.data_fetcher,
      is_same: self.is_same,
      notifier,
      err_log,
    });

    let mut sweepers = Sweepers::default();
    if let Some(interval) = self.refresh {
      let core = core.clone();
      let sweeper = Sweeper::spawn("autocache-refresh", interval, move || {
        refresh::run_pass(&core);
      })
      .map_err(spawn_failed)?;
      sweepers.refresh = Some(sweeper);
    }
    if let Some(interval) = self.expire {
      let core = core.clone();
      match Sweeper::spawn("autocache-expire", interval, move || {
        expire::run_pass(&core);
      }) {
        Ok(sweeper) => sweepers.expire = Some(sweeper),
        Err(err) => {
          sweepers.stop_all();
          return Err(spawn_failed(err));
        }
      }
    }

    tracing::debug!(
      shards = num_shards,
      refresh = ?self.refresh,
      expire = ?self.expire,
      "cache built"
    );

    Ok(Cache {
      shared: Arc::new(CacheShared {
        core,
        sweepers: Mutex::new(sweepers),
      }),
    })
  }

  /// Validates the builder configuration.
  fn validate(&self) -> Result<(), BuildError> {
    if self.shards == 0 {
      return Err(BuildError::ZeroShards);
    }
    if let Some(interval) = self.refresh {
      if interval.is_zero() {
        return Err(BuildError::ZeroRefreshDuration);
      }
      if self.fetcher.is_none() {
        return Err(BuildError::FetcherRequired);
      }
    }
    if self.expire.is_some_and(|interval| interval.is_zero()) {
      return Err(BuildError::ZeroExpireDuration);
    }
    Ok(())
  }
}
