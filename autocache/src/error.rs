use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// The error type user fetchers return on failure.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
  /// Expiry was enabled with a zero interval, which would evict every entry
  /// on a busy loop.
  ZeroExpireDuration,
  /// Refresh was enabled with a zero interval.
  ZeroRefreshDuration,
  /// Refresh was enabled, but no `fetcher` was configured to recompute values.
  FetcherRequired,
  /// The cache was configured with zero shards, which is not allowed.
  ZeroShards,
  /// A background thread could not be spawned.
  SpawnFailed(String),
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::ZeroExpireDuration => write!(f, "expire duration cannot be zero"),
      BuildError::ZeroRefreshDuration => write!(f, "refresh duration cannot be zero"),
      BuildError::FetcherRequired => write!(f, "refresh requires a fetcher"),
      BuildError::ZeroShards => write!(f, "shard count cannot be zero"),
      BuildError::SpawnFailed(reason) => write!(f, "failed to spawn background thread: {}", reason),
    }
  }
}

impl StdError for BuildError {}

/// Fetch failures that originate inside the cache rather than in user code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
  /// A key was missing and no `fetcher` is configured to load it.
  MissingFetcher,
  /// `get_or_reset` was called but no `data_fetcher` is configured.
  MissingDataFetcher,
  /// The fetcher panicked while computing a value.
  FetcherPanicked,
}

impl fmt::Display for CacheError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CacheError::MissingFetcher => write!(f, "no fetcher configured"),
      CacheError::MissingDataFetcher => write!(f, "no data fetcher configured"),
      CacheError::FetcherPanicked => write!(f, "fetcher panicked"),
    }
  }
}

impl StdError for CacheError {}

/// A shared, clonable fetch error.
///
/// A failed fetch is stored once and handed out to every reader, so all
/// callers that observe the same failure hold the same allocation. Use
/// [`FetchError::ptr_eq`] to tell whether two errors came from one fetch.
#[derive(Clone)]
pub struct FetchError {
  inner: Arc<dyn StdError + Send + Sync>,
}

impl FetchError {
  pub(crate) fn from_boxed(err: BoxError) -> Self {
    Self { inner: Arc::from(err) }
  }

  /// Returns `true` if both errors were produced by the same failed fetch.
  pub fn ptr_eq(&self, other: &FetchError) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  /// Returns `true` if the wrapped error is of type `T`.
  pub fn is<T: StdError + 'static>(&self) -> bool {
    self.inner.is::<T>()
  }

  /// Returns a reference to the wrapped error if it is of type `T`.
  pub fn downcast_ref<T: StdError + 'static>(&self) -> Option<&T> {
    self.inner.downcast_ref::<T>()
  }
}

impl From<CacheError> for FetchError {
  fn from(err: CacheError) -> Self {
    Self { inner: Arc::new(err) }
  }
}

impl From<BoxError> for FetchError {
  fn from(err: BoxError) -> Self {
    Self::from_boxed(err)
  }
}

impl fmt::Debug for FetchError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("FetchError").field(&self.inner).finish()
  }
}

impl fmt::Display for FetchError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.inner, f)
  }
}

impl StdError for FetchError {
  fn source(&self) -> Option<&(dyn StdError + 'static)> {
    Some(&*self.inner)
  }
}
