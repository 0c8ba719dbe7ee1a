//! A concurrent, self-refreshing and self-expiring in-memory cache keyed by
//! strings.
//!
//! # Features
//! - **Read-through**: a miss calls the configured fetcher, and concurrent
//!   misses on one key share a single fetch.
//! - **Background refresh**: every entry is periodically re-fetched, so readers
//!   never pay for a reload once a key is warm.
//! - **Cached failures**: a failing key keeps returning its last error until a
//!   refresh succeeds, bounding the load a broken upstream sees.
//! - **CLOCK expiry**: keys that are not read for a while are evicted without
//!   per-entry timers.
//! - **Notifications**: error, change and delete handlers run on a dedicated
//!   thread, never on the reader's.
//! - **Observability**: exposes counters for hits, fetches, refreshes and
//!   evictions.
//!
//! ```
//! use fibre_autocache::CacheBuilder;
//! use std::time::Duration;
//!
//! let cache = CacheBuilder::new()
//!   .fetcher(|key: &str| Ok(key.len()))
//!   .refresh(Duration::from_secs(30))
//!   .expire(Duration::from_secs(300))
//!   .build()
//!   .unwrap();
//!
//! assert_eq!(*cache.get("hello").unwrap(), 5);
//! cache.close();
//! ```

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod handles;
pub mod listener;
pub mod metrics;

// Internal, crate-only modules
mod entry;
mod flight;
mod shared;
mod store;
mod task;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use error::{BoxError, BuildError, CacheError, FetchError};
pub use handles::Cache;
pub use listener::{ChangeHandler, DeleteHandler, ErrLog, ErrorHandler, IsSame};
pub use metrics::MetricsSnapshot;
