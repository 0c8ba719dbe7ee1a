mod common;

use common::{build_switched_cache, capture_err_log, Switch, Upstream};
use fibre_autocache::{CacheBuilder, CacheError};
use std::{thread, time::Duration};

#[test]
fn test_sync_get_fetches_once_then_hits() {
  let switch = Switch::new("ret");
  let cache = build_switched_cache(&switch);

  assert_eq!(*cache.get("key").unwrap(), "ret");
  assert_eq!(*cache.get("key").unwrap(), "ret");
  assert_eq!(switch.calls(), 1);

  let metrics = cache.metrics();
  assert_eq!(metrics.hits, 1);
  assert_eq!(metrics.misses, 1);
  assert_eq!(metrics.fetches, 1);
  assert_eq!(metrics.fetch_errors, 0);
}

#[test]
fn test_sync_get_serves_cached_value_until_refresh() {
  let switch = Switch::new("ret");
  let cache = CacheBuilder::new()
    .fetcher(switch.fetcher())
    .refresh(Duration::from_millis(100))
    .build()
    .unwrap();

  assert_eq!(*cache.get("key").unwrap(), "ret");

  switch.set("change");
  assert_eq!(*cache.get("key").unwrap(), "ret", "reads never fetch on a hit");

  thread::sleep(Duration::from_millis(350));
  assert_eq!(*cache.get("key").unwrap(), "change");
  cache.close();
}

#[test]
fn test_sync_get_caches_the_error() {
  let switch = Switch::failing();
  let cache = build_switched_cache(&switch);

  let first = cache.get("key").unwrap_err();
  let second = cache.get("key").unwrap_err();
  assert!(first.ptr_eq(&second), "a failed key returns the same error");
  assert!(first.is::<Upstream>());
  assert_eq!(switch.calls(), 1);
  assert!(cache.contains_key("key"));

  let metrics = cache.metrics();
  assert_eq!(metrics.fetch_errors, 1);
}

#[test]
fn test_sync_get_recovers_after_successful_refresh() {
  let switch = Switch::failing();
  let cache = build_switched_cache(&switch);
  assert!(cache.get("key").is_err());

  switch.fail(false);
  switch.set("ret");
  cache.run_refresh_sweep();

  assert_eq!(*cache.get("key").unwrap(), "ret");
}

#[test]
fn test_sync_get_without_fetcher() {
  let cache = CacheBuilder::<String>::new().build().unwrap();

  let err = cache.get("key").unwrap_err();
  assert_eq!(err.downcast_ref::<CacheError>(), Some(&CacheError::MissingFetcher));
  assert!(!cache.contains_key("key"), "nothing is cached without a fetcher");
  assert!(cache.is_empty());
}

#[test]
fn test_sync_get_with_panicking_fetcher() {
  let (sink, log) = capture_err_log();
  let cache = CacheBuilder::<String>::new()
    .fetcher(|key: &str| -> Result<String, fibre_autocache::BoxError> {
      panic!("fetcher bug for {key}")
    })
    .err_log(sink)
    .build()
    .unwrap();

  let first = cache.get("key").unwrap_err();
  assert_eq!(first.downcast_ref::<CacheError>(), Some(&CacheError::FetcherPanicked));

  // The panic is cached like any other fetch error.
  let second = cache.get("key").unwrap_err();
  assert!(first.ptr_eq(&second));

  let logged = log.recv_timeout(Duration::from_secs(1)).unwrap();
  assert!(logged.contains("fetcher panicked"), "unexpected log: {logged}");
}
