mod common;

use common::Switch;
use std::{sync::mpsc, thread, time::Duration};

use fibre_autocache::CacheBuilder;

#[test]
fn test_sync_expire_two_phase() {
  common::init_tracing();
  let switch = Switch::new("");
  let cache = CacheBuilder::new()
    .fetcher(switch.fetcher())
    .is_same(|_, _, _| true)
    .build()
    .unwrap();

  // Defaults never reach the fetcher.
  cache.set_default("key-default", String::new());
  cache.set_default("key-alive", String::new());
  cache.get_or_set("key-alive", String::new());
  assert_eq!(switch.calls(), 0);

  cache.get("key-expire").unwrap();
  assert_eq!(switch.calls(), 1);

  // First pass only marks.
  cache.run_expire_sweep();
  assert_eq!(cache.len(), 3);

  cache.get("key-alive").unwrap();
  assert_eq!(switch.calls(), 1);

  // Second pass removes whatever was not read in between.
  cache.run_expire_sweep();
  cache.run_refresh_sweep(); // refreshing is not a use
  assert_eq!(switch.calls(), 2);

  cache.get("key-alive").unwrap();
  assert_eq!(switch.calls(), 2);
  cache.get("key-default").unwrap();
  assert_eq!(switch.calls(), 3);
  cache.get("key-expire").unwrap();
  assert_eq!(switch.calls(), 4);
  assert_eq!(cache.metrics().evicted_by_expire, 2);
}

#[test]
fn test_sync_expire_removes_error_entries() {
  let switch = Switch::failing();
  let cache = CacheBuilder::new().fetcher(switch.fetcher()).build().unwrap();
  assert!(cache.get("key").is_err());

  cache.run_expire_sweep();
  cache.run_expire_sweep();

  assert!(!cache.contains_key("key"));
  assert!(cache.get("key").is_err());
  assert_eq!(switch.calls(), 2, "an expired error is fetched again");
}

#[test]
fn test_sync_expire_notifies_delete_handler() {
  let (tx, rx) = mpsc::channel();
  let switch = Switch::failing();
  let cache = CacheBuilder::new()
    .fetcher(switch.fetcher())
    .on_delete(move |key, old| {
      tx.send((key.to_string(), old.cloned())).unwrap();
    })
    .build()
    .unwrap();

  cache.set_default("good", "val".to_string());
  assert!(cache.get("broken").is_err());
  cache.run_expire_sweep();
  cache.run_expire_sweep();

  let mut deleted: Vec<_> = (0..2)
    .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
    .collect();
  deleted.sort_by(|a, b| a.0.cmp(&b.0));
  assert_eq!(deleted[0].0, "broken");
  assert!(deleted[0].1.is_none());
  assert_eq!(deleted[1].0, "good");
  assert_eq!(deleted[1].1.as_deref().map(String::as_str), Some("val"));
}

#[test]
fn test_sync_expire_in_background() {
  let cache = CacheBuilder::<String>::new()
    .expire(Duration::from_millis(50))
    .build()
    .unwrap();

  cache.set_default("idle", "val".to_string());
  cache.set_default("busy", "val".to_string());

  for _ in 0..20 {
    thread::sleep(Duration::from_millis(10));
    cache.get_or_set("busy", String::new());
  }

  assert!(!cache.contains_key("idle"), "idle key outlived two intervals");
  assert!(cache.contains_key("busy"));
  cache.close();
}
