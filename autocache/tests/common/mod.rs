#![allow(dead_code)]

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, Once};

use fibre_autocache::{BoxError, Cache, CacheBuilder};

/// The error our test fetchers fail with.
#[derive(Debug)]
pub struct Upstream(pub &'static str);

impl fmt::Display for Upstream {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "upstream failure: {}", self.0)
  }
}

impl Error for Upstream {}

pub fn upstream(reason: &'static str) -> BoxError {
  Box::new(Upstream(reason))
}

/// A fetcher whose answers can be switched between success and failure while
/// the cache is running. Every call is counted.
#[derive(Clone)]
pub struct Switch {
  pub calls: Arc<AtomicUsize>,
  pub failing: Arc<AtomicBool>,
  pub value: Arc<Mutex<String>>,
}

impl Switch {
  pub fn new(value: &str) -> Self {
    Self {
      calls: Arc::new(AtomicUsize::new(0)),
      failing: Arc::new(AtomicBool::new(false)),
      value: Arc::new(Mutex::new(value.to_string())),
    }
  }

  pub fn failing() -> Self {
    let switch = Self::new("");
    switch.fail(true);
    switch
  }

  pub fn fail(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  pub fn set(&self, value: &str) {
    *self.value.lock().unwrap() = value.to_string();
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn fetcher(&self) -> impl Fn(&str) -> Result<String, BoxError> + Send + Sync + 'static {
    let switch = self.clone();
    move |_key: &str| {
      switch.calls.fetch_add(1, Ordering::SeqCst);
      if switch.failing.load(Ordering::SeqCst) {
        Err(upstream("switched off"))
      } else {
        Ok(switch.value.lock().unwrap().clone())
      }
    }
  }
}

/// A cache reading through `switch`, with no background sweepers.
pub fn build_switched_cache(switch: &Switch) -> Cache<String> {
  CacheBuilder::new()
    .fetcher(switch.fetcher())
    .shards(4)
    .build()
    .unwrap()
}

/// An internal-error sink that forwards every message to a channel.
pub fn capture_err_log() -> (impl Fn(&str) + Send + Sync + 'static, mpsc::Receiver<String>) {
  let (tx, rx) = mpsc::channel();
  let tx = Mutex::new(tx);
  let sink = move |msg: &str| {
    let _ = tx.lock().unwrap().send(msg.to_string());
  };
  (sink, rx)
}

/// Installs a fmt subscriber filtered by `RUST_LOG`, once per test binary.
pub fn init_tracing() {
  static INIT: Once = Once::new();
  INIT.call_once(|| {
    let _ = tracing_subscriber::fmt()
      .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
      .with_test_writer()
      .try_init();
  });
}
