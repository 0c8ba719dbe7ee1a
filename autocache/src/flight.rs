//! Per-key call deduplication.
//!
//! Concurrent callers that ask for the same key while a computation is in
//! flight all block on one shared [`Flight`] and receive a clone of its
//! result, so the underlying fetch runs at most once at a time per key.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::hash::BuildHasher;
use std::sync::Arc;
use std::thread::{self, Thread};

/// The internal state of a call in flight.
enum State<T> {
  Computing,
  Complete(T),
  /// The leader unwound before producing a result.
  Abandoned,
}

struct Inner<T> {
  state: State<T>,
  waiters: VecDeque<Thread>,
}

/// One in-flight computation that any number of threads can wait on.
pub(crate) struct Flight<T> {
  inner: Mutex<Inner<T>>,
}

impl<T: Clone> Flight<T> {
  fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: State::Computing,
        waiters: VecDeque::new(),
      }),
    }
  }

  fn settle(&self, state: State<T>) {
    let mut inner = self.inner.lock();
    inner.state = state;
    for waiter in inner.waiters.drain(..) {
      waiter.unpark();
    }
  }

  /// Blocks until the leader settles the flight. `None` means the leader
  /// gave up and the caller should try again.
  fn wait(&self) -> Option<T> {
    loop {
      {
        let mut inner = self.inner.lock();
        match &inner.state {
          State::Complete(value) => return Some(value.clone()),
          State::Abandoned => return None,
          State::Computing => inner.waiters.push_back(thread::current()),
        }
      }
      // Spurious wakeups just loop back to the state check.
      thread::park();
    }
  }
}

enum Role<T> {
  Leader(Arc<Flight<T>>),
  Follower(Arc<Flight<T>>),
}

/// Settles the leader's flight as abandoned if the computation unwinds.
struct LeaderGuard<'a, T: Clone, H: BuildHasher> {
  group: &'a FlightGroup<T, H>,
  key: &'a str,
  flight: Arc<Flight<T>>,
  armed: bool,
}

impl<T: Clone, H: BuildHasher> Drop for LeaderGuard<'_, T, H> {
  fn drop(&mut self) {
    if self.armed {
      self.group.forget(self.key);
      self.flight.settle(State::Abandoned);
    }
  }
}

/// A set of in-flight computations keyed by string.
pub(crate) struct FlightGroup<T, H> {
  pending: Mutex<HashMap<String, Arc<Flight<T>>, H>>,
}

impl<T: Clone, H: BuildHasher> FlightGroup<T, H> {
  pub(crate) fn with_hasher(hasher: H) -> Self {
    Self {
      pending: Mutex::new(HashMap::with_hasher(hasher)),
    }
  }

  /// Runs `f` for `key` unless a call for the same key is already in flight,
  /// in which case this waits for and returns that call's result instead.
  ///
  /// The flag is `true` when the result was produced by another caller.
  pub(crate) fn run<F>(&self, key: &str, f: F) -> (T, bool)
  where
    F: FnOnce() -> T,
  {
    let flight = loop {
      match self.join(key) {
        Role::Leader(flight) => break flight,
        Role::Follower(flight) => {
          if let Some(value) = flight.wait() {
            return (value, true);
          }
        }
      }
    };

    let mut guard = LeaderGuard {
      group: self,
      key,
      flight,
      armed: true,
    };
    let value = f();
    guard.armed = false;

    // Unregister before waking anyone so a late caller starts its own flight
    // rather than joining a finished one.
    self.forget(key);
    guard.flight.settle(State::Complete(value.clone()));
    (value, false)
  }

  fn join(&self, key: &str) -> Role<T> {
    let mut pending = self.pending.lock();
    if let Some(flight) = pending.get(key) {
      return Role::Follower(flight.clone());
    }
    let flight = Arc::new(Flight::new());
    pending.insert(key.to_owned(), flight.clone());
    Role::Leader(flight)
  }

  fn forget(&self, key: &str) {
    self.pending.lock().remove(key);
  }

  #[cfg(test)]
  fn in_flight(&self) -> usize {
    self.pending.lock().len()
  }
}
