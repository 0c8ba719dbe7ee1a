use parking_lot::{Condvar, Mutex};
use std::time::Instant;

/// A one-shot cancellation signal that sleeping background threads can wait
/// on with a deadline. Tripping it wakes every waiter immediately.
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
  stopped: Mutex<bool>,
  cond: Condvar,
}

impl StopSignal {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn stop(&self) {
    let mut stopped = self.stopped.lock();
    *stopped = true;
    self.cond.notify_all();
  }

  #[cfg(test)]
  pub(crate) fn is_stopped(&self) -> bool {
    *self.stopped.lock()
  }

  /// Sleeps until the signal is tripped.
  pub(crate) fn wait(&self) {
    let mut stopped = self.stopped.lock();
    while !*stopped {
      self.cond.wait(&mut stopped);
    }
  }

  /// Sleeps until `deadline` unless stopped first. Returns `true` if the
  /// signal was tripped.
  pub(crate) fn wait_until(&self, deadline: Instant) -> bool {
    let mut stopped = self.stopped.lock();
    while !*stopped {
      if self.cond.wait_until(&mut stopped, deadline).timed_out() {
        break;
      }
    }
    *stopped
  }
}
