use crate::task::signal::StopSignal;

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A background thread that runs one pass of some maintenance work on a
/// fixed interval until it is stopped.
pub(crate) struct Sweeper {
  _handle: JoinHandle<()>, // Detached on drop; the loop exits once the signal trips.
  signal: Arc<StopSignal>,
}

impl Sweeper {
  /// Spawns a named sweeper thread. The first pass runs one full `interval`
  /// after spawning.
  pub(crate) fn spawn<F>(name: &str, interval: Duration, mut pass: F) -> io::Result<Self>
  where
    F: FnMut() + Send + 'static,
  {
    let signal = Arc::new(StopSignal::new());
    let stop = signal.clone();

    let handle = thread::Builder::new().name(name.to_owned()).spawn(move || {
      let Some(mut deadline) = Instant::now().checked_add(interval) else {
        // An interval past the end of the clock never comes due.
        stop.wait();
        return;
      };
      while !stop.wait_until(deadline) {
        pass();

        // Ticks that fell due while the pass was running are dropped, not
        // replayed back to back.
        let now = Instant::now();
        deadline = match deadline.checked_add(interval) {
          Some(next) if next > now => next,
          _ => match now.checked_add(interval) {
            Some(next) => next,
            None => {
              stop.wait();
              return;
            }
          },
        };
      }
    })?;

    Ok(Self {
      _handle: handle,
      signal,
    })
  }

  /// Signals the sweeper to stop. A pass already running is allowed to
  /// finish; no further pass starts.
  pub(crate) fn stop(self) {
    self.signal.stop();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn runs_on_interval_until_stopped() {
    let passes = Arc::new(AtomicUsize::new(0));
    let sweeper = {
      let passes = passes.clone();
      Sweeper::spawn("test-sweeper", Duration::from_millis(20), move || {
        passes.fetch_add(1, Ordering::SeqCst);
      })
      .unwrap()
    };

    thread::sleep(Duration::from_millis(150));
    sweeper.stop();
    thread::sleep(Duration::from_millis(50));
    let seen = passes.load(Ordering::SeqCst);
    assert!(seen >= 2, "expected several passes, saw {seen}");

    thread::sleep(Duration::from_millis(100));
    assert_eq!(passes.load(Ordering::SeqCst), seen);
  }

  #[test]
  fn unreachable_interval_idles_until_stopped() {
    let passes = Arc::new(AtomicUsize::new(0));
    let sweeper = {
      let passes = passes.clone();
      Sweeper::spawn("test-sweeper", Duration::MAX, move || {
        passes.fetch_add(1, Ordering::SeqCst);
      })
      .unwrap()
    };

    thread::sleep(Duration::from_millis(20));
    let Sweeper { _handle: handle, signal } = sweeper;
    signal.stop();
    handle.join().unwrap();
    assert_eq!(passes.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn first_pass_waits_a_full_interval() {
    let passes = Arc::new(AtomicUsize::new(0));
    let sweeper = {
      let passes = passes.clone();
      Sweeper::spawn("test-sweeper", Duration::from_millis(500), move || {
        passes.fetch_add(1, Ordering::SeqCst);
      })
      .unwrap()
    };

    thread::sleep(Duration::from_millis(50));
    assert_eq!(passes.load(Ordering::SeqCst), 0);
    sweeper.stop();
  }
}
