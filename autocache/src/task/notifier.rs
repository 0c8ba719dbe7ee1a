use crate::error::FetchError;
use crate::listener::{ErrLog, Handlers, Notification};

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use fibre::mpmc;

/// The producer side of the notifier.
///
/// The queue is unbounded, so sending never blocks the caller and never
/// drops a notification while the notifier thread is alive.
pub(crate) struct NotificationSender<V: Send + Sync> {
  tx: mpmc::Sender<Notification<V>>,
  err_log: ErrLog,
  wants_error: bool,
  wants_change: bool,
  wants_delete: bool,
}

impl<V: Send + Sync + 'static> NotificationSender<V> {
  pub(crate) fn error(&self, key: &str, error: &FetchError) {
    if self.wants_error {
      self.send(Notification::Error {
        key: key.to_owned(),
        error: error.clone(),
      });
    }
  }

  pub(crate) fn change(&self, key: &str, old: Option<Arc<V>>, new: Arc<V>) {
    if self.wants_change {
      self.send(Notification::Change {
        key: key.to_owned(),
        old,
        new,
      });
    }
  }

  pub(crate) fn delete(&self, key: String, old: Option<Arc<V>>) {
    if self.wants_delete {
      self.send(Notification::Delete { key, old });
    }
  }

  fn send(&self, notification: Notification<V>) {
    if self.tx.send(notification).is_err() {
      (self.err_log)("notifier is gone, dropping notification");
    }
  }
}

/// Spawns the notifier thread that invokes user handlers.
///
/// The thread exits once every [`NotificationSender`] has been dropped.
pub(crate) fn spawn<V>(handlers: Handlers<V>, err_log: ErrLog) -> io::Result<NotificationSender<V>>
where
  V: Send + Sync + 'static,
{
  let (tx, rx) = mpmc::unbounded::<Notification<V>>();

  let sender = NotificationSender {
    tx,
    err_log: err_log.clone(),
    wants_error: handlers.on_error.is_some(),
    wants_change: handlers.on_change.is_some(),
    wants_delete: handlers.on_delete.is_some(),
  };

  thread::Builder::new()
    .name("autocache-notifier".to_owned())
    .spawn(move || {
      while let Ok(notification) = rx.recv() {
        let kind = notification.kind();
        let key = notification.key().to_owned();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| notification.dispatch(&handlers)));
        if outcome.is_err() {
          err_log(&format!("{kind} handler panicked for key {key:?}"));
        }
      }
    })?;

  Ok(sender)
}
