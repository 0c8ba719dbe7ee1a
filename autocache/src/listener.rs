//! User callbacks invoked off the read and sweep paths.
//!
//! Handlers run on the cache's notifier thread, never on the thread that
//! triggered them. Notifications for different keys may be delivered in any
//! order.

use crate::error::FetchError;

use std::sync::Arc;

/// Called when a refresh fetch fails: `(key, error)`.
pub type ErrorHandler = Arc<dyn Fn(&str, &FetchError) + Send + Sync>;

/// Called when a refresh produced a value that `is_same` reports as
/// different: `(key, old, new)`. `old` is `None` when the entry recovered
/// from error state.
pub type ChangeHandler<V> = Arc<dyn Fn(&str, Option<&Arc<V>>, &Arc<V>) + Send + Sync>;

/// Called when an entry is removed by `delete_if` or by expiry:
/// `(key, last value)`. The value is `None` for entries in error state.
pub type DeleteHandler<V> = Arc<dyn Fn(&str, Option<&Arc<V>>) + Send + Sync>;

/// Change-detection predicate: `(key, old, new) -> same?`. `old` is `None`
/// when the entry held an error.
pub type IsSame<V> = Arc<dyn Fn(&str, Option<&V>, &V) -> bool + Send + Sync>;

/// Sink for internal errors that have no caller to return to.
pub type ErrLog = Arc<dyn Fn(&str) + Send + Sync>;

/// The optional set of notification handlers a cache was built with.
pub(crate) struct Handlers<V> {
  pub(crate) on_error: Option<ErrorHandler>,
  pub(crate) on_change: Option<ChangeHandler<V>>,
  pub(crate) on_delete: Option<DeleteHandler<V>>,
}

impl<V> Handlers<V> {
  pub(crate) fn is_empty(&self) -> bool {
    self.on_error.is_none() && self.on_change.is_none() && self.on_delete.is_none()
  }
}

impl<V> Default for Handlers<V> {
  fn default() -> Self {
    Self {
      on_error: None,
      on_change: None,
      on_delete: None,
    }
  }
}

/// A message sent to the notifier task.
pub(crate) enum Notification<V> {
  Error {
    key: String,
    error: FetchError,
  },
  Change {
    key: String,
    old: Option<Arc<V>>,
    new: Arc<V>,
  },
  Delete {
    key: String,
    old: Option<Arc<V>>,
  },
}

impl<V> Notification<V> {
  pub(crate) fn key(&self) -> &str {
    match self {
      Notification::Error { key, .. }
      | Notification::Change { key, .. }
      | Notification::Delete { key, .. } => key,
    }
  }

  pub(crate) fn kind(&self) -> &'static str {
    match self {
      Notification::Error { .. } => "error",
      Notification::Change { .. } => "change",
      Notification::Delete { .. } => "delete",
    }
  }

  /// Invokes the matching handler, if one is configured.
  pub(crate) fn dispatch(self, handlers: &Handlers<V>) {
    match self {
      Notification::Error { key, error } => {
        if let Some(handler) = &handlers.on_error {
          handler(&key, &error);
        }
      }
      Notification::Change { key, old, new } => {
        if let Some(handler) = &handlers.on_change {
          handler(&key, old.as_ref(), &new);
        }
      }
      Notification::Delete { key, old } => {
        if let Some(handler) = &handlers.on_delete {
          handler(&key, old.as_ref());
        }
      }
    }
  }
}
