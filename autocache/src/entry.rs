use crate::error::FetchError;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// The marker value of an entry that was touched since the last expire sweep.
pub(crate) const FRESH: u8 = 0;
/// The marker value of an entry that survived one expire sweep untouched.
pub(crate) const MARKED_STALE: u8 = 1;

/// What a reader sees for an entry: the last good value, or the error that
/// keeps the entry broken.
pub(crate) type Slot<V> = Result<Arc<V>, FetchError>;

/// A container for one cached key.
///
/// The value-or-error pair lives behind a single cell and is only ever
/// replaced as a whole, so readers never observe a half-written entry. The
/// liveness marker is independent and only consulted by the expire sweep.
#[derive(Debug)]
pub(crate) struct CacheEntry<V> {
  slot: RwLock<Slot<V>>,
  marker: AtomicU8,
}

impl<V> CacheEntry<V> {
  /// Creates a fresh entry holding `slot`.
  pub(crate) fn new(slot: Slot<V>) -> Self {
    Self {
      slot: RwLock::new(slot),
      marker: AtomicU8::new(FRESH),
    }
  }

  pub(crate) fn with_value(value: Arc<V>) -> Self {
    Self::new(Ok(value))
  }

  /// Returns a clone of the current value-or-error.
  #[inline]
  pub(crate) fn load(&self) -> Slot<V> {
    self.slot.read().clone()
  }

  /// Returns the current value, or `None` while the entry is in error state.
  #[inline]
  pub(crate) fn value(&self) -> Option<Arc<V>> {
    self.slot.read().as_ref().ok().cloned()
  }

  /// Installs a new value, clearing any error. Returns what it replaced.
  pub(crate) fn swap_value(&self, value: Arc<V>) -> Slot<V> {
    std::mem::replace(&mut *self.slot.write(), Ok(value))
  }

  /// Replaces the stored error with `err`, but only if the entry is already
  /// in error state. A healthy entry keeps serving its last good value.
  ///
  /// Returns `true` if the error was recorded.
  pub(crate) fn refresh_error(&self, err: FetchError) -> bool {
    let mut slot = self.slot.write();
    if slot.is_err() {
      *slot = Err(err);
      true
    } else {
      false
    }
  }

  /// Marks the entry as recently used, giving it a full expire interval.
  #[inline]
  pub(crate) fn touch(&self) {
    self.marker.store(FRESH, Ordering::Release);
  }

  /// Advances the CLOCK hand over this entry.
  ///
  /// A fresh entry is marked stale and survives; an entry that was already
  /// stale has not been touched for a whole interval and should be evicted.
  /// Returns `true` for the latter.
  #[inline]
  pub(crate) fn sweep_marker(&self) -> bool {
    self
      .marker
      .compare_exchange(FRESH, MARKED_STALE, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
  }

  #[cfg(test)]
  pub(crate) fn marker(&self) -> u8 {
    self.marker.load(Ordering::Acquire)
  }
}
