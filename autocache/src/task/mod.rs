//! This module contains the background tasks for the cache: the refresh and
//! expire passes, the sweeper threads that drive them, and the notifier that
//! runs user handlers.

pub(crate) mod expire;
pub(crate) mod notifier;
pub(crate) mod refresh;
pub(crate) mod signal;
pub(crate) mod sweeper;
