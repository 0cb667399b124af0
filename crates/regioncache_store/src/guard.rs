// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The shared connection availability signal.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

type Callback = Box<dyn Fn() -> bool + Send + Sync>;

/// Tracks the availability of one shared-store connection and notifies
/// dependents on availability edges.
///
/// A guard starts out available. The component monitoring the underlying
/// transport calls [`mark_lost`](Self::mark_lost) and
/// [`mark_restored`](Self::mark_restored); both are edge-triggered, so
/// callbacks fire only when availability actually changes.
///
/// One guard is shared by every provider and invalidator pointed at the same
/// endpoint, so callback registration is additive. A callback returns whether
/// it wants to stay subscribed; returning `false` drops it from the guard.
/// Callbacks run on whatever task observes the transition and must not block
/// it for long; restored handlers in particular must be safe to run
/// concurrently with new removal requests.
///
/// # Examples
///
/// ```
/// use regioncache_store::ConnectionGuard;
///
/// let guard = ConnectionGuard::new();
/// assert!(guard.is_available());
///
/// guard.mark_lost();
/// assert!(!guard.is_available());
/// ```
#[derive(Default)]
pub struct ConnectionGuard {
    available: AtomicBool,
    on_lost: Mutex<Vec<Callback>>,
    on_restored: Mutex<Vec<Callback>>,
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("available", &self.is_available())
            .finish_non_exhaustive()
    }
}

impl ConnectionGuard {
    /// Creates a new guard that reports the connection as available.
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            on_lost: Mutex::new(Vec::new()),
            on_restored: Mutex::new(Vec::new()),
        }
    }

    /// Returns whether the connection is currently believed available.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Registers a callback invoked when the connection is lost.
    ///
    /// The callback stays subscribed while it returns `true`; the guard
    /// drops it after the first `false`.
    pub fn on_lost(&self, callback: impl Fn() -> bool + Send + Sync + 'static) {
        self.on_lost.lock().push(Box::new(callback));
    }

    /// Registers a callback invoked when the connection is restored.
    ///
    /// The callback stays subscribed while it returns `true`; the guard
    /// drops it after the first `false`.
    pub fn on_restored(&self, callback: impl Fn() -> bool + Send + Sync + 'static) {
        self.on_restored.lock().push(Box::new(callback));
    }

    /// Records a lost connection, notifying `on_lost` subscribers if the
    /// guard previously reported the connection as available.
    pub fn mark_lost(&self) {
        if self.available.swap(false, Ordering::AcqRel) {
            self.on_lost.lock().retain(|callback| callback());
        }
    }

    /// Records a restored connection, notifying `on_restored` subscribers if
    /// the guard previously reported the connection as lost.
    pub fn mark_restored(&self) {
        if !self.available.swap(true, Ordering::AcqRel) {
            self.on_restored.lock().retain(|callback| callback());
        }
    }
}
