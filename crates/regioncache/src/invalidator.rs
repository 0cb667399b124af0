// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cross-process invalidation with offline buffering.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use regioncache_store::{Backplane, ConnectionGuard, Result};

use crate::version_key;

struct SharedBackplane {
    store: Arc<dyn Backplane>,
    guard: Arc<ConnectionGuard>,
}

/// Broadcasts removals and region clears to the shared store, surviving
/// connection loss.
///
/// While the connection guard reports the shared store unavailable, removal
/// requests are buffered and clears collapse into a single pending flag;
/// both report optimistic success to the caller. When the guard flips back
/// to available, a replay task pushes the buffered work out. A pending
/// clear supersedes buffered removals, since clearing the region removes
/// those keys anyway.
///
/// Replay is at-least-once: a key whose replay fails is re-buffered for the
/// next restoration edge. Removals and clears are idempotent, so replaying
/// one twice is harmless.
pub struct Invalidator {
    region: String,
    shared: Option<SharedBackplane>,
    offline_removals: Mutex<Vec<String>>,
    pending_clear: AtomicBool,
}

impl std::fmt::Debug for Invalidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invalidator")
            .field("region", &self.region)
            .field("pending_removals", &self.pending_removals())
            .field("pending_clear", &self.has_pending_clear())
            .finish_non_exhaustive()
    }
}

impl Invalidator {
    /// Creates an invalidator with no shared store.
    ///
    /// Every operation is a no-op success; removals report `false` since
    /// nothing was there to remove.
    #[must_use]
    pub fn local(environment: &str, scope: &str) -> Arc<Self> {
        Arc::new(Self {
            region: region_key(environment, scope),
            shared: None,
            offline_removals: Mutex::new(Vec::new()),
            pending_clear: AtomicBool::new(false),
        })
    }

    /// Creates an invalidator broadcasting through the given backplane.
    ///
    /// Registers a restoration handler on the guard that replays buffered
    /// work. The handler holds only a weak reference and unsubscribes
    /// itself from the guard once the last `Arc` is dropped.
    ///
    /// Must be called from within a tokio runtime, as restoration spawns
    /// the replay task.
    #[must_use]
    pub fn shared(
        environment: &str,
        scope: &str,
        store: Arc<dyn Backplane>,
        guard: Arc<ConnectionGuard>,
    ) -> Arc<Self> {
        let this = Arc::new(Self {
            region: region_key(environment, scope),
            shared: Some(SharedBackplane {
                store,
                guard: Arc::clone(&guard),
            }),
            offline_removals: Mutex::new(Vec::new()),
            pending_clear: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&this);
        guard.on_restored(move || match weak.upgrade() {
            Some(invalidator) => {
                tokio::spawn(async move {
                    invalidator.replay().await;
                });
                true
            }
            None => false,
        });
        this
    }

    /// The region this invalidator addresses.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// How many removals are currently buffered for replay.
    #[must_use]
    pub fn pending_removals(&self) -> usize {
        self.offline_removals.lock().len()
    }

    /// Whether a region clear is buffered for replay.
    #[must_use]
    pub fn has_pending_clear(&self) -> bool {
        self.pending_clear.load(Ordering::Acquire)
    }

    /// Clears the whole region on the shared store.
    ///
    /// Without a shared store this is a no-op success. While the connection
    /// is down the clear is buffered and the call still succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared store rejects the clear.
    pub async fn clear(&self) -> Result<()> {
        let Some(shared) = &self.shared else {
            return Ok(());
        };

        if shared.guard.is_available() {
            shared.store.clear_region(&self.region).await
        } else {
            tracing::debug!(region = %self.region, "buffering region clear until the connection returns");
            self.pending_clear.store(true, Ordering::Release);
            Ok(())
        }
    }

    /// Removes a key from the shared store.
    ///
    /// While the connection is down the key is buffered and the call
    /// reports optimistic success.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared store rejects the removal.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let Some(shared) = &self.shared else {
            return Ok(false);
        };

        if shared.guard.is_available() {
            shared.store.remove(key, &self.region).await
        } else {
            self.buffer(key);
            Ok(true)
        }
    }

    /// Removes a versioned entry's version key from the shared store.
    ///
    /// The offline path buffers the base key; replay of a versioned
    /// removal degrades to the base key.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared store rejects the removal.
    pub async fn remove_versioned(&self, key: &str) -> Result<bool> {
        let Some(shared) = &self.shared else {
            return Ok(false);
        };

        if shared.guard.is_available() {
            shared.store.remove(&version_key(key), &self.region).await
        } else {
            self.buffer(key);
            Ok(true)
        }
    }

    /// Pushes buffered work to the shared store.
    ///
    /// Runs automatically on restoration edges; safe to call at any time.
    /// Failures are logged and re-buffered rather than surfaced, since
    /// replay has no caller to report to.
    pub async fn replay(&self) {
        let Some(shared) = &self.shared else {
            return;
        };

        if self.pending_clear.swap(false, Ordering::AcqRel) {
            // The clear supersedes buffered removals.
            self.offline_removals.lock().clear();
            if let Err(error) = shared.store.clear_region(&self.region).await {
                tracing::warn!(%error, region = %self.region, "replaying buffered clear failed");
                self.pending_clear.store(true, Ordering::Release);
            }
            return;
        }

        let buffered = std::mem::take(&mut *self.offline_removals.lock());
        if buffered.is_empty() {
            return;
        }

        tracing::debug!(region = %self.region, count = buffered.len(), "replaying buffered removals");
        for key in buffered {
            if let Err(error) = shared.store.remove(&key, &self.region).await {
                tracing::warn!(%error, key, region = %self.region, "replaying buffered removal failed");
                self.offline_removals.lock().push(key);
            }
        }
    }

    fn buffer(&self, key: &str) {
        tracing::debug!(region = %self.region, key, "buffering removal until the connection returns");
        self.offline_removals.lock().push(key.to_owned());
    }
}

fn region_key(environment: &str, scope: &str) -> String {
    format!("{environment}-{scope}")
}
