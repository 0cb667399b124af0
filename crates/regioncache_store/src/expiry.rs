// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::time::{Duration, SystemTime};

/// The kind of expiry a store policy applies to its entries.
///
/// This is the configuration-level tag; a resolved policy carrying the
/// actual duration or deadline is an [`Expiration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExpiryType {
    /// No automatic expiry.
    #[default]
    None,
    /// Expiry based on last access time.
    Sliding,
    /// Expiry at a specific point in time.
    Absolute,
}

impl fmt::Display for ExpiryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Sliding => write!(f, "Sliding"),
            Self::Absolute => write!(f, "Absolute"),
        }
    }
}

/// A per-entry expiry override.
///
/// Tiers carry a default [`StorePolicy`]; individual entries can override it
/// through [`RegionStore::expire`](crate::RegionStore::expire) and revert to
/// the tier default through
/// [`RegionStore::remove_expiration`](crate::RegionStore::remove_expiration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    /// The entry never expires automatically.
    #[default]
    None,
    /// The entry expires when it has not been read for the given duration.
    Sliding(Duration),
    /// The entry expires at the given instant.
    Absolute(SystemTime),
}

impl Expiration {
    /// Returns the sliding window, if this is a sliding policy.
    #[must_use]
    pub fn sliding_window(&self) -> Option<Duration> {
        match self {
            Self::Sliding(window) => Some(*window),
            _ => None,
        }
    }
}

/// A tier's default expiry policy.
///
/// Unlike a per-entry [`Expiration`], an absolute tier policy is relative
/// to each write: every entry expires `timeout` after it is stored. A
/// sliding tier policy expires entries `timeout` after their last read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorePolicy {
    /// The kind of expiry applied by default.
    pub kind: ExpiryType,
    /// The window (sliding) or lifetime (absolute) applied by default.
    pub timeout: Duration,
}

impl StorePolicy {
    /// A policy that never expires entries.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// A policy expiring entries that go unread for `timeout`.
    #[must_use]
    pub fn sliding(timeout: Duration) -> Self {
        Self {
            kind: ExpiryType::Sliding,
            timeout,
        }
    }

    /// A policy expiring entries `timeout` after each write.
    #[must_use]
    pub fn absolute(timeout: Duration) -> Self {
        Self {
            kind: ExpiryType::Absolute,
            timeout,
        }
    }
}

impl fmt::Display for StorePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:?}", self.kind, self.timeout)
    }
}
