// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The Redis-backed region store.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, IntoConnectionInfo};
use serde::Serialize;
use serde::de::DeserializeOwned;

use regioncache_store::{
    Backplane, ConnectionGuard, Error, Expiration, ExpiryType, RegionStore, Result, StorePolicy,
};

/// Establishes a multiplexed connection to the given endpoint and database.
///
/// The database index is bound at connect time; Redis multiplexed
/// connections cannot switch databases per call, so stores addressing
/// different databases use distinct connections.
///
/// # Errors
///
/// Returns an error if the connection string cannot be parsed or the
/// endpoint cannot be reached.
pub async fn connect(connection_string: &str, database: i64) -> Result<ConnectionManager> {
    let mut info = connection_string
        .into_connection_info()
        .map_err(Error::from_source)?;
    info.redis.db = database;

    let client = redis::Client::open(info).map_err(Error::from_source)?;
    client.get_connection_manager().await.map_err(Error::from_source)
}

/// On-wire shape of one entry.
///
/// The sliding window travels with the value so a reader knows to refresh
/// the key's TTL on a hit; absolute and no-expiry entries rely on Redis
/// itself (`EXPIRE` / `EXPIREAT` / no TTL) and carry no window.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Envelope<V> {
    value: V,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sliding_secs: Option<u64>,
}

/// The TTL a write applies to its key.
#[derive(Debug, Clone, Copy)]
enum Ttl {
    /// No TTL; the key lives until removed.
    None,
    /// Expires this long after the write; reads do not refresh it.
    AfterWrite(Duration),
    /// Expires at a wall-clock deadline.
    At(SystemTime),
    /// Sliding window; reads refresh it.
    Window(Duration),
}

impl Ttl {
    /// The TTL a tier-default write applies.
    fn for_policy(policy: StorePolicy) -> Self {
        match policy.kind {
            ExpiryType::None => Self::None,
            ExpiryType::Sliding => Self::Window(policy.timeout),
            ExpiryType::Absolute => Self::AfterWrite(policy.timeout),
        }
    }

    /// The TTL a per-entry override applies.
    fn for_override(expiration: Expiration) -> Self {
        match expiration {
            Expiration::None => Self::None,
            Expiration::Sliding(window) => Self::Window(window),
            Expiration::Absolute(deadline) => Self::At(deadline),
        }
    }

    fn window(self) -> Option<Duration> {
        match self {
            Self::Window(window) => Some(window),
            _ => None,
        }
    }
}

/// Clamps a duration to whole seconds, never below one.
fn whole_secs(duration: Duration) -> u64 {
    duration.as_secs().max(1)
}

fn unix_deadline(deadline: SystemTime) -> i64 {
    deadline
        .duration_since(UNIX_EPOCH)
        .map_or(0, |since| i64::try_from(since.as_secs()).unwrap_or(i64::MAX))
}

/// A shared store tier backed by Redis.
///
/// One `RedisStore` serves values of any serde-serializable type, so a
/// single connection can back both the value store and the version store of
/// a provider, as well as the invalidation backplane.
///
/// Transport errors surface to the caller as-is; the store does not retry.
/// Availability tracking is the job of the [`ConnectionMonitor`]
/// (crate-level docs) writing to the shared guard, which callers consult
/// *before* deciding to issue an operation.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    default_policy: StorePolicy,
    guard: Arc<ConnectionGuard>,
    traced: bool,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("default_policy", &self.default_policy)
            .field("available", &self.guard.is_available())
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Creates a store over an established connection.
    #[must_use]
    pub fn new(conn: ConnectionManager, default_policy: StorePolicy, guard: Arc<ConnectionGuard>) -> Self {
        Self {
            conn,
            default_policy,
            guard,
            traced: false,
        }
    }

    /// Enables per-command tracing events on this store.
    #[must_use]
    pub fn traced(mut self, traced: bool) -> Self {
        self.traced = traced;
        self
    }

    /// Returns the guard that tracks this store's connection.
    #[must_use]
    pub fn guard(&self) -> &Arc<ConnectionGuard> {
        &self.guard
    }

    fn full_key(key: &str, region: &str) -> String {
        format!("{region}:{key}")
    }

    fn trace(&self, command: &str, key: &str) {
        if self.traced {
            tracing::debug!(command, key, "redis command");
        }
    }

    /// Writes an envelope and applies its TTL.
    ///
    /// A plain `SET` clears any TTL, which is exactly what `Ttl::None`
    /// needs.
    async fn write_envelope(&self, full: &str, raw: String, ttl: Ttl) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Ttl::Window(duration) | Ttl::AfterWrite(duration) => {
                let _: () = conn
                    .set_ex(full, raw, whole_secs(duration))
                    .await
                    .map_err(Error::from_source)?;
            }
            Ttl::None => {
                let _: () = conn.set(full, raw).await.map_err(Error::from_source)?;
            }
            Ttl::At(deadline) => {
                let _: () = conn.set(full, raw).await.map_err(Error::from_source)?;
                let _: bool = conn
                    .expire_at(full, unix_deadline(deadline))
                    .await
                    .map_err(Error::from_source)?;
            }
        }
        Ok(())
    }

    /// Re-writes an existing entry's envelope for a new effective TTL, then
    /// applies it. No-op when the key is absent.
    async fn rewrite_policy(&self, full: &str, ttl: Ttl) -> Result<()> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(full).await.map_err(Error::from_source)?;
        let Some(raw) = raw else {
            return Ok(());
        };

        let mut envelope: serde_json::Value = serde_json::from_str(&raw).map_err(Error::from_source)?;
        if let Some(fields) = envelope.as_object_mut() {
            match ttl.window() {
                Some(window) => {
                    fields.insert("sliding_secs".to_owned(), whole_secs(window).into());
                }
                None => {
                    fields.remove("sliding_secs");
                }
            }
        }

        let raw = serde_json::to_string(&envelope).map_err(Error::from_source)?;
        self.write_envelope(full, raw, ttl).await
    }
}

#[async_trait]
impl<V> RegionStore<V> for RedisStore
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &str, region: &str) -> Result<Option<V>> {
        let full = Self::full_key(key, region);
        self.trace("GET", &full);

        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&full).await.map_err(Error::from_source)?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        let envelope: Envelope<V> = serde_json::from_str(&raw).map_err(Error::from_source)?;
        if let Some(secs) = envelope.sliding_secs {
            // Refresh the sliding window on a hit.
            let _: bool = conn
                .expire(&full, i64::try_from(secs).unwrap_or(i64::MAX))
                .await
                .map_err(Error::from_source)?;
        }
        Ok(Some(envelope.value))
    }

    async fn put(&self, key: &str, region: &str, value: V) -> Result<()> {
        let full = Self::full_key(key, region);
        self.trace("SET", &full);

        let ttl = Ttl::for_policy(self.default_policy);
        let envelope = Envelope {
            value,
            sliding_secs: ttl.window().map(whole_secs),
        };
        let raw = serde_json::to_string(&envelope).map_err(Error::from_source)?;
        self.write_envelope(&full, raw, ttl).await
    }

    async fn remove(&self, key: &str, region: &str) -> Result<bool> {
        Backplane::remove(self, key, region).await
    }

    async fn expire(&self, key: &str, region: &str, expiration: Expiration) -> Result<()> {
        let full = Self::full_key(key, region);
        self.trace("EXPIRE", &full);
        self.rewrite_policy(&full, Ttl::for_override(expiration)).await
    }

    async fn remove_expiration(&self, key: &str, region: &str) -> Result<()> {
        let full = Self::full_key(key, region);
        self.trace("PERSIST", &full);
        self.rewrite_policy(&full, Ttl::for_policy(self.default_policy)).await
    }

    async fn clear_region(&self, region: &str) -> Result<()> {
        Backplane::clear_region(self, region).await
    }
}

#[async_trait]
impl Backplane for RedisStore {
    async fn remove(&self, key: &str, region: &str) -> Result<bool> {
        let full = Self::full_key(key, region);
        self.trace("DEL", &full);

        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(&full).await.map_err(Error::from_source)?;
        Ok(removed > 0)
    }

    async fn clear_region(&self, region: &str) -> Result<()> {
        self.trace("SCAN", region);

        let pattern = format!("{region}:*");
        let mut conn = self.conn.clone();
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter: redis::AsyncIter<'_, String> =
                conn.scan_match(&pattern).await.map_err(Error::from_source)?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        if !keys.is_empty() {
            let mut conn = self.conn.clone();
            let _: i64 = conn.del(&keys).await.map_err(Error::from_source)?;
        }
        Ok(())
    }
}
