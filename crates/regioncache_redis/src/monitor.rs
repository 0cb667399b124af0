// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Connection health monitoring.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use regioncache_store::ConnectionGuard;

/// Default probe interval.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(2);

/// Drives a [`ConnectionGuard`] from periodic `PING` probes.
///
/// The redis crate's multiplexed connection reconnects internally but does
/// not surface connection-lost/restored events, so the monitor is the
/// single writer of the guard's availability: it pings the endpoint on an
/// interval and calls `mark_lost` / `mark_restored` on edges. Guard
/// callbacks (such as invalidator replay) therefore run on the monitor
/// task and must not block it.
///
/// Dropping the returned handle does not stop the task; guards and their
/// monitors live for the process (there is no guard teardown).
#[derive(Debug)]
pub struct ConnectionMonitor;

impl ConnectionMonitor {
    /// Spawns a monitor task probing the given connection.
    pub fn spawn(
        conn: ConnectionManager,
        guard: Arc<ConnectionGuard>,
        probe_interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(probe_interval).await;

                let mut probe = conn.clone();
                let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut probe).await;
                match pong {
                    Ok(_) => {
                        if !guard.is_available() {
                            tracing::debug!("shared store connection restored");
                        }
                        guard.mark_restored();
                    }
                    Err(error) => {
                        if guard.is_available() {
                            tracing::warn!(%error, "shared store connection lost");
                        }
                        guard.mark_lost();
                    }
                }
            }
        })
    }
}
