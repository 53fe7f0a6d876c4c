use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use mapcache::{Cache, CacheError};
use thiserror::Error;
use tokio::task::JoinSet;

use crate::config::Config;

/// Longest TTL a soak key gets, as a multiple of the base TTL.
const MAX_TTL_FACTOR: u32 = 4;

#[derive(Debug, Error)]
pub enum SoakError {
    #[error("expected {expected} keys to survive expiry, found {found} ({pending} still pending)")]
    Mismatch {
        expected: usize,
        found: usize,
        pending: usize,
    },

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, Clone, Copy)]
pub struct Report {
    pub written: usize,
    pub persistent: usize,
    pub remaining: usize,
}

/// Hammer one cache from several tasks, wait out every TTL, then check that
/// exactly the keys without a TTL are left.
pub async fn run(config: &Config) -> Result<Report, SoakError> {
    let cache = Arc::new(Cache::new());
    let ttl = Duration::from_millis(config.ttl_ms);
    let workers = config.workers.max(1);
    let per_worker = config.keys / workers;

    tracing::info!(workers, per_worker, ?ttl, "starting soak run");

    let mut tasks = JoinSet::new();
    for worker in 0..workers {
        let cache = cache.clone();
        tasks.spawn(async move { populate(&cache, worker, per_worker, ttl).await });
    }

    let mut persistent = 0;
    while let Some(result) = tasks.join_next().await {
        persistent += result??;
    }

    tracing::info!(
        entries = cache.len(),
        pending = cache.pending_expirations(),
        "writers finished, waiting for expiry"
    );

    tokio::time::sleep(ttl * MAX_TTL_FACTOR + Duration::from_millis(config.settle_ms)).await;

    let remaining = cache.len();
    let pending = cache.pending_expirations();
    if remaining != persistent || pending != 0 {
        return Err(SoakError::Mismatch {
            expected: persistent,
            found: remaining,
            pending,
        });
    }

    Ok(Report {
        written: per_worker * workers,
        persistent,
        remaining,
    })
}

/// Write `count` keys with a mix of TTL operations. Returns how many of them
/// should outlive every deadline.
async fn populate(
    cache: &Cache,
    worker: usize,
    count: usize,
    ttl: Duration,
) -> Result<usize, CacheError> {
    let mut persistent = 0;

    for i in 0..count {
        let key = format!("w{worker}:k{i}");
        cache.set(key.clone(), Bytes::from(format!("v{i}")));

        match i % 10 {
            0 => persistent += 1,
            1 => {
                cache.set_expire(&key, Duration::from_secs(3600))?;
                cache.persist(&key);
                persistent += 1;
            }
            2 => {
                cache.set_expire(&key, ttl)?;
                cache.del(&key);
            }
            3 => cache.set_with_expiry(key, Bytes::from_static(b"fresh"), ttl),
            _ => {
                let factor = 1 + (i as u32 % MAX_TTL_FACTOR);
                if i % 3 == 0 {
                    // Overwrite under a TTL that cannot lapse mid-loop, then
                    // pull the deadline in; the overwrite must not clear it.
                    cache.set_expire(&key, Duration::from_secs(3600))?;
                    cache.set(key.clone(), Bytes::from_static(b"overwritten"));
                }
                cache.set_expire(&key, ttl * factor)?;
            }
        }

        if i % 64 == 0 {
            tokio::task::yield_now().await;
        }
    }

    Ok(persistent)
}
