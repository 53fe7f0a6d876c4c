use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub mod clock;
pub mod expire;

mod keys;
mod scheduler;

use crate::error::CacheError;
use clock::{Clock, TokioClock};
use expire::ExpiryHeap;

/// In-process key/value store whose entries may carry a time-to-live.
///
/// Values live in a sharded concurrent map. Pending expirations live in an
/// [`ExpiryHeap`] behind a single mutex, and one background task per cache
/// sleeps until the earliest deadline and removes whatever is due.
///
/// Constructing a cache spawns that task on the current tokio runtime
/// ([`Cache::try_new`] reports a missing runtime instead of panicking).
/// Dropping the cache stops the task.
pub struct Cache {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
}

struct Shared {
    entries: DashMap<String, Bytes>,
    /// Lock order: `schedule` first, then map shards.
    schedule: Mutex<Schedule>,
    wake: Notify,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Default)]
struct Schedule {
    heap: ExpiryHeap,
    /// Deadline the scheduler task is currently sleeping towards.
    armed: Option<Instant>,
}

impl Cache {
    /// Create a cache driven by tokio's clock.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime. Use [`Cache::try_new`] to
    /// get an error instead.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(TokioClock))
    }

    /// Like [`Cache::new`], but fails with [`CacheError::NoRuntime`] when no
    /// tokio runtime is available to run the expiry scheduler.
    pub fn try_new() -> Result<Self, CacheError> {
        Self::try_with_clock(Arc::new(TokioClock))
    }

    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::start(clock, &Handle::current())
    }

    pub fn try_with_clock(clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let handle = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        Ok(Self::start(clock, &handle))
    }

    fn start(clock: Arc<dyn Clock>, runtime: &Handle) -> Self {
        let shared = Arc::new(Shared {
            entries: DashMap::new(),
            schedule: Mutex::new(Schedule::default()),
            wake: Notify::new(),
            clock,
        });
        let shutdown = CancellationToken::new();

        runtime.spawn(scheduler::run(shared.clone(), shutdown.clone()));

        Self { shared, shutdown }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("entries", &self.len())
            .field("pending_expirations", &self.pending_expirations())
            .field("clock", &self.shared.clock)
            .finish()
    }
}
