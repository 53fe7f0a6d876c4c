use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use super::{Schedule, Shared};

/// Expiry loop: sleep until the earliest deadline, remove what is due, repeat.
///
/// Idle (nothing pending) waits only for a wake-up. Armed waits for the
/// deadline or a wake-up, whichever comes first; a wake-up means a caller
/// scheduled something earlier and the loop re-arms.
pub(super) async fn run(shared: Arc<Shared>, shutdown: CancellationToken) {
    tracing::debug!("expiry scheduler started");

    loop {
        match shared.arm() {
            None => {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = shared.wake.notified() => {}
                }
            }
            Some(deadline) => {
                let delay = deadline.saturating_duration_since(shared.clock.now());
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = shared.wake.notified() => {}
                    _ = time::sleep(delay) => {
                        shared.expire_due();
                    }
                }
            }
        }
    }

    tracing::debug!("expiry scheduler stopped");
}

impl Shared {
    /// Record the heap minimum as the armed deadline and return it.
    fn arm(&self) -> Option<Instant> {
        let mut schedule = self.schedule.lock();
        let next = schedule.heap.peek_min().map(|record| record.expire_at);
        schedule.armed = next;
        next
    }

    /// Wake the scheduler if the heap minimum is earlier than what it is
    /// armed for. Callers hold the schedule lock across the heap mutation and
    /// this call, so the next firing sees the mutation.
    pub(super) fn rearm(&self, schedule: &mut Schedule) {
        let Some(next) = schedule.heap.peek_min().map(|record| record.expire_at) else {
            return;
        };
        if schedule.armed.is_none_or(|armed| next < armed) {
            tracing::trace!(?next, previous = ?schedule.armed, "rearming expiry scheduler");
            schedule.armed = Some(next);
            crate::metrics::record_rearm();
            self.wake.notify_one();
        }
    }

    pub(super) fn deadline_after(&self, ttl: Duration) -> Instant {
        let now = self.clock.now();
        // Far enough out to never fire, without overflowing the clock.
        now.checked_add(ttl)
            .unwrap_or_else(|| now + Duration::from_secs(100 * 365 * 24 * 60 * 60))
    }

    /// Remove every entry whose deadline has passed. Returns how many records
    /// were drained from the heap.
    pub(super) fn expire_due(&self) -> usize {
        let mut schedule = self.schedule.lock();
        let expired = schedule.heap.drain_expired(self.clock.now());

        for record in &expired {
            if self.entries.remove(&record.key).is_none() {
                tracing::trace!(key = %record.key, "expired key was already removed");
            }
        }

        schedule.armed = schedule.heap.peek_min().map(|record| record.expire_at);
        let pending = schedule.heap.len();
        drop(schedule);

        crate::metrics::record_sweep(expired.len(), pending);
        if !expired.is_empty() {
            tracing::debug!(evicted = expired.len(), pending, "expired keys evicted");
        }

        expired.len()
    }
}
