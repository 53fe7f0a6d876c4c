use std::time::Duration;

use bytes::Bytes;

use super::Cache;
use crate::error::CacheError;

impl Cache {
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.shared.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.shared.entries.contains_key(key)
    }

    /// Insert or overwrite a value. An existing TTL for the key is kept.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.shared.entries.insert(key.into(), value.into());
    }

    /// Insert or overwrite a value and (re)schedule its expiry in one step.
    pub fn set_with_expiry(&self, key: impl Into<String>, value: impl Into<Bytes>, ttl: Duration) {
        let key = key.into();
        let mut schedule = self.shared.schedule.lock();
        let expire_at = self.shared.deadline_after(ttl);

        self.shared.entries.insert(key.clone(), value.into());
        schedule.heap.schedule(key, expire_at);
        self.shared.rearm(&mut schedule);
        crate::metrics::record_pending(schedule.heap.len());
    }

    /// Expire `key` after `ttl`, replacing any deadline it already had.
    pub fn set_expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut schedule = self.shared.schedule.lock();
        if !self.shared.entries.contains_key(key) {
            return Err(CacheError::KeyNotFound(key.to_owned()));
        }

        let expire_at = self.shared.deadline_after(ttl);
        let previous = schedule.heap.schedule(key.to_owned(), expire_at);
        tracing::trace!(key, ?ttl, replaced = previous.is_some(), "expiry scheduled");

        self.shared.rearm(&mut schedule);
        crate::metrics::record_pending(schedule.heap.len());
        Ok(())
    }

    /// Remove `key` and any pending expiry. Returns whether the key existed.
    pub fn del(&self, key: &str) -> bool {
        let mut schedule = self.shared.schedule.lock();
        let removed = self.shared.entries.remove(key).is_some();
        if schedule.heap.remove(key).is_some() {
            crate::metrics::record_pending(schedule.heap.len());
        }
        removed
    }

    /// Drop the TTL from `key`, so it never expires. Returns whether it had one.
    pub fn persist(&self, key: &str) -> bool {
        let mut schedule = self.shared.schedule.lock();
        let removed = schedule.heap.remove(key).is_some();
        if removed {
            crate::metrics::record_pending(schedule.heap.len());
        }
        removed
    }

    /// Time left before `key` expires. `None` if the key is absent or has no TTL.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let deadline = self.shared.schedule.lock().heap.deadline(key)?;
        Some(deadline.saturating_duration_since(self.shared.clock.now()))
    }

    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
    }

    /// Number of keys with a pending expiry.
    pub fn pending_expirations(&self) -> usize {
        self.shared.schedule.lock().heap.len()
    }
}
