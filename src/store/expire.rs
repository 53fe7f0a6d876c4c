use std::collections::HashMap;
use std::fmt;
use std::mem;

use tokio::time::Instant;

use crate::error::HeapError;

/// A pending expiration: `key` becomes invalid at `expire_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryRecord {
    pub key: String,
    pub expire_at: Instant,
    /// Insertion order, breaks ties between equal deadlines.
    seq: u64,
}

impl fmt::Display for ExpiryRecord {
    /// `key: expires in 1.5s`, or `key: expired` once the deadline has passed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let remaining = self.expire_at.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            write!(f, "{}: expired", self.key)
        } else {
            write!(f, "{}: expires in {:?}", self.key, remaining)
        }
    }
}

/// Array-backed binary min-heap of expiration records.
///
/// Each key has at most one record. `slots` maps a key to its current index
/// in `records`; every swap updates both entries so `fix` and `remove` can
/// reach a record in O(1) and rebalance in O(log n).
#[derive(Debug, Default)]
pub struct ExpiryHeap {
    records: Vec<ExpiryRecord>,
    slots: HashMap<String, usize>,
    next_seq: u64,
}

impl ExpiryHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Current array index of the record for `key`.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.slots.get(key).copied()
    }

    /// Pending deadline for `key`, if it has one.
    pub fn deadline(&self, key: &str) -> Option<Instant> {
        self.position(key).map(|i| self.records[i].expire_at)
    }

    /// Records in backing-array order (not sorted).
    pub fn iter(&self) -> impl Iterator<Item = &ExpiryRecord> {
        self.records.iter()
    }

    pub fn peek_min(&self) -> Option<&ExpiryRecord> {
        self.records.first()
    }

    /// Insert a record for a key that has none yet.
    pub fn push(&mut self, key: String, expire_at: Instant) -> Result<(), HeapError> {
        if self.slots.contains_key(&key) {
            return Err(HeapError::Duplicate(key));
        }
        self.insert(key, expire_at);
        Ok(())
    }

    /// Remove and return the earliest record.
    pub fn pop_min(&mut self) -> Result<ExpiryRecord, HeapError> {
        if self.records.is_empty() {
            return Err(HeapError::Empty);
        }
        Ok(self.remove_at(0))
    }

    /// Move an existing record to a new deadline. Returns the old deadline.
    pub fn fix(&mut self, key: &str, expire_at: Instant) -> Result<Instant, HeapError> {
        let index = self
            .position(key)
            .ok_or_else(|| HeapError::NotScheduled(key.to_owned()))?;
        let previous = mem::replace(&mut self.records[index].expire_at, expire_at);
        self.restore(index);
        Ok(previous)
    }

    /// Remove the record for `key`. Absent keys are a no-op.
    pub fn remove(&mut self, key: &str) -> Option<ExpiryRecord> {
        let index = self.position(key)?;
        Some(self.remove_at(index))
    }

    /// Push or fix, whichever applies. Returns the replaced deadline.
    pub fn schedule(&mut self, key: String, expire_at: Instant) -> Option<Instant> {
        match self.position(&key) {
            Some(index) => {
                let previous = mem::replace(&mut self.records[index].expire_at, expire_at);
                self.restore(index);
                Some(previous)
            }
            None => {
                self.insert(key, expire_at);
                None
            }
        }
    }

    /// Pop every record due at or before `now`, earliest first.
    pub fn drain_expired(&mut self, now: Instant) -> Vec<ExpiryRecord> {
        let mut expired = Vec::new();

        while let Some(record) = self.peek_min() {
            if record.expire_at > now {
                break;
            }
            match self.pop_min() {
                Ok(record) => expired.push(record),
                Err(_) => break,
            }
        }

        expired
    }

    fn insert(&mut self, key: String, expire_at: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let index = self.records.len();
        self.slots.insert(key.clone(), index);
        self.records.push(ExpiryRecord {
            key,
            expire_at,
            seq,
        });
        self.sift_up(index);
    }

    fn remove_at(&mut self, index: usize) -> ExpiryRecord {
        let record = self.records.swap_remove(index);
        self.slots.remove(&record.key);

        if index < self.records.len() {
            self.set_slot(index);
            self.restore(index);
        }

        record
    }

    fn less(&self, i: usize, j: usize) -> bool {
        let (a, b) = (&self.records[i], &self.records[j]);
        (a.expire_at, a.seq) < (b.expire_at, b.seq)
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.records.swap(i, j);
        self.set_slot(i);
        self.set_slot(j);
    }

    fn set_slot(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(self.records[index].key.as_str()) {
            *slot = index;
        }
    }

    fn restore(&mut self, index: usize) {
        if self.sift_down(index) == index {
            self.sift_up(index);
        }
    }

    fn sift_up(&mut self, mut index: usize) -> usize {
        while index > 0 {
            let parent = (index - 1) / 2;
            if !self.less(index, parent) {
                break;
            }
            self.swap(index, parent);
            index = parent;
        }
        index
    }

    fn sift_down(&mut self, mut index: usize) -> usize {
        let len = self.records.len();
        loop {
            let left = 2 * index + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.less(right, left) {
                right
            } else {
                left
            };
            if !self.less(child, index) {
                break;
            }
            self.swap(index, child);
            index = child;
        }
        index
    }
}
