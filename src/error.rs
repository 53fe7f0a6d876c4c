use thiserror::Error;

/// Errors returned by the public [`Cache`](crate::Cache) API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("no tokio runtime available to run the expiry scheduler")]
    NoRuntime,
}

/// Errors raised by [`ExpiryHeap`](crate::ExpiryHeap) operations.
///
/// None of these are reachable through the cache; seeing one there means the
/// map and heap bookkeeping have diverged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    #[error("expiry heap is empty")]
    Empty,

    #[error("key already has a pending expiration: {0}")]
    Duplicate(String),

    #[error("key has no pending expiration: {0}")]
    NotScheduled(String),
}
