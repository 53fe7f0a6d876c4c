//! In-process key/value cache with per-entry time-to-live.
//!
//! Expirations are tracked in an indexed min-heap and removed by a single
//! background task that always sleeps until the earliest pending deadline.
//!
//! ```no_run
//! use std::time::Duration;
//! use mapcache::Cache;
//!
//! # async fn demo() -> Result<(), mapcache::CacheError> {
//! let cache = Cache::new();
//! cache.set("session:42", "alice");
//! cache.set_expire("session:42", Duration::from_secs(30))?;
//! assert!(cache.get("session:42").is_some());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod metrics;
pub mod observability;
pub mod store;

pub use error::{CacheError, HeapError};
pub use store::Cache;
pub use store::clock::{Clock, TokioClock};
pub use store::expire::{ExpiryHeap, ExpiryRecord};
