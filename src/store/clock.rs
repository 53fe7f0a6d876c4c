use std::fmt::Debug;

use tokio::time::Instant;

/// Monotonic time source used to compute and check expiry deadlines.
pub trait Clock: Debug + Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Reads tokio's clock, so paused test time (`start_paused`) drives expiry.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
