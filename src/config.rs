use clap::Parser;

/// CLI configuration for the cache soak run.
#[derive(Debug, Clone, Parser)]
#[command(name = "mapcache", about = "Concurrent set/expire/delete soak against an in-process TTL cache")]
pub struct Config {
    /// Number of concurrent writer tasks
    #[arg(long, env = "MAPCACHE_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Total keys written across all workers
    #[arg(long, env = "MAPCACHE_KEYS", default_value_t = 10_000)]
    pub keys: usize,

    /// Base TTL in milliseconds; keys get one to four times this
    #[arg(long, env = "MAPCACHE_TTL_MS", default_value_t = 200)]
    pub ttl_ms: u64,

    /// Extra wait after the longest TTL before verifying
    #[arg(long, env = "MAPCACHE_SETTLE_MS", default_value_t = 250)]
    pub settle_ms: u64,

    /// Print a Prometheus snapshot of the cache metrics when done
    #[arg(long, env = "MAPCACHE_PRINT_METRICS")]
    pub print_metrics: bool,
}

impl Config {
    pub fn from_args() -> Self {
        Self::parse()
    }
}
