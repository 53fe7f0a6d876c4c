use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const EXPIRED_KEYS_TOTAL: &str = "mapcache_expired_keys_total";
pub const PENDING_EXPIRATIONS: &str = "mapcache_pending_expirations";
pub const REARMS_TOTAL: &str = "mapcache_rearms_total";

/// Install a global Prometheus recorder. No HTTP listener is started; the
/// returned handle renders a snapshot on demand.
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            describe();
            Some(handle)
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to install prometheus metrics recorder");
            None
        }
    }
}

fn describe() {
    ::metrics::describe_counter!(EXPIRED_KEYS_TOTAL, "Keys removed by the expiry scheduler");
    ::metrics::describe_gauge!(PENDING_EXPIRATIONS, "Keys with a pending expiry");
    ::metrics::describe_counter!(REARMS_TOTAL, "Times the scheduler was woken for an earlier deadline");
}

pub(crate) fn record_sweep(expired: usize, pending: usize) {
    if expired > 0 {
        ::metrics::counter!(EXPIRED_KEYS_TOTAL).increment(expired as u64);
    }
    record_pending(pending);
}

pub(crate) fn record_pending(pending: usize) {
    ::metrics::gauge!(PENDING_EXPIRATIONS).set(pending as f64);
}

pub(crate) fn record_rearm() {
    ::metrics::counter!(REARMS_TOTAL).increment(1);
}
