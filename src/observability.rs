use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: booking operations executed. Labels: op.
pub const OPS_TOTAL: &str = "roombook_ops_total";

/// Counter: booking attempts rejected because of an overlap.
pub const CONFLICTS_TOTAL: &str = "roombook_booking_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: number of active locations (loaded engines).
pub const LOCATIONS_ACTIVE: &str = "roombook_locations_active";

/// Counter: tentative bookings lapsed by the reaper.
pub const LAPSED_TOTAL: &str = "roombook_tentative_lapsed_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roombook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roombook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init_metrics(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Install the default fmt tracing subscriber. For embedders and binaries
/// that don't bring their own.
pub fn init_logging() {
    tracing_subscriber::fmt::init();
}
