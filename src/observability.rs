use std::net::SocketAddr;

// ── Store mutations ─────────────────────────────────────────────

/// Counter: store mutations. Labels: op, status.
pub const MUTATIONS_TOTAL: &str = "shearbook_mutations_total";

/// Counter: optimistic changes rolled back after a remote failure. Labels: op.
pub const REVERTS_TOTAL: &str = "shearbook_reverts_total";

/// Counter: mutations rejected because the id or slot had a call in flight.
pub const BUSY_REJECTIONS_TOTAL: &str = "shearbook_busy_rejections_total";

/// Counter: bookings refused by the conflict policy.
pub const DUPLICATE_SLOTS_TOTAL: &str = "shearbook_duplicate_slots_total";

/// Counter: remote records dropped on load because they failed validation.
pub const RECORDS_DROPPED_TOTAL: &str = "shearbook_records_dropped_total";

/// Histogram: remote call latency in seconds. Labels: op.
pub const REMOTE_DURATION_SECONDS: &str = "shearbook_remote_duration_seconds";

/// Gauge: appointments currently held by the store.
pub const APPOINTMENTS: &str = "shearbook_appointments";

// ── Journal ─────────────────────────────────────────────────────

/// Histogram: journal group-commit batch size (events per flush).
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "shearbook_journal_flush_batch_size";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
