use std::net::SocketAddr;

// ── Slot planning ────────────────────────────────────────────────

/// Counter: slot list computations served through the booking service.
pub const SLOT_QUERIES_TOTAL: &str = "slotwise_slot_queries_total";

/// Counter: slots offered across all computations.
pub const SLOTS_OFFERED_TOTAL: &str = "slotwise_slots_offered_total";

// ── Throttle ─────────────────────────────────────────────────────

/// Counter: attempts rejected by the throttle. Labels: key.
pub const THROTTLE_REJECTIONS_TOTAL: &str = "slotwise_throttle_rejections_total";

/// Counter: keys moved into the blocked state. Labels: key.
pub const THROTTLE_BLOCKS_TOTAL: &str = "slotwise_throttle_blocks_total";

/// Gauge: keys currently tracked by the throttle.
pub const THROTTLE_KEYS: &str = "slotwise_throttle_keys";

// ── Bookings ─────────────────────────────────────────────────────

/// Counter: booking submissions by outcome. Labels: status.
pub const BOOKINGS_TOTAL: &str = "slotwise_bookings_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
