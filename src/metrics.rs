//! Prometheus metrics for mxdird.
//!
//! Tracks transaction ingress, directory churn, snapshot refreshes, and
//! publication traffic. Exposed on `GET /metrics` alongside the API routes.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Appservice transactions received.
pub static TRANSACTIONS_RECEIVED: OnceLock<IntCounter> = OnceLock::new();

/// Events processed out of transaction batches.
pub static EVENTS_PROCESSED: OnceLock<IntCounter> = OnceLock::new();

/// Events whose processing failed (the batch continued regardless).
pub static EVENTS_FAILED: OnceLock<IntCounter> = OnceLock::new();

/// Directory store upserts (rooms listed or re-listed).
pub static DIRECTORY_UPSERTS: OnceLock<IntCounter> = OnceLock::new();

/// Directory store evictions (rooms turned non-viable).
pub static DIRECTORY_EVICTIONS: OnceLock<IntCounter> = OnceLock::new();

/// Successful snapshot refreshes.
pub static SNAPSHOT_REFRESHES: OnceLock<IntCounter> = OnceLock::new();

/// Failed snapshot refreshes (previous snapshot retained).
pub static SNAPSHOT_REFRESH_FAILURES: OnceLock<IntCounter> = OnceLock::new();

/// Rooms in the current snapshot.
pub static SNAPSHOT_ROOMS: OnceLock<IntGauge> = OnceLock::new();

/// Federation publicRooms requests served.
pub static PUBLIC_ROOMS_REQUESTS: OnceLock<IntCounter> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(TRANSACTIONS_RECEIVED, IntCounter::new("directory_transactions_received_total", "Appservice transactions received"));
    register!(EVENTS_PROCESSED, IntCounter::new("directory_events_processed_total", "Transaction events processed"));
    register!(EVENTS_FAILED, IntCounter::new("directory_events_failed_total", "Transaction events that failed processing"));
    register!(DIRECTORY_UPSERTS, IntCounter::new("directory_room_upserts_total", "Directory store upserts"));
    register!(DIRECTORY_EVICTIONS, IntCounter::new("directory_room_evictions_total", "Directory store evictions"));
    register!(SNAPSHOT_REFRESHES, IntCounter::new("directory_snapshot_refreshes_total", "Successful snapshot refreshes"));
    register!(SNAPSHOT_REFRESH_FAILURES, IntCounter::new("directory_snapshot_refresh_failures_total", "Failed snapshot refreshes"));
    register!(SNAPSHOT_ROOMS, IntGauge::new("directory_snapshot_rooms", "Rooms in the current snapshot"));
    register!(PUBLIC_ROOMS_REQUESTS, IntCounter::new("directory_public_rooms_requests_total", "Federation publicRooms requests"));
}

#[inline]
fn inc(metric: &OnceLock<IntCounter>) {
    if let Some(c) = metric.get() {
        c.inc();
    }
}

/// Record an appservice transaction arriving.
#[inline]
pub fn record_transaction() {
    inc(&TRANSACTIONS_RECEIVED);
}

/// Record one processed event, failed or not.
#[inline]
pub fn record_event(failed: bool) {
    inc(&EVENTS_PROCESSED);
    if failed {
        inc(&EVENTS_FAILED);
    }
}

/// Record a directory store upsert.
#[inline]
pub fn record_upsert() {
    inc(&DIRECTORY_UPSERTS);
}

/// Record a directory store eviction.
#[inline]
pub fn record_eviction() {
    inc(&DIRECTORY_EVICTIONS);
}

/// Record a successful snapshot swap of `rooms` entries.
#[inline]
pub fn record_snapshot(rooms: usize) {
    inc(&SNAPSHOT_REFRESHES);
    if let Some(g) = SNAPSHOT_ROOMS.get() {
        g.set(rooms as i64);
    }
}

/// Record a failed snapshot refresh.
#[inline]
pub fn record_snapshot_failure() {
    inc(&SNAPSHOT_REFRESH_FAILURES);
}

/// Record a served publication request.
#[inline]
pub fn record_public_rooms_request() {
    inc(&PUBLIC_ROOMS_REQUESTS);
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}
