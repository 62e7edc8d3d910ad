//! Metrics module
//!
//! Prometheus counters and histograms for uploads, storage calls and
//! request outcomes. Served by [`server::MetricsServer`].

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "cloudshelf_uploads_total",
        "Total number of uploads",
        &["status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "cloudshelf_upload_bytes_total",
        "Total bytes uploaded"
    ).unwrap();

    // Storage metrics
    pub static ref STORAGE_DURATION: HistogramVec = register_histogram_vec!(
        "cloudshelf_storage_duration_seconds",
        "Object store call duration in seconds",
        &["operation"],  // "put", "list" or "sign"
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    ).unwrap();

    // Request metrics
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "cloudshelf_requests_total",
        "HTTP requests by route and status code",
        &["route", "status"]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "cloudshelf_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&["success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure() {
    UPLOADS_TOTAL.with_label_values(&["failure"]).inc();
}

/// Record how long an object store call took
pub fn record_storage_duration(operation: &str, duration_secs: f64) {
    STORAGE_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

/// Record a finished request
pub fn record_request(route: &str, status: u16) {
    REQUESTS_TOTAL
        .with_label_values(&[route, &status.to_string()])
        .inc();
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
