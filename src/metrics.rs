//! Prometheus metrics for GcsUpload
//!
//! Defines metrics for:
//! - Provider operation counts by operation and status
//! - Provider operation duration
//! - Uploaded bytes

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use std::time::Instant;

lazy_static! {
    /// Registry for all metrics
    pub static ref REGISTRY: Registry = Registry::new();

    /// Provider operation counter by operation and status
    pub static ref STORAGE_OPERATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("gcsupload_storage_operations_total", "Total storage operations"),
        &["operation", "status"]
    )
    .expect("Failed to create STORAGE_OPERATIONS metric");

    /// Provider operation duration histogram by operation
    pub static ref STORAGE_OPERATION_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "gcsupload_storage_operation_duration_seconds",
            "Storage operation duration in seconds"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["operation"]
    )
    .expect("Failed to create STORAGE_OPERATION_DURATION metric");

    /// Bytes written by buffered uploads
    pub static ref UPLOADED_BYTES: IntCounter = IntCounter::new(
        "gcsupload_uploaded_bytes_total",
        "Total bytes written by buffered uploads"
    )
    .expect("Failed to create UPLOADED_BYTES metric");
}

/// Initialize metrics and register with the global registry
pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(STORAGE_OPERATIONS.clone()))?;
    REGISTRY.register(Box::new(STORAGE_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(UPLOADED_BYTES.clone()))?;
    Ok(())
}

/// Record the outcome and duration of one provider operation
pub fn observe<T, E>(operation: &str, started: Instant, result: &Result<T, E>) {
    let status = if result.is_ok() { "ok" } else { "error" };
    STORAGE_OPERATIONS
        .with_label_values(&[operation, status])
        .inc();
    STORAGE_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(started.elapsed().as_secs_f64());
}
