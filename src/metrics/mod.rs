//! Metrics module
//!
//! Prometheus counters for the upload pipeline, registered in the default
//! registry.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Histogram,
};

lazy_static! {
    // File metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "piwigo_uploads_total",
        "Files handled by outcome",
        &["status"]  // "uploaded", "skipped" or "failed"
    ).unwrap();

    pub static ref UPLOAD_FAILURES: CounterVec = register_counter_vec!(
        "piwigo_upload_failures_total",
        "Failed uploads by the stage they failed in",
        &["stage"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "piwigo_upload_bytes_total",
        "Bytes of files uploaded and finalized"
    ).unwrap();

    pub static ref UPLOAD_DURATION: Histogram = register_histogram!(
        "piwigo_upload_duration_seconds",
        "Time from first chunk to finalize, in seconds",
        vec![0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
    ).unwrap();

    // Chunk metrics
    pub static ref CHUNKS_TOTAL: CounterVec = register_counter_vec!(
        "piwigo_chunks_total",
        "Chunk transmissions by status",
        &["status"]
    ).unwrap();

    pub static ref CHUNK_BYTES_TOTAL: Counter = register_counter!(
        "piwigo_chunk_bytes_total",
        "Raw bytes sent in accepted chunks"
    ).unwrap();

    // Existence metrics
    pub static ref EXISTENCE_QUERIES: Counter = register_counter!(
        "piwigo_existence_queries_total",
        "Existence check requests"
    ).unwrap();

    pub static ref EXISTENCE_HASHES: Counter = register_counter!(
        "piwigo_existence_hashes_total",
        "Hashes looked up by existence checks"
    ).unwrap();
}

/// Record a finalized upload
pub fn record_upload_success(bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&["uploaded"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a file skipped because its content is already present
pub fn record_upload_skipped() {
    UPLOADS_TOTAL.with_label_values(&["skipped"]).inc();
}

/// Record a failed upload and the stage it failed in
pub fn record_upload_failure(stage: &str) {
    UPLOADS_TOTAL.with_label_values(&["failed"]).inc();
    UPLOAD_FAILURES.with_label_values(&[stage]).inc();
}

/// Record upload duration
pub fn record_upload_duration(duration_secs: f64) {
    UPLOAD_DURATION.observe(duration_secs);
}

/// Record an accepted chunk of `bytes` raw bytes
pub fn record_chunk_sent(bytes: u64) {
    CHUNKS_TOTAL.with_label_values(&["accepted"]).inc();
    CHUNK_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a chunk the server refused
pub fn record_chunk_rejected() {
    CHUNKS_TOTAL.with_label_values(&["rejected"]).inc();
}

/// Record one existence query covering `hashes` hashes
pub fn record_existence_query(hashes: usize) {
    EXISTENCE_QUERIES.inc();
    EXISTENCE_HASHES.inc_by(hashes as f64);
}
