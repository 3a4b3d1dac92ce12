//! Prometheus metrics definitions.
//!
//! Counters are incremented where the outcome is known (request middleware,
//! query router, build trigger). Gauges mirroring index and watcher state
//! are set at scrape time in the `/metrics` handler, so the core modules
//! never touch the registry.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};

/// Request counter.
pub static REQUEST_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "findex_requests_total",
        "Total number of HTTP requests",
        &["endpoint", "method", "status"]
    )
    .unwrap()
});

/// Request latency histogram.
pub static REQUEST_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "findex_request_duration_seconds",
        "Request latency in seconds",
        &["endpoint", "method"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .unwrap()
});

/// Search/image queries by serving source ("index" or "live").
pub static SEARCH_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "findex_searches_total",
        "Total number of search and image queries",
        &["source"]
    )
    .unwrap()
});

/// Index builds by outcome ("completed", "failed", "rejected").
pub static INDEX_BUILDS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "findex_index_builds_total",
        "Total number of index build attempts",
        &["outcome"]
    )
    .unwrap()
});

/// Rows currently in the file index.
pub static INDEXED_FILES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("findex_indexed_files", "Number of files in the index").unwrap()
});

/// Directories currently under an OS watch.
pub static WATCHED_DIRECTORIES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "findex_watched_directories",
        "Number of directories currently watched"
    )
    .unwrap()
});

/// Debounced watcher events handled since start.
pub static WATCHER_EVENTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "findex_watcher_events_handled",
        "Debounced filesystem events handled since start"
    )
    .unwrap()
});

/// Initialize all metrics (call once at startup).
pub fn init_metrics() {
    // Access lazy statics to register them
    let _ = &*REQUEST_COUNT;
    let _ = &*REQUEST_LATENCY;
    let _ = &*SEARCH_COUNT;
    let _ = &*INDEX_BUILDS;
    let _ = &*INDEXED_FILES;
    let _ = &*WATCHED_DIRECTORIES;
    let _ = &*WATCHER_EVENTS;

    tracing::debug!("Prometheus metrics initialized");
}

/// Middleware recording per-request count and latency.
pub async fn track_requests(req: Request, next: Next) -> Response {
    let endpoint = req.uri().path().to_string();
    let method = req.method().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    REQUEST_COUNT
        .with_label_values(&[&endpoint, &method, &status])
        .inc();
    REQUEST_LATENCY
        .with_label_values(&[&endpoint, &method])
        .observe(start.elapsed().as_secs_f64());

    response
}
