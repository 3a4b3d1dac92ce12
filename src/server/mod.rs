//! HTTP server: file API, query router, index and watcher control.
//!
//! This module provides:
//! - the axum application with auth, CORS, tracing, and metrics layers
//! - REST endpoints for search, images, index, and watcher control
//! - file management endpoints (list, download, preview, upload, rename)
//! - health and Prometheus metrics endpoints

pub mod app;
pub mod auth;
pub mod files;
pub mod metrics;
pub mod observability;
pub mod rest;

pub use app::{App, AppState};
pub use auth::AuthConfig;
pub use observability::init_tracing;
pub use rest::ApiError;
