//! Main application server.
//!
//! Wires configuration, storage, indexer, and watcher into shared state,
//! assembles the router, and drives the listen/shutdown lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{middleware, Router};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{require_auth, AuthConfig};
use super::metrics::{init_metrics, track_requests};
use super::{files, rest};
use crate::config::Config;
use crate::index::Indexer;
use crate::storage::Database;
use crate::watcher::FileWatcher;
use crate::Result;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub indexer: Arc<Indexer>,
    pub watcher: Arc<FileWatcher>,
}

impl AppState {
    /// Wire up the services for a validated configuration.
    #[must_use]
    pub fn new(config: Config, db: Database) -> Self {
        let config = Arc::new(config);
        let indexer = Arc::new(Indexer::new(
            db.clone(),
            config.root.clone(),
            config.index_batch_size,
        ));
        let watcher = Arc::new(FileWatcher::new(
            db.clone(),
            config.root.clone(),
            config.watch_options(),
        ));
        Self {
            config,
            db,
            indexer,
            watcher,
        }
    }
}

/// Application server.
pub struct App {
    state: AppState,
    auth: Arc<AuthConfig>,
}

impl App {
    /// Create a new application over an initialized database.
    ///
    /// # Errors
    ///
    /// Returns an error when the configured auth rules are malformed.
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let auth = Arc::new(AuthConfig::new(config.parsed_auth_rules()?));
        Ok(Self {
            state: AppState::new(config, db),
            auth,
        })
    }

    /// Shared state, for startup tasks that outlive the request cycle.
    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all endpoints.
    fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        // Uploads carry multipart framing on top of the file payload.
        let body_limit = usize::try_from(self.state.config.max_upload_bytes)
            .unwrap_or(usize::MAX)
            .saturating_add(1024 * 1024);

        let api = rest::api_router()
            .merge(files::router())
            .layer(middleware::from_fn_with_state(
                Arc::clone(&self.auth),
                require_auth,
            ))
            .layer(DefaultBodyLimit::max(body_limit));

        rest::public_router()
            .merge(api)
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|request: &axum::http::Request<_>| {
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            uri = %request.uri(),
                        )
                    })
                    .on_response(
                        |response: &axum::response::Response,
                         _latency: std::time::Duration,
                         _span: &tracing::Span| {
                            tracing::info!(
                                status = %response.status(),
                                "Request completed"
                            );
                        },
                    ),
            )
            .layer(middleware::from_fn(track_requests))
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Run the server until a shutdown signal arrives, then stop the
    /// watcher and drain.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, the socket cannot be
    /// bound, or the server fails while running.
    pub async fn run(self) -> Result<()> {
        init_metrics();

        let addr: SocketAddr = self
            .state
            .config
            .server_addr()
            .parse()
            .map_err(|e| crate::Error::config(format!("invalid address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            crate::error::ServerError::BindFailed {
                address: addr.to_string(),
                reason: e.to_string(),
            }
        })?;

        tracing::info!(
            %addr,
            root = %self.state.config.root.display(),
            "Server listening"
        );

        let watcher = Arc::clone(&self.state.watcher);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| crate::error::ServerError::Request(e.to_string()))?;

        watcher.stop().await;
        tracing::info!("Server shut down gracefully");
        Ok(())
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}

/// Build an app state over a temp-root config and an in-memory store.
#[cfg(test)]
pub(crate) fn test_state_with(config: Config) -> AppState {
    let db = Database::open_in_memory().unwrap();
    crate::storage::init_storage(&db).unwrap();
    AppState::new(config, db)
}

#[cfg(test)]
pub(crate) fn test_state(root: &std::path::Path) -> AppState {
    test_state_with(Config {
        root: root.to_path_buf(),
        ..Config::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_app(tmp: &TempDir, auth_rules: &str) -> App {
        let config = Config {
            root: tmp.path().to_path_buf(),
            auth_rules: auth_rules.to_string(),
            ..Config::default()
        };
        let db = Database::open_in_memory().unwrap();
        crate::storage::init_storage(&db).unwrap();
        App::new(config, db).unwrap()
    }

    #[test]
    fn test_malformed_auth_rules_fail_construction() {
        let db = Database::open_in_memory().unwrap();
        let config = Config {
            auth_rules: "broken-rule".to_string(),
            ..Config::default()
        };
        assert!(App::new(config, db).is_err());
    }

    #[tokio::test]
    async fn test_health_is_reachable_through_full_stack() {
        let tmp = TempDir::new().unwrap();
        let app = test_app(&tmp, "");
        let response = app
            .router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_auth_guards_api_but_not_health() {
        let tmp = TempDir::new().unwrap();
        let app = test_app(&tmp, "admin|secret|rw");
        let router = app.router();

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/files")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
