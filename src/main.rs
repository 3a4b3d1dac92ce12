//! findex - directory-tree file server with a concurrent search index
//!
//! Entry point for the findex server.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use findex::server::{init_tracing, App};
use findex::storage::{init_storage, Database};
use findex::{Config, Result};

/// findex - directory-tree file server with a concurrent search index
#[derive(Parser, Debug)]
#[command(name = "findex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory tree to serve and index
    #[arg(env = "FINDEX_ROOT", default_value = ".")]
    root: PathBuf,

    /// Host address to bind to
    #[arg(long, env = "FINDEX_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "FINDEX_PORT", default_value = "11073")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FINDEX_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "FINDEX_LOG_JSON")]
    log_json: bool,

    /// Index database file (default: a per-root file under the system temp
    /// directory)
    #[arg(long, env = "FINDEX_DATABASE")]
    database: Option<PathBuf>,

    /// Disable index-backed queries; search always walks the tree
    #[arg(long, env = "FINDEX_NO_INDEX")]
    no_index: bool,

    /// Rows per insert transaction during index builds
    #[arg(long, env = "FINDEX_INDEX_BATCH_SIZE", default_value = "100")]
    index_batch_size: usize,

    /// Rebuild the index in the background after startup
    #[arg(long, env = "FINDEX_REBUILD_INDEX_ON_STARTUP")]
    rebuild_index_on_startup: bool,

    /// Start the file watcher automatically
    #[arg(long, env = "FINDEX_USE_FILE_WATCHER")]
    use_file_watcher: bool,

    /// Forbid the file watcher entirely, including manual starts
    #[arg(long, env = "FINDEX_NO_WATCHER")]
    no_watcher: bool,

    /// Directory levels below the root to watch; -1 watches the whole tree
    #[arg(
        long,
        env = "FINDEX_WATCH_DEPTH",
        default_value = "1",
        allow_hyphen_values = true
    )]
    watch_depth: i64,

    /// Watcher quiet interval in milliseconds
    #[arg(long, env = "FINDEX_WATCH_DEBOUNCE_MS", default_value = "1000")]
    watch_debounce_ms: u64,

    /// Comma-separated ignore patterns for the watcher
    #[arg(
        long,
        env = "FINDEX_IGNORE_PATTERNS",
        default_value = "**/.git/**,**/node_modules/**,**/__pycache__/**"
    )]
    ignore_patterns: String,

    /// Comma-separated `user|password|permissions` rules; empty disables auth
    #[arg(long, env = "FINDEX_AUTH_RULES", default_value = "")]
    auth_rules: String,

    /// Per-file upload limit in bytes
    #[arg(long, env = "FINDEX_MAX_UPLOAD_BYTES", default_value = "1073741824")]
    max_upload_bytes: u64,

    /// Size cap for text previews in bytes
    #[arg(long, env = "FINDEX_MAX_CONTENT_BYTES", default_value = "10485760")]
    max_content_bytes: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json);

    tracing::info!("findex v{} starting...", env!("CARGO_PKG_VERSION"));

    let database_path = cli
        .database
        .unwrap_or_else(|| Config::default_database_path(&cli.root));
    let config = Config {
        root: cli.root,
        host: cli.host,
        port: cli.port,
        log_level: cli.log_level,
        database_path,
        index_enabled: !cli.no_index,
        index_batch_size: cli.index_batch_size,
        watcher_enabled: !cli.no_watcher,
        watch_depth: cli.watch_depth,
        watch_debounce_ms: cli.watch_debounce_ms,
        ignore_patterns: cli.ignore_patterns,
        auth_rules: cli.auth_rules,
        max_upload_bytes: cli.max_upload_bytes,
        max_content_bytes: cli.max_content_bytes,
    };

    tracing::debug!(?config, "Configuration loaded");
    config.validate()?;

    tracing::info!(
        "Serving {} on {}:{}, index at {}",
        config.root.display(),
        config.host,
        config.port,
        config.database_path.display()
    );

    let db = Database::open(&config.database_path)?;
    init_storage(&db)?;

    let rebuild_on_startup = cli.rebuild_index_on_startup && config.index_enabled;
    let start_watcher = cli.use_file_watcher && config.index_enabled;

    let app = App::new(config, db)?;

    if rebuild_on_startup {
        let indexer = Arc::clone(&app.state().indexer);
        tokio::spawn(async move {
            match indexer.build_async().await {
                Ok(outcome) => tracing::info!(
                    success = outcome.success,
                    message = %outcome.message,
                    "Startup index build finished"
                ),
                Err(e) => tracing::error!(error = %e, "Startup index build failed"),
            }
        });
    }

    if start_watcher {
        if let Err(e) = app.state().watcher.start() {
            tracing::error!(error = %e, "Failed to start file watcher");
        }
    }

    app.run().await
}
