//! Configuration settings and validation.

use crate::watcher::WatchOptions;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One `user|password|permissions` authentication rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRule {
    pub user: String,
    pub password: String,
    pub can_write: bool,
}

impl AuthRule {
    fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(3, '|');
        let (Some(user), Some(password), Some(perms)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::config(format!(
                "invalid auth rule '{raw}', expected user|password|permissions"
            )));
        };
        if user.is_empty() || password.is_empty() {
            return Err(Error::config(format!(
                "invalid auth rule '{raw}', user and password must be non-empty"
            )));
        }
        let can_write = match perms {
            "r" => false,
            "rw" => true,
            other => {
                return Err(Error::config(format!(
                    "invalid permissions '{other}' in auth rule, must be r or rw"
                )))
            }
        };
        Ok(Self {
            user: user.to_string(),
            password: password.to_string(),
            can_write,
        })
    }
}

/// Main configuration for the findex server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory tree being served and indexed.
    pub root: PathBuf,

    /// Host address to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Path of the `SQLite` index database.
    pub database_path: PathBuf,

    /// Whether index-backed queries are allowed at all.
    pub index_enabled: bool,

    /// Rows per insert transaction during an index build.
    pub index_batch_size: usize,

    /// Whether the file watcher may run.
    pub watcher_enabled: bool,

    /// Directory levels below the root that get watches; -1 is unbounded.
    pub watch_depth: i64,

    /// Quiet interval for watcher debouncing, in milliseconds.
    pub watch_debounce_ms: u64,

    /// Comma-separated ignore patterns for the watcher.
    pub ignore_patterns: String,

    /// Comma-separated `user|password|permissions` rules; empty disables auth.
    pub auth_rules: String,

    /// Per-file upload limit in bytes.
    pub max_upload_bytes: u64,

    /// Size cap for text previews served by the content endpoint, in bytes.
    pub max_content_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        let root = PathBuf::from(".");
        let database_path = Self::default_database_path(&root);
        Self {
            root,
            host: "0.0.0.0".to_string(),
            port: 11073,
            log_level: "info".to_string(),
            database_path,
            index_enabled: true,
            index_batch_size: 100,
            watcher_enabled: true,
            watch_depth: 1,
            watch_debounce_ms: 1000,
            ignore_patterns: "**/.git/**,**/node_modules/**,**/__pycache__/**".to_string(),
            auth_rules: String::new(),
            max_upload_bytes: 1024 * 1024 * 1024,
            max_content_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Database file for a given root, under the system temp directory.
    /// Hashing the root path keeps distinct roots on distinct index files.
    #[must_use]
    pub fn default_database_path(root: &Path) -> PathBuf {
        let digest = blake3::hash(root.to_string_lossy().as_bytes()).to_hex();
        std::env::temp_dir().join(format!("findex-{}.db", &digest.as_str()[..16]))
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::config("port cannot be 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.host.is_empty() {
            return Err(Error::config("host cannot be empty"));
        }

        if !self.root.is_dir() {
            return Err(Error::config(format!(
                "root '{}' is not a directory",
                self.root.display()
            )));
        }

        if self.index_batch_size == 0 {
            return Err(Error::config("index_batch_size cannot be 0"));
        }

        if self.watch_depth < -1 {
            return Err(Error::config(
                "watch_depth must be -1 (unbounded) or non-negative",
            ));
        }

        self.parsed_auth_rules()?;

        Ok(())
    }

    /// Parse the auth rule string; an empty string yields no rules.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed rule.
    pub fn parsed_auth_rules(&self) -> Result<Vec<AuthRule>> {
        self.auth_rules
            .split(',')
            .map(str::trim)
            .filter(|rule| !rule.is_empty())
            .map(AuthRule::parse)
            .collect()
    }

    /// Parse the ignore pattern string into individual patterns.
    #[must_use]
    pub fn ignore_pattern_list(&self) -> Vec<String> {
        self.ignore_patterns
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Watcher tunables derived from this configuration.
    #[must_use]
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            enabled: self.watcher_enabled,
            depth: self.watch_depth,
            debounce: Duration::from_millis(self.watch_debounce_ms),
            ignore_patterns: self.ignore_pattern_list(),
        }
    }

    /// Get the server address as a string.
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
