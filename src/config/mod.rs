//! Configuration management for findex.
//!
//! Values come from command-line arguments, each backed by a `FINDEX_*`
//! environment variable (see `main.rs`), with defaults matching a plain
//! `findex <root>` invocation.

mod settings;

pub use settings::{AuthRule, Config};
