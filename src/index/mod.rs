//! Index build orchestration and walk planning.

mod builder;
mod plan;

pub use builder::{BuildOutcome, IndexProgress, IndexStatus, Indexer, BUILD_IN_PROGRESS};
pub use plan::{build_plan, build_workers};
