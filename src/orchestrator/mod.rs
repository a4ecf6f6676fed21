//! Incremental search orchestration / 增量搜索调度
//!
//! One session = round 1 plus delayed backfill rounds against the same
//! query. Results are merged into a growing set and published as
//! `SearchEvent`s; stale sessions are fenced off by their epoch.

pub mod types;
mod session;
pub mod manager;

pub use types::*;
pub use manager::*;
