//! Async job runner (§4.10): background per-DB tasks attached to
//! administrative actions on a `SqlDb` or `Workspace`. Each job is spawned
//! detached (`tokio::spawn`), talks to the caller only through persisted
//! status fields and the [`crate::progress::ProgressTracker`], and reports
//! final outcome by updating those same fields — never by returning a value
//! to anyone, since nothing is still listening by the time it finishes.

pub mod comments;
pub mod db_elements;
pub mod documents;

/// Table/column comment jobs process table IDs in groups of this size
/// (§4.10 SUPPLEMENT), logging one progress line per table.
pub const COMMENT_CHUNK_SIZE: usize = 10;
