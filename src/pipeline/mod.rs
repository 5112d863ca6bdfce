//! Pipeline orchestrator (§4.6): the streamed six-phase state machine that
//! turns a validated question into a `SQL_READY` frame, plus its supporting
//! cancellation, delimiter-correction, and wire-frame building blocks.

pub mod cancellation;
pub mod delimiter_corrector;
pub mod frame;
pub mod orchestrator;
pub mod state;

pub use cancellation::{CancellationToken, CancellationTracker};
pub use delimiter_corrector::correct_sql_delimiters;
pub use frame::Frame;
pub use orchestrator::{run, PipelineContext};
pub use state::{RunStatus, SystemState};
