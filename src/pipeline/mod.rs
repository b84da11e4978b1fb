//! Staged pipeline simulator
//!
//! Every financial flow animates its confirmed operation through the same
//! machinery: a fixed stage plan, a pure state machine, and a ticker.

pub mod driver;
pub mod run;
pub mod stage;

pub use driver::PipelineHandle;
pub use run::{PipelineRun, RunEvent, RunPhase, RunSnapshot, RunStatus};
pub use stage::{Pacing, PipelineStage, StagePlan};
