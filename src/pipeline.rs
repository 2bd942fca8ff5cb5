//! Commit message pipeline: bounded per-file analysis, then synthesis.

pub mod aggregate;
pub mod controller;
pub mod scheduler;

pub use controller::{
    PipelineController, PipelineError, PipelineOptions, PipelineOutcome, PipelinePhase, Progress,
};
pub use scheduler::{SchedulerState, UnitStatus};
