//! Domain layer: scheduled jobs, executions and their addressing

pub mod entities;

pub use entities::{
    ExecutionRef, ExecutionSelection, ResourceKind, ResourceRef, RestartPolicy,
    ScheduledJobSpec, ScheduledJobSummary,
};
