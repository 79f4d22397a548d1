//! Application layer: the scheduled-job operations callers invoke

pub mod services;

pub use services::{ExecutionLogRetriever, ScheduledJobManager};
