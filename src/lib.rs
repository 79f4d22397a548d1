//! cronctl - lifecycle management for Kubernetes CronJobs
//!
//! Create, update and delete schedule-backed jobs and fetch the output of
//! their most recent run. All state lives in the cluster; this library only
//! builds desired-state objects, talks to the control plane through the
//! [`core::traits::ClusterSession`] seam and classifies what comes back.

pub mod application;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod infrastructure;

// Re-export commonly used types
pub use crate::application::{ExecutionLogRetriever, ScheduledJobManager};
pub use crate::config::AppConfig;
pub use crate::core::{ClusterConnector, ClusterSession, OperationContext};
pub use crate::domain::{ExecutionSelection, ResourceRef, ScheduledJobSpec};
pub use crate::error::{AppError, Result};
