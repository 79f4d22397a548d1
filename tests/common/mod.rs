#![allow(dead_code)]

// Test utilities and common setup
pub mod mocks;

pub use mocks::*;

use std::time::Duration;

use cronctl::{OperationContext, ScheduledJobSpec};

pub const NAMESPACE: &str = "batch";

pub fn nightly_report() -> ScheduledJobSpec {
    ScheduledJobSpec::new(NAMESPACE, "nightly-report", "busybox:1.36", "0 2 * * *")
}

pub fn test_context() -> OperationContext {
    OperationContext::new().with_timeout(Some(Duration::from_secs(5)))
}
