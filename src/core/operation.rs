//! Cancellation and deadline handling for remote calls

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{AppError, Result};

/// Carried through every call that can block on the control plane.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    cancellation: CancellationToken,
    timeout: Option<Duration>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Drive one remote call, giving up on cancellation or when the
    /// per-call timeout elapses. The future is dropped in both cases.
    pub async fn run<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancellation.is_cancelled() {
            return Err(AppError::Cancelled { operation });
        }

        let bounded = async {
            match self.timeout {
                Some(timeout) => match tokio::time::timeout(timeout, call).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(operation, ?timeout, "Control plane call timed out");
                        Err(AppError::DeadlineExceeded { operation, timeout })
                    }
                },
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(AppError::Cancelled { operation }),
            result = bounded => result,
        }
    }
}
