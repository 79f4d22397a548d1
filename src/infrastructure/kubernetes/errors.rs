//! Mapping of `kube::Error` onto the crate's error taxonomy

use std::fmt;

use kube::error::ErrorResponse;

use crate::domain::entities::{ResourceKind, ResourceRef};
use crate::error::AppError;

/// Control plane call being made when an error surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterOperation {
    Connect,
    Create,
    Get,
    Update,
    Delete,
    ListExecutions,
    OpenOutput,
    ReadOutput,
}

impl ClusterOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterOperation::Connect => "connect",
            ClusterOperation::Create => "create",
            ClusterOperation::Get => "get",
            ClusterOperation::Update => "update",
            ClusterOperation::Delete => "delete",
            ClusterOperation::ListExecutions => "list executions",
            ClusterOperation::OpenOutput => "open output",
            ClusterOperation::ReadOutput => "read output",
        }
    }

    fn is_streaming(&self) -> bool {
        matches!(self, ClusterOperation::OpenOutput | ClusterOperation::ReadOutput)
    }
}

impl fmt::Display for ClusterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a client error. Status responses keep their code and reason;
/// anything that never reached a status response is a connection problem.
pub fn classify(err: kube::Error, operation: ClusterOperation, target: &ResourceRef) -> AppError {
    match err {
        kube::Error::Api(response) => classify_status(response, operation, target),
        other if operation.is_streaming() => AppError::StreamError {
            execution: target.clone(),
            message: other.to_string(),
            source: Some(Box::new(other)),
        },
        other => AppError::connection(operation.as_str(), other),
    }
}

fn classify_status(
    response: ErrorResponse,
    operation: ClusterOperation,
    target: &ResourceRef,
) -> AppError {
    if operation.is_streaming() {
        return AppError::StreamError {
            execution: target.clone(),
            message: format!("{} ({} {})", response.message, response.code, response.reason),
            source: None,
        };
    }

    match (response.code, response.reason.as_str()) {
        // A create has no existing object to miss; a 404 there means the
        // namespace is absent, so the server's answer is passed on as is.
        (404, _) if operation != ClusterOperation::Create => {
            let kind = match operation {
                ClusterOperation::ListExecutions => ResourceKind::Execution,
                _ => ResourceKind::ScheduledJob,
            };
            AppError::not_found(kind, target.clone())
        }
        (409, "AlreadyExists") => AppError::AlreadyExists {
            target: target.clone(),
        },
        (409, _) if operation == ClusterOperation::Create => AppError::AlreadyExists {
            target: target.clone(),
        },
        (409, _) => AppError::ConflictError {
            target: target.clone(),
            message: response.message,
        },
        (code, reason) => AppError::RemoteRejected {
            operation: operation.as_str(),
            target: target.clone(),
            code,
            reason: reason.to_string(),
            message: response.message,
        },
    }
}
