use std::time::Duration;

use crate::domain::entities::{ResourceKind, ResourceRef};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Connection error during {operation}: {message}")]
    ConnectionError {
        operation: &'static str,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{kind} {target} not found")]
    NotFound {
        kind: ResourceKind,
        target: ResourceRef,
    },

    #[error("Scheduled job {target} already exists")]
    AlreadyExists { target: ResourceRef },

    #[error("Conflicting update to scheduled job {target}: {message}")]
    ConflictError { target: ResourceRef, message: String },

    #[error("Control plane rejected {operation} of {target} ({code} {reason}): {message}")]
    RemoteRejected {
        operation: &'static str,
        target: ResourceRef,
        code: u16,
        reason: String,
        message: String,
    },

    #[error("Invalid state for scheduled job {target}: {message}")]
    InvalidState { target: ResourceRef, message: String },

    #[error("Output stream of execution {execution} failed: {message}")]
    StreamError {
        execution: ResourceRef,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Validation error: {field}: {message}")]
    ValidationError { field: &'static str, message: String },

    #[error("{operation} exceeded its deadline of {timeout:?}")]
    DeadlineExceeded {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("{operation} was cancelled")]
    Cancelled { operation: &'static str },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    pub fn connection(operation: &'static str, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        AppError::ConnectionError {
            operation,
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn not_found(kind: ResourceKind, target: ResourceRef) -> Self {
        AppError::NotFound { kind, target }
    }

    pub fn invalid_state(target: ResourceRef, message: impl Into<String>) -> Self {
        AppError::InvalidState {
            target,
            message: message.into(),
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::ValidationError {
            field,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound { .. })
    }

    /// Only a lost optimistic-concurrency race is worth retrying, and only
    /// after a fresh read.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConflictError { .. })
    }

    /// Process exit code used by the command line front end.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::ValidationError { .. } | AppError::ConfigError(_) => 2,
            AppError::ConnectionError { .. } => 3,
            AppError::NotFound { .. } => 4,
            AppError::AlreadyExists { .. } => 5,
            AppError::ConflictError { .. } => 6,
            AppError::RemoteRejected { .. } => 7,
            AppError::InvalidState { .. } => 8,
            AppError::StreamError { .. } => 9,
            AppError::DeadlineExceeded { .. } => 10,
            AppError::Cancelled { .. } => 130,
        }
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::ConfigError(format!("YAML error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
