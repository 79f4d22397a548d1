//! Credential sources for reaching the API server

use std::path::PathBuf;

use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::debug;

use crate::error::{AppError, Result};

const OPERATION: &str = "load credentials";

/// Supplies the client configuration a session is built from
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Human readable origin of the credentials, for logs.
    fn describe(&self) -> String;

    async fn load(&self) -> Result<kube::Config>;
}

/// A kubeconfig file, optionally pinned to one context
#[derive(Debug, Clone)]
pub struct KubeconfigFile {
    path: PathBuf,
    context: Option<String>,
}

impl KubeconfigFile {
    pub fn new(path: impl Into<PathBuf>, context: Option<String>) -> Self {
        Self {
            path: path.into(),
            context,
        }
    }
}

#[async_trait]
impl CredentialSource for KubeconfigFile {
    fn describe(&self) -> String {
        match &self.context {
            Some(context) => format!("kubeconfig {} (context {})", self.path.display(), context),
            None => format!("kubeconfig {}", self.path.display()),
        }
    }

    async fn load(&self) -> Result<kube::Config> {
        let kubeconfig = Kubeconfig::read_from(&self.path).map_err(|e| AppError::ConnectionError {
            operation: OPERATION,
            message: format!("cannot read kubeconfig {}: {}", self.path.display(), e),
            source: Some(Box::new(e)),
        })?;

        let options = KubeConfigOptions {
            context: self.context.clone(),
            ..Default::default()
        };

        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|e| AppError::connection(OPERATION, e))?;

        debug!(cluster_url = %config.cluster_url, "Loaded kubeconfig credentials");
        Ok(config)
    }
}

/// Service account credentials mounted into the pod we run in
#[derive(Debug, Clone, Copy, Default)]
pub struct InClusterCredentials;

#[async_trait]
impl CredentialSource for InClusterCredentials {
    fn describe(&self) -> String {
        "in-cluster service account".to_string()
    }

    async fn load(&self) -> Result<kube::Config> {
        kube::Config::incluster().map_err(|e| AppError::connection(OPERATION, e))
    }
}

/// The client library's own inference chain: `KUBECONFIG`, the default
/// kubeconfig, then in-cluster
#[derive(Debug, Clone, Copy, Default)]
pub struct InferredCredentials;

#[async_trait]
impl CredentialSource for InferredCredentials {
    fn describe(&self) -> String {
        "inferred".to_string()
    }

    async fn load(&self) -> Result<kube::Config> {
        kube::Config::infer()
            .await
            .map_err(|e| AppError::connection(OPERATION, e))
    }
}
