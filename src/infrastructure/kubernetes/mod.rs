//! Kubernetes binding of the cluster client collaborator
//!
//! Scheduled jobs are `batch/v1` CronJobs, executions are the pods their
//! Jobs spawn, and execution output is the pod log.

pub mod credentials;
pub mod errors;
pub mod session;

use std::sync::Arc;

use tracing::debug;

use crate::config::{AppConfig, CredentialMode};
use crate::core::traits::{ClusterConnector, SharedSessionConnector};
use crate::error::Result;

pub use credentials::{CredentialSource, InClusterCredentials, InferredCredentials, KubeconfigFile};
pub use errors::{classify, ClusterOperation};
pub use session::{KubeClusterSession, KubeConnector};

/// Build the connector described by configuration.
pub fn connector_from_config(config: &AppConfig) -> Result<Arc<dyn ClusterConnector>> {
    let credentials: Arc<dyn CredentialSource> = match config.credentials {
        CredentialMode::Kubeconfig => Arc::new(KubeconfigFile::new(
            config.kubeconfig_path()?,
            config.context.clone(),
        )),
        CredentialMode::InCluster => Arc::new(InClusterCredentials),
        CredentialMode::Infer => Arc::new(InferredCredentials),
    };
    debug!(source = %credentials.describe(), "Using cluster credentials");

    let connector: Arc<dyn ClusterConnector> =
        Arc::new(KubeConnector::new(credentials).with_connectivity_check(config.verify_connectivity));

    if config.shared_session {
        Ok(Arc::new(SharedSessionConnector::new(connector)))
    } else {
        Ok(connector)
    }
}
