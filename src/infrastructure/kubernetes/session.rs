//! Kubernetes session implementation
//!
//! Wraps a `kube::Client` and exposes the cluster session operations against
//! namespaced `CronJob` and `Pod` APIs.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{AsyncReadExt, StreamExt, TryStreamExt};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{DeleteParams, ListParams, LogParams, PostParams},
    Api, Client,
};
use tracing::{debug, warn};

use super::credentials::CredentialSource;
use super::errors::{classify, ClusterOperation};
use crate::core::traits::{ClusterConnector, ClusterSession, OutputStream};
use crate::domain::entities::{ExecutionRef, ResourceRef, EXECUTION_LABEL};
use crate::error::{AppError, Result};

const OUTPUT_CHUNK_SIZE: usize = 16 * 1024;

/// Builds a fresh client from the injected credentials on every connect
pub struct KubeConnector {
    credentials: Arc<dyn CredentialSource>,
    verify_connectivity: bool,
}

impl KubeConnector {
    pub fn new(credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            credentials,
            verify_connectivity: false,
        }
    }

    /// Probe the API server version before handing out a session. Client
    /// construction alone never touches the network.
    pub fn with_connectivity_check(mut self, enabled: bool) -> Self {
        self.verify_connectivity = enabled;
        self
    }
}

#[async_trait]
impl ClusterConnector for KubeConnector {
    async fn connect(&self) -> Result<Arc<dyn ClusterSession>> {
        let config = self.credentials.load().await?;
        let client = Client::try_from(config)
            .map_err(|e| AppError::connection(ClusterOperation::Connect.as_str(), e))?;

        if self.verify_connectivity {
            match client.apiserver_version().await {
                Ok(version) => {
                    debug!(
                        "Kubernetes cluster is accessible, version: {}",
                        version.git_version
                    );
                }
                Err(e) => {
                    warn!("Kubernetes cluster connectivity check failed: {}", e);
                    return Err(AppError::connection(ClusterOperation::Connect.as_str(), e));
                }
            }
        }

        Ok(Arc::new(KubeClusterSession::new(client)))
    }
}

/// Live session against one API server
#[derive(Clone)]
pub struct KubeClusterSession {
    client: Client,
}

impl KubeClusterSession {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn cron_jobs(&self, namespace: &str) -> Api<CronJob> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn object_name(namespace: &str, cron_job: &CronJob) -> Result<ResourceRef> {
    match cron_job.metadata.name.as_deref() {
        Some(name) if !name.is_empty() => Ok(ResourceRef::new(namespace, name)),
        _ => Err(AppError::validation("name", "scheduled job object has no name")),
    }
}

/// Errors from a listing name the job the selector points at, not the
/// selector text.
fn selector_target(namespace: &str, selector: &str) -> ResourceRef {
    let name = selector
        .strip_prefix(EXECUTION_LABEL)
        .and_then(|rest| rest.strip_prefix('='))
        .unwrap_or(selector);
    ResourceRef::new(namespace, name)
}

#[async_trait]
impl ClusterSession for KubeClusterSession {
    async fn create_scheduled_job(&self, namespace: &str, cron_job: &CronJob) -> Result<CronJob> {
        let target = object_name(namespace, cron_job)?;
        debug!(%target, "Submitting CronJob");
        self.cron_jobs(namespace)
            .create(&PostParams::default(), cron_job)
            .await
            .map_err(|e| classify(e, ClusterOperation::Create, &target))
    }

    async fn get_scheduled_job(&self, namespace: &str, name: &str) -> Result<CronJob> {
        let target = ResourceRef::new(namespace, name);
        self.cron_jobs(namespace)
            .get(name)
            .await
            .map_err(|e| classify(e, ClusterOperation::Get, &target))
    }

    async fn update_scheduled_job(&self, namespace: &str, cron_job: &CronJob) -> Result<CronJob> {
        let target = object_name(namespace, cron_job)?;
        debug!(
            %target,
            resource_version = ?cron_job.metadata.resource_version,
            "Replacing CronJob"
        );
        self.cron_jobs(namespace)
            .replace(&target.name, &PostParams::default(), cron_job)
            .await
            .map_err(|e| classify(e, ClusterOperation::Update, &target))
    }

    async fn delete_scheduled_job(&self, namespace: &str, name: &str) -> Result<()> {
        let target = ResourceRef::new(namespace, name);
        let outcome = self
            .cron_jobs(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| classify(e, ClusterOperation::Delete, &target))?;

        if outcome.is_left() {
            debug!(%target, "CronJob deletion in progress");
        } else {
            debug!(%target, "CronJob deleted");
        }
        Ok(())
    }

    async fn list_executions(&self, namespace: &str, selector: &str) -> Result<Vec<ExecutionRef>> {
        let target = selector_target(namespace, selector);
        let pods = self
            .pods(namespace)
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(|e| classify(e, ClusterOperation::ListExecutions, &target))?;

        Ok(pods
            .items
            .iter()
            .filter_map(|pod| ExecutionRef::from_pod(namespace, pod))
            .collect())
    }

    async fn open_execution_output(
        &self,
        namespace: &str,
        execution: &ExecutionRef,
        container: &str,
    ) -> Result<OutputStream> {
        let target = execution.resource_ref();
        let params = LogParams {
            container: Some(container.to_string()),
            follow: false,
            ..Default::default()
        };

        let reader = self
            .pods(namespace)
            .log_stream(&execution.name, &params)
            .await
            .map_err(|e| classify(e, ClusterOperation::OpenOutput, &target))?;

        let chunks = futures::stream::try_unfold(Box::pin(reader), |mut reader| async move {
            let mut buf = vec![0u8; OUTPUT_CHUNK_SIZE];
            let read = reader.read(&mut buf).await?;
            if read == 0 {
                return Ok::<_, std::io::Error>(None);
            }
            buf.truncate(read);
            Ok(Some((Bytes::from(buf), reader)))
        });

        Ok(chunks
            .map_err(move |e: std::io::Error| AppError::StreamError {
                execution: target.clone(),
                message: e.to_string(),
                source: Some(Box::new(e)),
            })
            .boxed())
    }
}
