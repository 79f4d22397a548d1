//! Core traits and interfaces for the system
//!
//! These traits are the seam between the lifecycle logic and the cluster
//! client. The Kubernetes implementation lives in `infrastructure`; tests
//! provide an in-memory one.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use k8s_openapi::api::batch::v1::CronJob;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::domain::entities::ExecutionRef;
use crate::error::Result;

/// Raw output of one execution. Dropping the stream closes it.
pub type OutputStream = BoxStream<'static, Result<Bytes>>;

/// Produces live sessions against the control plane
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    /// Load credentials and establish a session.
    async fn connect(&self) -> Result<Arc<dyn ClusterSession>>;
}

/// Resource operations against one control plane
#[async_trait]
pub trait ClusterSession: Send + Sync {
    /// Submit a new scheduled job. Fails with `AlreadyExists` if the name is taken.
    async fn create_scheduled_job(&self, namespace: &str, cron_job: &CronJob) -> Result<CronJob>;

    /// Fetch a scheduled job by name.
    async fn get_scheduled_job(&self, namespace: &str, name: &str) -> Result<CronJob>;

    /// Replace a scheduled job with a modified copy of a fetched object.
    async fn update_scheduled_job(&self, namespace: &str, cron_job: &CronJob) -> Result<CronJob>;

    /// Remove a scheduled job. Missing jobs are `NotFound`, not a no-op.
    async fn delete_scheduled_job(&self, namespace: &str, name: &str) -> Result<()>;

    /// List executions matching a label selector, in control plane order.
    async fn list_executions(&self, namespace: &str, selector: &str) -> Result<Vec<ExecutionRef>>;

    /// Open the output of one container of an execution.
    async fn open_execution_output(
        &self,
        namespace: &str,
        execution: &ExecutionRef,
        container: &str,
    ) -> Result<OutputStream>;
}

/// Connector that keeps the first successful session and hands it out to
/// every later caller. A failed connect is not cached.
pub struct SharedSessionConnector {
    inner: Arc<dyn ClusterConnector>,
    session: OnceCell<Arc<dyn ClusterSession>>,
}

impl SharedSessionConnector {
    pub fn new(inner: Arc<dyn ClusterConnector>) -> Self {
        Self {
            inner,
            session: OnceCell::new(),
        }
    }
}

#[async_trait]
impl ClusterConnector for SharedSessionConnector {
    async fn connect(&self) -> Result<Arc<dyn ClusterSession>> {
        let session = self
            .session
            .get_or_try_init(|| async {
                debug!("Establishing shared cluster session");
                self.inner.connect().await
            })
            .await?;
        Ok(session.clone())
    }
}
