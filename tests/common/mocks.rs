use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use k8s_openapi::api::batch::v1::CronJob;
use tokio::sync::RwLock;

use cronctl::core::traits::{ClusterConnector, ClusterSession, OutputStream};
use cronctl::domain::entities::{validate_schedule, ExecutionRef, ResourceKind, ResourceRef};
use cronctl::error::{AppError, Result};

/// Output an execution produces when its stream is read
#[derive(Debug, Clone)]
pub enum MockOutput {
    /// All chunks, then a clean end of stream.
    Complete(Vec<Bytes>),
    /// These chunks, then a transport failure.
    Interrupted(Vec<Bytes>),
    /// The stream cannot be opened at all.
    Unavailable,
}

pub fn text_chunks(parts: &[&'static str]) -> Vec<Bytes> {
    parts.iter().map(|p| Bytes::from_static(p.as_bytes())).collect()
}

#[derive(Debug, Clone)]
pub struct MockExecution {
    pub execution: ExecutionRef,
    pub labels: BTreeMap<String, String>,
    pub output: MockOutput,
}

impl MockExecution {
    /// Execution spawned for `job_name`, with one container named after it.
    pub fn for_job(namespace: &str, job_name: &str, suffix: &str, output: MockOutput) -> Self {
        Self {
            execution: ExecutionRef {
                namespace: namespace.to_string(),
                name: format!("{}-{}", job_name, suffix),
                containers: vec![job_name.to_string()],
                created_at: None,
                started_at: None,
            },
            labels: [("job-name".to_string(), job_name.to_string())]
                .into_iter()
                .collect(),
            output,
        }
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.execution.started_at = Some(at);
        self
    }

    pub fn without_containers(mut self) -> Self {
        self.execution.containers.clear();
        self
    }
}

/// Control plane failure to inject on the next matching call
#[derive(Debug, Clone)]
pub enum InjectedFailure {
    Connection,
    Rejected { code: u16, reason: String, message: String },
}

#[derive(Default)]
struct ClusterState {
    cron_jobs: HashMap<(String, String), CronJob>,
    executions: Vec<MockExecution>,
    next_version: u64,
    failures: HashMap<&'static str, InjectedFailure>,
    race_next_update: bool,
    fail_connect: bool,
    latency: Option<Duration>,
}

/// In-memory control plane. Clones share state, so a clone handed out as a
/// session sees everything the test set up.
#[derive(Clone, Default)]
pub struct MockCluster {
    state: Arc<RwLock<ClusterState>>,
    connects: Arc<AtomicUsize>,
    open_streams: Arc<AtomicUsize>,
    opened_streams: Arc<AtomicUsize>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Arc<dyn ClusterConnector> {
        Arc::new(self.clone())
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Streams opened and not yet dropped.
    pub fn open_stream_count(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    pub fn opened_stream_count(&self) -> usize {
        self.opened_streams.load(Ordering::SeqCst)
    }

    pub async fn set_fail_connect(&self, fail: bool) {
        self.state.write().await.fail_connect = fail;
    }

    pub async fn set_latency(&self, latency: Duration) {
        self.state.write().await.latency = Some(latency);
    }

    /// Fail the next call of `operation` ("create", "get", "update",
    /// "delete", "list", "open").
    pub async fn fail_next(&self, operation: &'static str, failure: InjectedFailure) {
        self.state.write().await.failures.insert(operation, failure);
    }

    /// Simulate another writer modifying the job between the next get and
    /// the update that follows it.
    pub async fn race_next_update(&self) {
        self.state.write().await.race_next_update = true;
    }

    /// Store an object as if created by some other client.
    pub async fn insert_cron_job(&self, namespace: &str, mut cron_job: CronJob) {
        let mut state = self.state.write().await;
        state.next_version += 1;
        cron_job.metadata.namespace = Some(namespace.to_string());
        cron_job.metadata.resource_version = Some(state.next_version.to_string());
        let name = cron_job.metadata.name.clone().unwrap_or_default();
        state
            .cron_jobs
            .insert((namespace.to_string(), name), cron_job);
    }

    pub async fn stored(&self, namespace: &str, name: &str) -> Option<CronJob> {
        self.state
            .read()
            .await
            .cron_jobs
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub async fn stored_count(&self) -> usize {
        self.state.read().await.cron_jobs.len()
    }

    pub async fn add_execution(&self, execution: MockExecution) {
        self.state.write().await.executions.push(execution);
    }

    async fn before_call(&self, operation: &'static str, target: &ResourceRef) -> Result<()> {
        let (latency, failure) = {
            let mut state = self.state.write().await;
            (state.latency, state.failures.remove(operation))
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            None => Ok(()),
            Some(InjectedFailure::Connection) => Err(AppError::ConnectionError {
                operation,
                message: "connection reset by peer".to_string(),
                source: None,
            }),
            Some(InjectedFailure::Rejected {
                code,
                reason,
                message,
            }) => Err(AppError::RemoteRejected {
                operation,
                target: target.clone(),
                code,
                reason,
                message,
            }),
        }
    }

    fn reject_schedule(operation: &'static str, target: &ResourceRef, cron_job: &CronJob) -> Result<()> {
        let schedule = cron_job
            .spec
            .as_ref()
            .map(|s| s.schedule.as_str())
            .unwrap_or_default();
        validate_schedule(schedule).map_err(|e| AppError::RemoteRejected {
            operation,
            target: target.clone(),
            code: 422,
            reason: "Invalid".to_string(),
            message: format!("spec.schedule: Invalid value: {}", e),
        })
    }
}

fn target_of(namespace: &str, cron_job: &CronJob) -> ResourceRef {
    ResourceRef::new(namespace, cron_job.metadata.name.clone().unwrap_or_default())
}

/// Decrements the open stream counter when the stream owning it is dropped.
struct StreamRelease(Arc<AtomicUsize>);

impl Drop for StreamRelease {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClusterConnector for MockCluster {
    async fn connect(&self) -> Result<Arc<dyn ClusterSession>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.state.read().await.fail_connect {
            return Err(AppError::ConnectionError {
                operation: "connect",
                message: "cluster unreachable".to_string(),
                source: None,
            });
        }
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl ClusterSession for MockCluster {
    async fn create_scheduled_job(&self, namespace: &str, cron_job: &CronJob) -> Result<CronJob> {
        let target = target_of(namespace, cron_job);
        self.before_call("create", &target).await?;
        Self::reject_schedule("create", &target, cron_job)?;

        let mut state = self.state.write().await;
        let key = (target.namespace.clone(), target.name.clone());
        if state.cron_jobs.contains_key(&key) {
            return Err(AppError::AlreadyExists { target });
        }

        state.next_version += 1;
        let mut stored = cron_job.clone();
        stored.metadata.namespace = Some(namespace.to_string());
        stored.metadata.resource_version = Some(state.next_version.to_string());
        state.cron_jobs.insert(key, stored.clone());
        Ok(stored)
    }

    async fn get_scheduled_job(&self, namespace: &str, name: &str) -> Result<CronJob> {
        let target = ResourceRef::new(namespace, name);
        self.before_call("get", &target).await?;

        let mut state = self.state.write().await;
        let key = (namespace.to_string(), name.to_string());
        let fetched = state
            .cron_jobs
            .get(&key)
            .cloned()
            .ok_or_else(|| AppError::not_found(ResourceKind::ScheduledJob, target))?;

        if std::mem::take(&mut state.race_next_update) {
            state.next_version += 1;
            let version = state.next_version.to_string();
            if let Some(stored) = state.cron_jobs.get_mut(&key) {
                stored.metadata.resource_version = Some(version);
                if let Some(spec) = stored.spec.as_mut() {
                    spec.schedule = "30 3 * * *".to_string();
                }
            }
        }
        Ok(fetched)
    }

    async fn update_scheduled_job(&self, namespace: &str, cron_job: &CronJob) -> Result<CronJob> {
        let target = target_of(namespace, cron_job);
        self.before_call("update", &target).await?;
        Self::reject_schedule("update", &target, cron_job)?;

        let mut state = self.state.write().await;
        let key = (target.namespace.clone(), target.name.clone());
        let current_version = match state.cron_jobs.get(&key) {
            Some(current) => current.metadata.resource_version.clone(),
            None => return Err(AppError::not_found(ResourceKind::ScheduledJob, target)),
        };

        if let Some(version) = &cron_job.metadata.resource_version {
            if Some(version) != current_version.as_ref() {
                return Err(AppError::ConflictError {
                    target,
                    message: "the object has been modified; please apply your changes to the latest version and try again".to_string(),
                });
            }
        }

        state.next_version += 1;
        let mut stored = cron_job.clone();
        stored.metadata.resource_version = Some(state.next_version.to_string());
        state.cron_jobs.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete_scheduled_job(&self, namespace: &str, name: &str) -> Result<()> {
        let target = ResourceRef::new(namespace, name);
        self.before_call("delete", &target).await?;

        let mut state = self.state.write().await;
        match state.cron_jobs.remove(&(namespace.to_string(), name.to_string())) {
            Some(_) => Ok(()),
            None => Err(AppError::not_found(ResourceKind::ScheduledJob, target)),
        }
    }

    async fn list_executions(&self, namespace: &str, selector: &str) -> Result<Vec<ExecutionRef>> {
        let (key, value) = selector.split_once('=').unwrap_or((selector, ""));
        let target = ResourceRef::new(namespace, value);
        self.before_call("list", &target).await?;

        let state = self.state.read().await;
        Ok(state
            .executions
            .iter()
            .filter(|e| e.execution.namespace == namespace)
            .filter(|e| e.labels.get(key).map(String::as_str) == Some(value))
            .map(|e| e.execution.clone())
            .collect())
    }

    async fn open_execution_output(
        &self,
        namespace: &str,
        execution: &ExecutionRef,
        container: &str,
    ) -> Result<OutputStream> {
        let target = execution.resource_ref();
        self.before_call("open", &target).await?;

        let output = {
            let state = self.state.read().await;
            state
                .executions
                .iter()
                .find(|e| e.execution.namespace == namespace && e.execution.name == execution.name)
                .filter(|e| e.execution.containers.iter().any(|c| c == container))
                .map(|e| e.output.clone())
        };

        let chunks: Vec<Result<Bytes>> = match output {
            None | Some(MockOutput::Unavailable) => {
                return Err(AppError::StreamError {
                    execution: target,
                    message: format!("container {} is not available", container),
                    source: None,
                })
            }
            Some(MockOutput::Complete(chunks)) => chunks.into_iter().map(Ok).collect(),
            Some(MockOutput::Interrupted(chunks)) => chunks
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(AppError::StreamError {
                    execution: target.clone(),
                    message: "unexpected EOF".to_string(),
                    source: None,
                })))
                .collect(),
        };

        self.open_streams.fetch_add(1, Ordering::SeqCst);
        self.opened_streams.fetch_add(1, Ordering::SeqCst);
        let release = StreamRelease(self.open_streams.clone());

        Ok(stream::iter(chunks)
            .map(move |chunk| {
                let _held = &release;
                chunk
            })
            .boxed())
    }
}
