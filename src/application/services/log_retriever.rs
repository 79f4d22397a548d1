//! Retrieval of the captured output of a scheduled job's execution

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

use crate::core::operation::OperationContext;
use crate::core::traits::{ClusterConnector, OutputStream};
use crate::domain::entities::{ExecutionSelection, ResourceKind, ResourceRef};
use crate::error::{AppError, Result};

pub struct ExecutionLogRetriever {
    connector: Arc<dyn ClusterConnector>,
    selection: ExecutionSelection,
}

impl ExecutionLogRetriever {
    pub fn new(connector: Arc<dyn ClusterConnector>) -> Self {
        Self {
            connector,
            selection: ExecutionSelection::default(),
        }
    }

    pub fn with_selection(mut self, selection: ExecutionSelection) -> Self {
        self.selection = selection;
        self
    }

    /// List the job's executions, pick one per the selection policy and
    /// read its output to completion. Does not follow a running execution.
    #[instrument(skip(self, ctx, target), fields(namespace = %target.namespace, name = %target.name))]
    pub async fn fetch_latest_output(&self, ctx: &OperationContext, target: &ResourceRef) -> Result<String> {
        target.validate()?;
        let session = ctx.run("connect", self.connector.connect()).await?;

        let selector = target.execution_selector();
        let executions = ctx
            .run("list executions", session.list_executions(&target.namespace, &selector))
            .await?;
        debug!(count = executions.len(), %selector, "Listed executions");

        let execution = self
            .selection
            .select(&executions)
            .ok_or_else(|| AppError::not_found(ResourceKind::Execution, target.clone()))?;

        let container = execution.output_container(&target.name).ok_or_else(|| {
            AppError::invalid_state(
                execution.resource_ref(),
                "execution has no container to read output from",
            )
        })?;
        debug!(execution = %execution.name, container, "Reading execution output");

        let stream = ctx
            .run(
                "open output",
                session.open_execution_output(&target.namespace, execution, container),
            )
            .await?;

        let buffer = ctx.run("read output", drain(stream)).await?;

        info!(
            execution = %execution.name,
            bytes = buffer.len(),
            "Fetched output of CronJob {}",
            target.name
        );
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Read a stream to its end. On any chunk error the partial buffer is
/// discarded. The stream is dropped on return either way.
async fn drain(mut stream: OutputStream) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => buffer.extend_from_slice(&bytes),
            Err(e) => {
                warn!(discarded_bytes = buffer.len(), "Execution output stream failed: {}", e);
                return Err(e);
            }
        }
    }
    Ok(buffer)
}
