//! Scheduled-job lifecycle: create, update, delete and read-back
//!
//! Every operation connects through the injected connector, performs its
//! calls and returns. Nothing is cached here; the control plane is the only
//! source of truth.

use std::sync::Arc;

use k8s_openapi::api::batch::v1::CronJob;
use tracing::{debug, instrument};

use crate::core::operation::OperationContext;
use crate::core::traits::{ClusterConnector, ClusterSession};
use crate::domain::entities::{ResourceRef, ScheduledJobSpec, ScheduledJobSummary};
use crate::error::Result;

pub struct ScheduledJobManager {
    connector: Arc<dyn ClusterConnector>,
}

impl ScheduledJobManager {
    pub fn new(connector: Arc<dyn ClusterConnector>) -> Self {
        Self { connector }
    }

    async fn session(&self, ctx: &OperationContext) -> Result<Arc<dyn ClusterSession>> {
        ctx.run("connect", self.connector.connect()).await
    }

    /// Create the scheduled job. Fails with `AlreadyExists` when the name is
    /// taken in the namespace; the existing object is left untouched.
    #[instrument(skip(self, ctx, spec), fields(namespace = %spec.namespace, name = %spec.name))]
    pub async fn create(&self, ctx: &OperationContext, spec: &ScheduledJobSpec) -> Result<CronJob> {
        spec.validate()?;
        let session = self.session(ctx).await?;

        let desired = spec.to_cron_job();
        let created = ctx
            .run("create", session.create_scheduled_job(&spec.namespace, &desired))
            .await?;

        debug!(
            schedule = %spec.schedule,
            image = %spec.image,
            "CronJob {} created successfully",
            spec.name
        );
        Ok(created)
    }

    /// Fetch, overwrite schedule and image, write back.
    ///
    /// Not atomic: the write carries the fetched `resourceVersion`, so a
    /// concurrent writer in between surfaces as `ConflictError` and nothing
    /// is retried here.
    #[instrument(skip(self, ctx, spec), fields(namespace = %spec.namespace, name = %spec.name))]
    pub async fn update(&self, ctx: &OperationContext, spec: &ScheduledJobSpec) -> Result<CronJob> {
        spec.validate()?;
        let session = self.session(ctx).await?;

        let mut existing = ctx
            .run("get", session.get_scheduled_job(&spec.namespace, &spec.name))
            .await?;
        debug!(
            resource_version = ?existing.metadata.resource_version,
            "Fetched CronJob for update"
        );

        spec.apply_to(&mut existing)?;

        let updated = ctx
            .run("update", session.update_scheduled_job(&spec.namespace, &existing))
            .await?;

        debug!(
            schedule = %spec.schedule,
            image = %spec.image,
            "CronJob {} updated successfully",
            spec.name
        );
        Ok(updated)
    }

    /// Delete the scheduled job. Deleting a missing job is `NotFound`;
    /// executions already spawned are left to the cluster.
    #[instrument(skip(self, ctx, target), fields(namespace = %target.namespace, name = %target.name))]
    pub async fn delete(&self, ctx: &OperationContext, target: &ResourceRef) -> Result<()> {
        target.validate()?;
        let session = self.session(ctx).await?;

        ctx.run(
            "delete",
            session.delete_scheduled_job(&target.namespace, &target.name),
        )
        .await?;

        debug!("CronJob {} deleted successfully", target.name);
        Ok(())
    }

    /// Read back the stored state of a scheduled job.
    #[instrument(skip(self, ctx, target), fields(namespace = %target.namespace, name = %target.name))]
    pub async fn get(&self, ctx: &OperationContext, target: &ResourceRef) -> Result<ScheduledJobSummary> {
        target.validate()?;
        let session = self.session(ctx).await?;

        let cron_job = ctx
            .run("get", session.get_scheduled_job(&target.namespace, &target.name))
            .await?;
        Ok(ScheduledJobSummary::from_cron_job(target, &cron_job))
    }
}
