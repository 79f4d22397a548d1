//! Domain entities for scheduled jobs and their executions
//!
//! The control plane owns both entities. These types describe the desired
//! state this crate submits and the read-only view it takes of executions.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Label the cluster puts on every pod spawned for a job.
pub const EXECUTION_LABEL: &str = "job-name";

/// Label marking scheduled jobs created through this crate.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "cronctl";

const SCHEDULE_MACROS: &[&str] = &[
    "@yearly",
    "@annually",
    "@monthly",
    "@weekly",
    "@daily",
    "@midnight",
    "@hourly",
];

/// `(namespace, name)` address of a cluster object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub namespace: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_non_empty("namespace", &self.namespace)?;
        require_non_empty("name", &self.name)
    }

    /// Label selector matching every execution of this scheduled job.
    pub fn execution_selector(&self) -> String {
        format!("{}={}", EXECUTION_LABEL, self.name)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    ScheduledJob,
    Execution,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::ScheduledJob => write!(f, "scheduled job"),
            ResourceKind::Execution => write!(f, "execution"),
        }
    }
}

/// Restart policy applied to every execution. Not user configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPolicy {
    OnFailure,
}

impl RestartPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartPolicy::OnFailure => "OnFailure",
        }
    }
}

/// Desired state of a recurring workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJobSpec {
    pub namespace: String,
    pub name: String,
    pub image: String,
    pub schedule: String,
}

impl ScheduledJobSpec {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        image: impl Into<String>,
        schedule: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            image: image.into(),
            schedule: schedule.into(),
        }
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy::OnFailure
    }

    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(self.namespace.clone(), self.name.clone())
    }

    pub fn validate(&self) -> Result<()> {
        self.resource_ref().validate()?;
        require_non_empty("image", &self.image)?;
        validate_schedule(&self.schedule)
    }

    /// Build the CronJob submitted on create: one container named after the
    /// job, running the image, restarted on failure.
    pub fn to_cron_job(&self) -> CronJob {
        let container = Container {
            name: self.name.clone(),
            image: Some(self.image.clone()),
            ..Default::default()
        };

        let labels: BTreeMap<String, String> =
            [(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string())]
                .into_iter()
                .collect();

        CronJob {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(labels),
                ..Default::default()
            },
            spec: Some(CronJobSpec {
                schedule: self.schedule.clone(),
                job_template: JobTemplateSpec {
                    metadata: None,
                    spec: Some(JobSpec {
                        template: PodTemplateSpec {
                            metadata: None,
                            spec: Some(PodSpec {
                                containers: vec![container],
                                restart_policy: Some(self.restart_policy().as_str().to_string()),
                                ..Default::default()
                            }),
                        },
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            status: None,
        }
    }

    /// Overwrite schedule and the sole container's image on a fetched
    /// object. Everything else on the object is left as fetched.
    pub fn apply_to(&self, existing: &mut CronJob) -> Result<()> {
        let target = self.resource_ref();
        let spec = existing
            .spec
            .as_mut()
            .ok_or_else(|| AppError::invalid_state(target.clone(), "object has no spec"))?;

        let pod_spec = spec
            .job_template
            .spec
            .as_mut()
            .and_then(|job| job.template.spec.as_mut())
            .ok_or_else(|| AppError::invalid_state(target.clone(), "job template has no pod spec"))?;

        let container = pod_spec
            .containers
            .first_mut()
            .ok_or_else(|| AppError::invalid_state(target, "job template has no containers"))?;

        container.image = Some(self.image.clone());
        spec.schedule = self.schedule.clone();
        Ok(())
    }
}

/// Read-back view of a scheduled job as stored by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJobSummary {
    pub namespace: String,
    pub name: String,
    pub schedule: String,
    pub images: Vec<String>,
    pub restart_policy: Option<String>,
    pub suspended: bool,
    pub resource_version: Option<String>,
    pub last_schedule_time: Option<DateTime<Utc>>,
    pub active_executions: usize,
}

impl ScheduledJobSummary {
    pub fn from_cron_job(target: &ResourceRef, cron_job: &CronJob) -> Self {
        let spec = cron_job.spec.as_ref();
        let pod_spec = spec
            .and_then(|s| s.job_template.spec.as_ref())
            .and_then(|j| j.template.spec.as_ref());

        Self {
            namespace: cron_job
                .metadata
                .namespace
                .clone()
                .unwrap_or_else(|| target.namespace.clone()),
            name: cron_job
                .metadata
                .name
                .clone()
                .unwrap_or_else(|| target.name.clone()),
            schedule: spec.map(|s| s.schedule.clone()).unwrap_or_default(),
            images: pod_spec
                .map(|p| p.containers.iter().filter_map(|c| c.image.clone()).collect())
                .unwrap_or_default(),
            restart_policy: pod_spec.and_then(|p| p.restart_policy.clone()),
            suspended: spec.and_then(|s| s.suspend).unwrap_or(false),
            resource_version: cron_job.metadata.resource_version.clone(),
            last_schedule_time: cron_job
                .status
                .as_ref()
                .and_then(|s| s.last_schedule_time.as_ref())
                .map(|t| t.0),
            active_executions: cron_job
                .status
                .as_ref()
                .and_then(|s| s.active.as_ref())
                .map(|a| a.len())
                .unwrap_or(0),
        }
    }
}

/// Observed run instance of a scheduled job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRef {
    pub namespace: String,
    pub name: String,
    pub containers: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
}

impl ExecutionRef {
    pub fn from_pod(namespace: &str, pod: &Pod) -> Option<Self> {
        let name = pod.metadata.name.clone()?;
        Some(Self {
            namespace: pod
                .metadata
                .namespace
                .clone()
                .unwrap_or_else(|| namespace.to_string()),
            name,
            containers: pod
                .spec
                .as_ref()
                .map(|s| s.containers.iter().map(|c| c.name.clone()).collect())
                .unwrap_or_default(),
            created_at: pod.metadata.creation_timestamp.as_ref().map(|t| t.0),
            started_at: pod
                .status
                .as_ref()
                .and_then(|s| s.start_time.as_ref())
                .map(|t| t.0),
        })
    }

    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(self.namespace.clone(), self.name.clone())
    }

    /// Container whose output is read: the sole one, or the one named after
    /// the scheduled job when the pod carries sidecars.
    pub fn output_container(&self, job_name: &str) -> Option<&str> {
        match self.containers.as_slice() {
            [] => None,
            [only] => Some(only.as_str()),
            many => many
                .iter()
                .find(|c| c.as_str() == job_name)
                .or_else(|| many.first())
                .map(String::as_str),
        }
    }

    fn ordering_time(&self) -> Option<DateTime<Utc>> {
        self.started_at.or(self.created_at)
    }
}

/// Which execution the log retriever reads when several match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionSelection {
    /// Latest start time, falling back to creation time.
    #[default]
    MostRecent,
    /// First entry in the order the control plane listed them.
    FirstListed,
}

impl ExecutionSelection {
    pub fn select<'a>(&self, executions: &'a [ExecutionRef]) -> Option<&'a ExecutionRef> {
        match self {
            ExecutionSelection::FirstListed => executions.first(),
            ExecutionSelection::MostRecent => {
                executions
                    .iter()
                    .fold(None, |best: Option<&'a ExecutionRef>, candidate| match best {
                        Some(current) if candidate.ordering_time() <= current.ordering_time() => {
                            Some(current)
                        }
                        _ => Some(candidate),
                    })
            }
        }
    }
}

impl std::str::FromStr for ExecutionSelection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "most-recent" | "most_recent" | "latest" => Ok(ExecutionSelection::MostRecent),
            "first-listed" | "first_listed" | "first" => Ok(ExecutionSelection::FirstListed),
            other => Err(AppError::ConfigError(format!(
                "unknown execution selection '{}', expected most-recent or first-listed",
                other
            ))),
        }
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(field, "must not be empty"));
    }
    Ok(())
}

/// Structural check of a cron recurrence expression. Field ranges are left
/// to the control plane.
pub fn validate_schedule(schedule: &str) -> Result<()> {
    require_non_empty("schedule", schedule)?;

    let mut fields: Vec<&str> = schedule.split_whitespace().collect();
    if fields
        .first()
        .map(|f| f.starts_with("TZ=") || f.starts_with("CRON_TZ="))
        .unwrap_or(false)
    {
        fields.remove(0);
    }

    match fields.as_slice() {
        // The interval itself is parsed by the control plane.
        ["@every", _interval] => Ok(()),
        ["@every"] => Err(AppError::validation("schedule", "@every needs an interval")),
        [single] if single.starts_with('@') => {
            if SCHEDULE_MACROS.contains(single) {
                Ok(())
            } else {
                Err(AppError::validation(
                    "schedule",
                    format!("unknown schedule macro '{}'", single),
                ))
            }
        }
        parts if parts.len() == 5 => Ok(()),
        parts => Err(AppError::validation(
            "schedule",
            format!(
                "expected 5 fields, a @macro or @every <interval>, found {} field(s) in '{}'",
                parts.len(),
                schedule
            ),
        )),
    }
}
