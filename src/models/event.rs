use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use super::job::{Deployment, Job};

pub const JOB_REGISTERED: &str = "JobRegistered";
pub const JOB_DEREGISTERED: &str = "JobDeregistered";
pub const DEPLOYMENT_STATUS_UPDATE: &str = "DeploymentStatusUpdate";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Topic {
    Job,
    Deployment,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Job => write!(f, "Job"),
            Topic::Deployment => write!(f, "Deployment"),
        }
    }
}

/// One frame of the Nomad event stream. Heartbeats arrive as `{}`.
#[derive(Deserialize, Debug, PartialEq, Clone, Default)]
pub struct EventBatch {
    #[serde(rename = "Index", default)]
    pub index: u64,

    #[serde(rename = "Events", default)]
    pub events: Option<Vec<Event>>,
}

impl EventBatch {
    pub fn is_heartbeat(&self) -> bool {
        self.index == 0 && self.events.as_ref().map_or(true, Vec::is_empty)
    }

    pub fn events(&self) -> &[Event] {
        self.events.as_deref().unwrap_or(&[])
    }
}

#[derive(Deserialize, Debug, PartialEq, Clone, Default)]
pub struct Event {
    #[serde(rename = "Topic", default)]
    pub topic: String,

    #[serde(rename = "Type", default)]
    pub event_type: String,

    #[serde(rename = "Key", default)]
    pub key: String,

    #[serde(rename = "Namespace", default)]
    pub namespace: String,

    #[serde(rename = "Index", default)]
    pub index: u64,

    #[serde(rename = "Payload", default)]
    pub payload: Value,
}

impl Event {
    pub fn job(&self) -> Result<Job, serde_json::Error> {
        self.payload_entry("Job")
    }

    pub fn deployment(&self) -> Result<Deployment, serde_json::Error> {
        self.payload_entry("Deployment")
    }

    fn payload_entry<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.get(key).cloned().unwrap_or(Value::Null))
    }
}

/// A change to a job that warrants re-evaluating it.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum JobChange {
    Registered(String),
    Deregistered(String),
    DeploymentStatusUpdate { job_id: String, deployment_id: String },
}

impl JobChange {
    /// Decodes the change carried by `event`, `None` for event types we don't care about.
    pub fn from_event(event: &Event) -> Result<Option<JobChange>, serde_json::Error> {
        let change = match event.event_type.as_str() {
            JOB_REGISTERED => Some(JobChange::Registered(job_name(&event.job()?)?)),
            JOB_DEREGISTERED => Some(JobChange::Deregistered(job_name(&event.job()?)?)),
            DEPLOYMENT_STATUS_UPDATE => {
                let deployment = event.deployment()?;
                Some(JobChange::DeploymentStatusUpdate {
                    job_id: deployment.job_id,
                    deployment_id: deployment.id,
                })
            }
            _ => None,
        };

        Ok(change)
    }

    pub fn job_name(&self) -> &str {
        match self {
            JobChange::Registered(name) | JobChange::Deregistered(name) => name,
            JobChange::DeploymentStatusUpdate { job_id, .. } => job_id,
        }
    }
}

fn job_name(job: &Job) -> Result<String, serde_json::Error> {
    [job.id.as_deref(), job.name.as_deref()]
        .into_iter()
        .flatten()
        .find(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| serde::de::Error::custom("job event without ID or Name"))
}
