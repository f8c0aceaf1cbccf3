use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A Nomad job definition.
///
/// Only the fields this controller reads or writes are typed, everything else
/// is carried through untouched in `rest` so that planning and registering a
/// job submits exactly what was parsed.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct Job {
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "Namespace", default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(rename = "Meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, String>>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Job {
    /// Job ID, falling back to the name as Nomad does when no ID was given.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().or_else(|| self.name.as_deref())
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().or_else(|| self.id.as_deref())
    }
}

/// Row of the job listing; the full definition is fetched separately.
#[derive(Deserialize, Debug, PartialEq, Clone, Default)]
pub struct JobListStub {
    #[serde(rename = "ID", default)]
    pub id: String,

    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Namespace", default)]
    pub namespace: String,
}

/// Provenance of a desired job definition.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct GitInfo {
    pub git_url: String,
    pub git_commit: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct JobInfo {
    pub job: Job,
    pub git_info: GitInfo,
}

impl JobInfo {
    pub fn new(job: Job, git_info: GitInfo) -> Self {
        JobInfo { job, git_info }
    }
}

/// Jobs currently running in Nomad that belong to one source, keyed by job name.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct ClusterState {
    pub current_jobs: HashMap<String, JobInfo>,
}

#[derive(Deserialize, Debug, PartialEq, Clone, Default)]
pub struct Deployment {
    #[serde(rename = "ID", default)]
    pub id: String,

    #[serde(rename = "JobID", default)]
    pub job_id: String,

    #[serde(rename = "Namespace", default)]
    pub namespace: String,

    #[serde(rename = "Status", default)]
    pub status: String,

    #[serde(rename = "StatusDescription", default)]
    pub status_description: String,
}

/// Result of submitting a job.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct JobRegisterResponse {
    #[serde(rename = "EvalID", default)]
    pub eval_id: String,

    #[serde(rename = "JobModifyIndex", default)]
    pub job_modify_index: u64,

    #[serde(rename = "Warnings", default)]
    pub warnings: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct Namespace {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Description", default)]
    pub description: String,

    #[serde(rename = "Meta", default)]
    pub meta: HashMap<String, String>,
}

#[derive(Serialize, Debug, PartialEq, Clone, Default)]
pub struct DeploymentStatus {
    /// Latest deployment status as reported by Nomad, empty if there is none yet
    pub status: String,
}

#[derive(Serialize, Debug, PartialEq, Clone, Default)]
pub struct UpdateJobInfo {
    // creation and update are not distinguished
    pub updated: bool,
    pub deployment_status: DeploymentStatus,
}
