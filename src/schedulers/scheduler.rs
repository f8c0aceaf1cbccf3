use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::models::event::{EventBatch, Topic};
use crate::models::job::{
    Deployment, Job, JobListStub, JobRegisterResponse, Namespace,
};
use crate::models::job_diff::JobPlanResponse;
use crate::models::source::Source;

/// Errors reported by a scheduler backend.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("HTTP error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("Nomad returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("Event stream failed: {source}")]
    Stream {
        #[from]
        source: tokio_util::codec::LinesCodecError,
    },

    #[error("Invalid response: {source}")]
    Decode {
        #[from]
        source: serde_json::Error,
    },
}

impl SchedulerError {
    /// True for a typed not found, or any error whose text says "not found".
    pub fn is_not_found(&self) -> bool {
        match self {
            SchedulerError::NotFound(_) => true,
            other => other.to_string().to_lowercase().contains("not found"),
        }
    }
}

/// Read scoping.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct QueryOptions {
    pub namespace: Option<String>,
    pub region: Option<String>,
}

/// Write scoping.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct WriteOptions {
    pub namespace: Option<String>,
    pub region: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl QueryOptions {
    pub fn for_source(source: &Source) -> Self {
        QueryOptions {
            namespace: non_empty(&source.namespace),
            region: non_empty(&source.region),
        }
    }

    pub fn all_namespaces() -> Self {
        QueryOptions {
            namespace: Some("*".to_string()),
            region: None,
        }
    }
}

impl WriteOptions {
    pub fn for_source(source: &Source) -> Self {
        WriteOptions {
            namespace: non_empty(&source.namespace),
            region: non_empty(&source.region),
        }
    }
}

pub type EventStream = BoxStream<'static, Result<EventBatch, SchedulerError>>;

/// The cluster scheduler this controller reconciles against.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Address of the scheduler API.
    fn url(&self) -> &str;

    async fn list_jobs(&self, opts: &QueryOptions) -> Result<Vec<JobListStub>, SchedulerError>;

    /// Raft index of the job listing; where an event stream should start.
    async fn last_job_index(&self) -> Result<u64, SchedulerError>;

    async fn job_info(&self, job_id: &str, opts: &QueryOptions) -> Result<Job, SchedulerError>;

    /// Parses job specification text into a canonicalized job.
    async fn parse_job(&self, hcl: &str) -> Result<Job, SchedulerError>;

    async fn register_namespace(
        &self,
        namespace: &Namespace,
        opts: &WriteOptions,
    ) -> Result<(), SchedulerError>;

    /// Dry-run of `job` against what is running.
    async fn plan_job(
        &self,
        job: &Job,
        diff: bool,
        opts: &WriteOptions,
    ) -> Result<JobPlanResponse, SchedulerError>;

    async fn register_job(
        &self,
        job: &Job,
        opts: &WriteOptions,
    ) -> Result<JobRegisterResponse, SchedulerError>;

    async fn deregister_job(
        &self,
        job_id: &str,
        purge: bool,
        opts: &WriteOptions,
    ) -> Result<(), SchedulerError>;

    /// Most recent deployment of a job, `None` if it never had one.
    async fn latest_deployment(
        &self,
        job_id: &str,
        opts: &QueryOptions,
    ) -> Result<Option<Deployment>, SchedulerError>;

    /// Opens the event stream for `topics` (topic, filter key) starting at `index`.
    async fn event_stream(
        &self,
        topics: &[(Topic, String)],
        index: u64,
        opts: &QueryOptions,
    ) -> Result<EventStream, SchedulerError>;
}
