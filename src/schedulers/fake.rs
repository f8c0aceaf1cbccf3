use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::models::event::{EventBatch, Topic};
use crate::models::job::{Deployment, Job, JobListStub, JobRegisterResponse, Namespace};
use crate::models::job_diff::{JobDiff, JobPlanResponse};
use crate::schedulers::scheduler::{
    EventStream, QueryOptions, Scheduler, SchedulerError, WriteOptions,
};

/// Calls made against the fake, in order.
#[derive(Debug, PartialEq, Clone)]
pub enum Call {
    ListJobs(QueryOptions),
    JobInfo(String),
    RegisterNamespace(Namespace, WriteOptions),
    PlanJob(Job, WriteOptions),
    RegisterJob(Job, WriteOptions),
    DeregisterJob(String, bool, WriteOptions),
    LatestDeployment(String),
    EventStream(Vec<(Topic, String)>, u64, QueryOptions),
}

/// In-memory scheduler for tests.
#[derive(Default)]
pub struct FakeScheduler {
    pub jobs: Mutex<Vec<Job>>,
    pub plan_diff: Mutex<JobDiff>,
    pub deployment: Mutex<Option<Deployment>>,
    pub index: u64,
    pub streams: Mutex<VecDeque<EventStream>>,
    pub calls: Mutex<Vec<Call>>,
    pub(crate) failures: Mutex<HashMap<&'static str, SchedulerError>>,
}

impl FakeScheduler {
    pub fn with_jobs(jobs: Vec<Job>) -> Self {
        FakeScheduler {
            jobs: Mutex::new(jobs),
            ..FakeScheduler::default()
        }
    }

    /// Makes the next call of `method` fail with `err`.
    pub fn fail(&self, method: &'static str, err: SchedulerError) {
        self.failures.lock().unwrap().insert(method, err);
    }

    /// Queues a subscription that serves `batches` and then stays open.
    pub fn serve(&self, batches: Vec<Result<EventBatch, SchedulerError>>) {
        let stream = stream::iter(batches).chain(stream::pending()).boxed();
        self.streams.lock().unwrap().push_back(stream);
    }

    /// Queues a subscription that serves `batches` and then closes.
    pub fn serve_and_close(&self, batches: Vec<Result<EventBatch, SchedulerError>>) {
        self.streams.lock().unwrap().push_back(stream::iter(batches).boxed());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn registered_jobs(&self) -> Vec<Job> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::RegisterJob(job, _) => Some(job),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn failure(&self, method: &'static str) -> Result<(), SchedulerError> {
        match self.failures.lock().unwrap().remove(method) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Scheduler for FakeScheduler {
    fn url(&self) -> &str {
        "http://nomad.test:4646"
    }

    async fn list_jobs(&self, opts: &QueryOptions) -> Result<Vec<JobListStub>, SchedulerError> {
        self.record(Call::ListJobs(opts.clone()));
        self.failure("list_jobs")?;

        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .map(|job| JobListStub {
                id: job.id().unwrap_or_default().to_string(),
                name: job.name().unwrap_or_default().to_string(),
                namespace: job.namespace.clone().unwrap_or_default(),
            })
            .collect())
    }

    async fn last_job_index(&self) -> Result<u64, SchedulerError> {
        Ok(self.index)
    }

    async fn job_info(&self, job_id: &str, _opts: &QueryOptions) -> Result<Job, SchedulerError> {
        self.record(Call::JobInfo(job_id.to_string()));
        self.failure("job_info")?;

        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|job| job.id() == Some(job_id))
            .cloned()
            .ok_or_else(|| SchedulerError::NotFound(format!("job {}", job_id)))
    }

    async fn parse_job(&self, _hcl: &str) -> Result<Job, SchedulerError> {
        Err(SchedulerError::Api {
            status: 501,
            message: "parsing is not supported by the fake".to_string(),
        })
    }

    async fn register_namespace(
        &self,
        namespace: &Namespace,
        opts: &WriteOptions,
    ) -> Result<(), SchedulerError> {
        self.record(Call::RegisterNamespace(namespace.clone(), opts.clone()));
        self.failure("register_namespace")
    }

    async fn plan_job(
        &self,
        job: &Job,
        _diff: bool,
        opts: &WriteOptions,
    ) -> Result<JobPlanResponse, SchedulerError> {
        self.record(Call::PlanJob(job.clone(), opts.clone()));
        self.failure("plan_job")?;

        Ok(JobPlanResponse {
            diff: Some(self.plan_diff.lock().unwrap().clone()),
            ..JobPlanResponse::default()
        })
    }

    async fn register_job(
        &self,
        job: &Job,
        opts: &WriteOptions,
    ) -> Result<JobRegisterResponse, SchedulerError> {
        self.record(Call::RegisterJob(job.clone(), opts.clone()));
        self.failure("register_job")?;

        Ok(JobRegisterResponse {
            eval_id: "eval-1".to_string(),
            ..JobRegisterResponse::default()
        })
    }

    async fn deregister_job(
        &self,
        job_id: &str,
        purge: bool,
        opts: &WriteOptions,
    ) -> Result<(), SchedulerError> {
        self.record(Call::DeregisterJob(job_id.to_string(), purge, opts.clone()));
        self.failure("deregister_job")
    }

    async fn latest_deployment(
        &self,
        job_id: &str,
        _opts: &QueryOptions,
    ) -> Result<Option<Deployment>, SchedulerError> {
        self.record(Call::LatestDeployment(job_id.to_string()));
        self.failure("latest_deployment")?;

        Ok(self.deployment.lock().unwrap().clone())
    }

    async fn event_stream(
        &self,
        topics: &[(Topic, String)],
        index: u64,
        opts: &QueryOptions,
    ) -> Result<EventStream, SchedulerError> {
        self.record(Call::EventStream(topics.to_vec(), index, opts.clone()));
        self.failure("event_stream")?;

        Ok(self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| stream::pending().boxed()))
    }
}

pub fn owned_meta(source_id: &str) -> HashMap<String, String> {
    let mut meta = HashMap::new();
    meta.insert("nomadops".to_string(), "true".to_string());
    meta.insert("nomadopssrcid".to_string(), source_id.to_string());
    meta
}

pub fn job(name: &str, meta: Option<HashMap<String, String>>) -> Job {
    Job {
        id: Some(name.to_string()),
        name: Some(name.to_string()),
        meta,
        ..Job::default()
    }
}
