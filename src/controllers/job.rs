use chrono::Utc;
use log::{debug, info, trace};
use std::sync::Arc;

use crate::models::job::{
    ClusterState, DeploymentStatus, GitInfo, Job, JobInfo, Namespace, UpdateJobInfo,
};
use crate::models::job_diff::has_update;
use crate::models::ownership::{
    claim, is_owned_by, namespace_meta, META_KEY_SRC_COMMIT, META_KEY_SRC_URL,
};
use crate::models::source::Source;
use crate::schedulers::scheduler::{QueryOptions, Scheduler, WriteOptions};
use crate::utils::error::Error;

/// Applies desired jobs of a source to Nomad, touching only jobs that source owns.
pub struct JobController<S: Scheduler> {
    pub(crate) scheduler: Arc<S>,
}

impl<S: Scheduler> JobController<S> {
    pub fn new(scheduler: S) -> Self {
        JobController {
            scheduler: Arc::new(scheduler),
        }
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn url(&self) -> &str {
        self.scheduler.url()
    }

    /// Parses job specification text, attaching its provenance.
    ///
    /// # Arguments:
    /// - `hcl` - Job specification as it was read from the repository.
    /// - `git_info` - Repository URL and commit the specification was read at.
    pub async fn parse_job(&self, hcl: &str, git_info: GitInfo) -> Result<JobInfo, Error> {
        let job = self.scheduler.parse_job(hcl).await.map_err(Error::query)?;

        Ok(JobInfo::new(job, git_info))
    }

    /// Reads every job in the source's namespace/region that the source owns.
    ///
    /// # Arguments:
    /// - `source` - Source whose namespace and region are listed, and whose ID marks ownership.
    ///
    /// Note: Any failure aborts the whole read, there is no partial state.
    pub async fn get_current_cluster_state(&self, source: &Source) -> Result<ClusterState, Error> {
        let opts = QueryOptions::for_source(source);
        let stubs = self.scheduler.list_jobs(&opts).await.map_err(Error::query)?;

        let mut cluster_state = ClusterState::default();

        for stub in stubs {
            let job_id = if stub.id.is_empty() { &stub.name } else { &stub.id };
            let job = self
                .scheduler
                .job_info(job_id, &opts)
                .await
                .map_err(Error::query)?;

            // Ignore stuff that is not managed by this source
            if !is_owned_by(job.meta.as_ref(), &source.id) {
                trace!("ignoring job {} not owned by source {}", job_id, source.id);
                continue;
            }

            let meta_value = |key: &str| {
                job.meta
                    .as_ref()
                    .and_then(|meta| meta.get(key))
                    .cloned()
                    .unwrap_or_default()
            };
            let git_info = GitInfo {
                git_url: meta_value(META_KEY_SRC_URL),
                git_commit: meta_value(META_KEY_SRC_COMMIT),
            };

            let name = job.name().unwrap_or(job_id).to_string();
            cluster_state.current_jobs.insert(name, JobInfo::new(job, git_info));
        }

        Ok(cluster_state)
    }

    /// Plans `job` against Nomad and submits it if the diff warrants it.
    ///
    /// # Arguments:
    /// - `source` - Source the job belongs to. Scopes every call and tags the job.
    /// - `job` - Desired job with the commit it was read at.
    /// - `restart` - Forces a new allocation even when nothing else changed.
    ///
    /// Note: A live job with the same ID must already belong to `source`, otherwise an
    /// `OwnershipError` is returned before anything is planned or written. The returned
    /// deployment status is the one found before submitting. A paused source gets the
    /// diff logged but nothing is written.
    pub async fn update_job(
        &self,
        source: &Source,
        job: &JobInfo,
        restart: bool,
    ) -> Result<UpdateJobInfo, Error> {
        let write_opts = WriteOptions::for_source(source);
        let query_opts = QueryOptions::for_source(source);

        let namespace = if source.create_namespace {
            match job.job.namespace.as_deref() {
                Some(name) if !name.is_empty() => Some(Namespace {
                    name: name.to_string(),
                    meta: namespace_meta(),
                    ..Namespace::default()
                }),
                _ => {
                    return Err(Error::ConfigurationError(
                        "require a namespace to be set in conjunction with 'createNamespace'"
                            .to_string(),
                    ))
                }
            }
        } else {
            None
        };

        let job_id = job
            .job
            .id()
            .ok_or_else(|| Error::ConfigurationError("job has neither ID nor Name".to_string()))?
            .to_string();

        if let Some(live) = self.live_job(&job_id, &query_opts).await? {
            if !is_owned_by(live.meta.as_ref(), &source.id) {
                return Err(Error::OwnershipError {
                    job: job_id,
                    source_id: source.id.clone(),
                });
            }
        }

        if let Some(namespace) = namespace {
            self.scheduler
                .register_namespace(&namespace, &write_opts)
                .await
                .map_err(Error::write)?;
        }

        let mut tagged = job.clone();
        tagged.job.meta = Some(claim(source, job, restart, Utc::now()));

        let plan = self
            .scheduler
            .plan_job(&tagged.job, true, &write_opts)
            .await
            .map_err(Error::query)?;

        let deployment_status = self.deployment_status(&job_id, &query_opts).await?;

        let update = match &plan.diff {
            Some(diff) => has_update(diff, restart, source.force),
            None => true,
        };

        if !update {
            trace!("Job {} is already up to date.", job_id);

            return Ok(UpdateJobInfo {
                updated: false,
                deployment_status,
            });
        }

        info!(
            "Job Diff:{}",
            serde_json::to_string(&plan.diff).unwrap_or_default()
        );

        if source.paused {
            info!("source {} is paused, not submitting job {}", source.id, job_id);
        } else {
            let response = self
                .scheduler
                .register_job(&tagged.job, &write_opts)
                .await
                .map_err(Error::write)?;

            info!(
                "Job Post:{}",
                serde_json::to_string(&response).unwrap_or_default()
            );
        }

        Ok(UpdateJobInfo {
            updated: true,
            deployment_status,
        })
    }

    /// Stops a job without purging it.
    ///
    /// # Arguments:
    /// - `source` - Source that must own the live job.
    /// - `job` - Job to stop, looked up by name.
    ///
    /// Note: A job Nomad no longer knows is left alone and reported as success. A live job
    /// owned by anyone else is refused with an `OwnershipError`.
    pub async fn delete_job(&self, source: &Source, job: &JobInfo) -> Result<(), Error> {
        let name = job
            .job
            .name()
            .ok_or_else(|| Error::ConfigurationError("job has neither ID nor Name".to_string()))?;

        let live = match self.live_job(name, &QueryOptions::for_source(source)).await? {
            Some(live) => live,
            None => {
                info!("job {} of source {} is already gone", name, source.id);
                return Ok(());
            }
        };
        if !is_owned_by(live.meta.as_ref(), &source.id) {
            return Err(Error::OwnershipError {
                job: name.to_string(),
                source_id: source.id.clone(),
            });
        }

        self.scheduler
            .deregister_job(name, false, &WriteOptions::for_source(source))
            .await
            .map_err(Error::write)?;

        info!("deregistered job {} of source {}", name, source.id);

        Ok(())
    }

    async fn live_job(&self, job_id: &str, opts: &QueryOptions) -> Result<Option<Job>, Error> {
        match self.scheduler.job_info(job_id, opts).await {
            Ok(job) => Ok(Some(job)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(Error::query(err)),
        }
    }

    async fn deployment_status(
        &self,
        job_id: &str,
        opts: &QueryOptions,
    ) -> Result<DeploymentStatus, Error> {
        let deployment = match self.scheduler.latest_deployment(job_id, opts).await {
            Ok(deployment) => deployment,
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(Error::query(err)),
        };

        let status = deployment.map(|deployment| deployment.status).unwrap_or_default();
        if !status.is_empty() {
            debug!("DeploymentStatus:{} {}", job_id, status);
        }

        Ok(DeploymentStatus { status })
    }
}
