use crate::schedulers::scheduler::SchedulerError;

/// Utility enum that covers all possible errors during reconciliation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source or job definition cannot be acted upon, typically missing fields.
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    /// The live job exists but does not carry this source's ownership metadata
    #[error("Job {job} is not managed by source {source_id}")]
    OwnershipError { job: String, source_id: String },

    /// Listing, fetching, planning or status lookups against Nomad failed
    #[error("Nomad query failed: {source}")]
    ClusterQueryError {
        #[source]
        source: SchedulerError,
    },

    /// Registering a namespace or job, or deregistering a job, failed
    #[error("Nomad write failed: {source}")]
    ClusterWriteError {
        #[source]
        source: SchedulerError,
    },

    /// The event stream could not be established
    #[error("Nomad event subscription failed: {source}")]
    SubscriptionError {
        #[source]
        source: SchedulerError,
    },

    /// Job changes stopped arriving although nobody cancelled the watch
    #[error("Nomad event watch stopped without being cancelled")]
    WatchStopped,

    /// A single event could not be decoded; never fatal to a subscription
    #[error("Undecodable Nomad event: {source}")]
    EventDecodeError {
        #[from]
        source: serde_json::Error,
    },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    pub fn query(source: SchedulerError) -> Self {
        Error::ClusterQueryError { source }
    }

    pub fn write(source: SchedulerError) -> Self {
        Error::ClusterWriteError { source }
    }
}
