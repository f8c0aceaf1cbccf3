use futures::StreamExt;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::controllers::job::JobController;
use crate::models::event::{EventBatch, JobChange, Topic};
use crate::schedulers::scheduler::{EventStream, QueryOptions, Scheduler};
use crate::utils::error::Error;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Receiving end of a job change subscription.
pub struct JobChanges {
    receiver: mpsc::Receiver<JobChange>,
    cancel: CancellationToken,
}

impl JobChanges {
    /// Next change in stream order.
    ///
    /// Returns `None` as soon as the subscription is cancelled, even if changes are still
    /// buffered, or once the watch task has stopped.
    pub async fn recv(&mut self) -> Option<JobChange> {
        if self.cancel.is_cancelled() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            change = self.receiver.recv() => change,
        }
    }
}

impl<S: Scheduler + 'static> JobController<S> {
    /// Subscribes to job and deployment events across all namespaces.
    ///
    /// # Arguments:
    /// - `cancel` - Stops the watch and closes the returned `JobChanges`.
    /// - `capacity` - Number of changes buffered before the stream reader waits.
    ///
    /// Note: Only a failure to open the stream is reported here. A stream that closes later
    /// is reopened from the index following the last batch seen, backing off between attempts.
    pub async fn subscribe_job_changes(
        &self,
        cancel: CancellationToken,
        capacity: usize,
    ) -> Result<JobChanges, Error> {
        let index = match self.scheduler.last_job_index().await {
            Ok(index) => index,
            Err(err) => {
                debug!("no job index, streaming from the start: {}", err);
                0
            }
        };

        let topics = vec![
            (Topic::Job, "*".to_string()),
            (Topic::Deployment, "*".to_string()),
        ];
        let events = self
            .scheduler
            .event_stream(&topics, index, &QueryOptions::all_namespaces())
            .await
            .map_err(|source| Error::SubscriptionError { source })?;

        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let watch = Watch {
            scheduler: Arc::clone(&self.scheduler),
            topics,
            index,
            sender,
            cancel: cancel.clone(),
        };
        tokio::spawn(watch.run(events));

        Ok(JobChanges { receiver, cancel })
    }
}

struct Watch<S> {
    scheduler: Arc<S>,
    topics: Vec<(Topic, String)>,
    // next index to resume from
    index: u64,
    sender: mpsc::Sender<JobChange>,
    cancel: CancellationToken,
}

impl<S: Scheduler> Watch<S> {
    async fn run(mut self, mut events: EventStream) {
        loop {
            let batch = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                batch = events.next() => batch,
            };

            let batch = match batch {
                Some(Ok(batch)) => batch,
                Some(Err(err)) => {
                    warn!("skipping Nomad event frame: {}", err);
                    continue;
                }
                None => match self.reconnect().await {
                    Some(reopened) => {
                        events = reopened;
                        continue;
                    }
                    None => return,
                },
            };

            if batch.is_heartbeat() {
                continue;
            }
            self.index = self.index.max(batch.index + 1);

            for change in changes(&batch) {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return,
                    sent = self.sender.send(change) => {
                        if sent.is_err() {
                            debug!("job change receiver dropped, stopping watch");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Reopens the event stream, `None` once cancelled.
    async fn reconnect(&self) -> Option<EventStream> {
        let mut delay = RECONNECT_DELAY;

        loop {
            info!(
                "Nomad event stream closed, reconnecting from index {} in {:?}",
                self.index, delay
            );
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            match self
                .scheduler
                .event_stream(&self.topics, self.index, &QueryOptions::all_namespaces())
                .await
            {
                Ok(events) => return Some(events),
                Err(err) => {
                    warn!("reopening Nomad event stream failed: {}", err);
                    delay = (delay * 2).min(MAX_RECONNECT_DELAY);
                }
            }
        }
    }
}

/// Job changes carried by a batch; events that fail to decode are dropped.
pub fn changes(batch: &EventBatch) -> Vec<JobChange> {
    batch
        .events()
        .iter()
        .filter_map(|event| {
            debug!("Received nomad event:{}", event.event_type);

            match JobChange::from_event(event) {
                Ok(change) => change,
                Err(source) => {
                    debug!("{}", Error::from(source));
                    None
                }
            }
        })
        .collect()
}
