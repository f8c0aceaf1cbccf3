use log::{error, info};
use tokio_util::sync::CancellationToken;

use nomad_ops::models::source::Source;
use nomad_ops::utils::config::Config;
use nomad_ops::{Error, JobController, NomadClient};

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(err) = run().await {
        error!("nomad-ops stopped: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    let config = Config::from_env()?;
    let sources: Vec<Source> = config.load_sources()?;

    // The client is handed to the controller, there is no process wide session
    let controller = JobController::new(NomadClient::new(&config)?);
    info!(
        "watching Nomad at {} for {} source(s)",
        controller.url(),
        sources.len()
    );

    let cancel = CancellationToken::new();
    let mut changes = controller
        .subscribe_job_changes(cancel.clone(), config.event_buffer)
        .await?;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutting down");
        }
        shutdown.cancel();
    });

    while let Some(change) = changes.recv().await {
        let job_name = change.job_name();
        info!("job change: {:?}", change);

        for source in sources.iter() {
            // errors are left to the next change to recover from
            match controller.get_current_cluster_state(source).await {
                Ok(state) => {
                    let managed = state.current_jobs.contains_key(job_name);
                    info!(
                        "source {}: {} job(s) managed, {} managed: {}",
                        source.id,
                        state.current_jobs.len(),
                        job_name,
                        managed
                    );
                }
                Err(err) => error!("source {}: reading cluster state failed: {}", source.id, err),
            }
        }
    }

    if !cancel.is_cancelled() {
        return Err(Error::WatchStopped);
    }

    Ok(())
}
