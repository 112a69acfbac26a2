use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};

use crate::error::Result;
use crate::ingest::IngestionJob;

/// Register `job` on a cron `schedule` (6 fields, seconds first) and start
/// ticking. Cycles are not serialized: a slow cycle may overlap the next tick.
pub async fn start(job: Arc<IngestionJob>, schedule: &str) -> Result<JobScheduler> {
    let sched = JobScheduler::new().await?;

    let cron_job = Job::new_async(schedule, move |uuid, _l| {
        let job = Arc::clone(&job);
        Box::pin(async move {
            debug!(%uuid, "Ingestion tick");
            job.run_cycle().await;
        })
    })?;
    sched.add(cron_job).await?;
    sched.start().await?;

    info!("Ingestion scheduled: {schedule}");
    Ok(sched)
}
