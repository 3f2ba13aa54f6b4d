use chrono::{Local, NaiveTime, Timelike};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::pipeline::Pipeline;

/// Six-field cron expression firing once a day at `at`.
pub fn daily_cron(at: NaiveTime) -> String {
    format!("0 {} {} * * *", at.minute(), at.hour())
}

/// Runs `task` unless another run holds `lock`; `None` when skipped.
pub async fn run_exclusive<F: Future>(lock: &Mutex<()>, task: F) -> Option<F::Output> {
    let Ok(_guard) = lock.try_lock() else {
        warn!("⏭️ Previous run is still active, skipping this one");
        return None;
    };
    Some(task.await)
}

/// Runs the pipeline every day at `at` local time until Ctrl-C.
pub async fn run_daily(pipeline: Arc<Pipeline>, at: NaiveTime) -> anyhow::Result<()> {
    let mut sched = JobScheduler::new().await?;
    let lock = Arc::new(Mutex::new(()));
    let cron = daily_cron(at);

    let job = Job::new_async_tz(cron.as_str(), Local, move |_, _| {
        let pipeline = pipeline.clone();
        let lock = lock.clone();
        Box::pin(async move {
            info!("⏰ Scheduled run starting");
            if let Some(outcome) = run_exclusive(&lock, pipeline.run()).await {
                info!("⏰ Scheduled run finished: {}", outcome);
            }
        })
    })?;

    sched.add(job).await?;
    sched.start().await?;
    info!("📅 Scheduled daily run at {} ({})", at.format("%H:%M"), cron);

    tokio::signal::ctrl_c().await?;
    info!("👋 Shutting down scheduler");
    sched.shutdown().await?;
    Ok(())
}
