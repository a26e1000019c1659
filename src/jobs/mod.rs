/// Periodic maintenance jobs
use crate::context::AppContext;
use std::{future::Future, sync::Arc};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

pub mod tasks;

const MAINTENANCE_PERIOD: Duration = Duration::from_secs(300);

/// Runs maintenance tasks on a fixed period for the lifetime of the process
pub struct JobScheduler {
    context: Arc<AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    pub fn start(self: Arc<Self>) {
        let ctx = Arc::clone(&self.context);
        spawn_periodic("stale_report_recovery", MAINTENANCE_PERIOD, move || {
            let ctx = Arc::clone(&ctx);
            async move {
                let count = tasks::recover_stale_reports(&ctx).await?;
                if count > 0 {
                    info!("Marked {} stale pending reports as failed", count);
                }
                Ok(())
            }
        });

        let ctx = Arc::clone(&self.context);
        spawn_periodic("health_check", MAINTENANCE_PERIOD, move || {
            let ctx = Arc::clone(&ctx);
            async move { tasks::health_check(&ctx).await }
        });

        info!("Maintenance jobs scheduled every {}s", MAINTENANCE_PERIOD.as_secs());
    }
}

/// Spawn `run` every `period`, recording each outcome under `job`
fn spawn_periodic<F, Fut>(job: &'static str, period: Duration, run: F)
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = crate::error::AppResult<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match run().await {
                Ok(()) => crate::metrics::record_background_job(job, "success"),
                Err(e) => {
                    crate::metrics::record_background_job(job, "failure");
                    error!(job, "Maintenance job failed: {}", e);
                }
            }
        }
    });
}
