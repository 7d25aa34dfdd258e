//! The auto-download loop: runs a scheduling cycle on a fixed interval while enabled.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::Scheduler;

#[derive(Default)]
struct AutoState {
    enabled: bool,
    task: Option<JoinHandle<()>>,
}

/// Owner of the auto-download flag and its background task.
pub struct AutoDownload {
    scheduler: Arc<Scheduler>,
    interval: Duration,
    state: Mutex<AutoState>,
}

impl AutoDownload {
    pub fn new(scheduler: Arc<Scheduler>, interval: Duration) -> Self {
        Self {
            scheduler,
            interval: interval.max(Duration::from_millis(10)),
            state: Mutex::new(AutoState::default()),
        }
    }

    pub async fn is_enabled(&self) -> bool {
        self.state.lock().await.enabled
    }

    /// Enable or disable the loop. Returns the previous value.
    pub async fn set_enabled(&self, enabled: bool) -> bool {
        let mut state = self.state.lock().await;
        let previous = state.enabled;
        state.enabled = enabled;

        if enabled && state.task.is_none() {
            let scheduler = Arc::clone(&self.scheduler);
            let interval = self.interval;
            state.task = Some(tokio::spawn(run_loop(scheduler, interval)));
            tracing::info!(interval_secs = interval.as_secs_f64(), "auto-download enabled");
        } else if !enabled {
            if let Some(task) = state.task.take() {
                task.abort();
                tracing::info!("auto-download disabled");
            }
        }
        previous
    }
}

impl Drop for AutoDownload {
    fn drop(&mut self) {
        if let Some(task) = self.state.get_mut().task.take() {
            task.abort();
        }
    }
}

async fn run_loop(scheduler: Arc<Scheduler>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        // Own task per cycle so an error or panic never ends the loop.
        let cycle = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.run_cycle().await }
        });
        match cycle.await {
            Ok(Ok(report)) => {
                if !report.started.is_empty() {
                    tracing::debug!(started = ?report.started, "auto-download cycle");
                }
            }
            Ok(Err(e)) => tracing::error!("auto-download cycle failed: {:#}", e),
            Err(e) => tracing::error!("auto-download cycle panicked: {}", e),
        }
    }
}
