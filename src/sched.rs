use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cfg::SchedulerOptions;

#[derive(Debug, Error)]
pub enum SchedError {
    #[error("ping interval must be greater than zero")]
    ZeroInterval,
    #[error("max_instances must be at least 1")]
    ZeroMaxInstances,
}

/// Handle to a running tick loop. The loop lives on its own tokio task and
/// fires `on_tick` immediately on start, then once per interval measured
/// from start, never overlapping with itself.
#[derive(Debug)]
pub struct Scheduler {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn start<F, Fut>(interval: Duration, options: &SchedulerOptions, on_tick: F) -> Result<Scheduler, SchedError>
        where F: Fn() -> Fut + Send + 'static,
              Fut: Future<Output = ()> + Send + 'static,
    {
        if interval.is_zero() {
            return Err(SchedError::ZeroInterval);
        }
        if options.max_instances == 0 {
            return Err(SchedError::ZeroMaxInstances);
        }
        if options.max_instances > 1 {
            warn!("tick executions never overlap; capping max_instances from {} to 1", options.max_instances);
        }

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(tick_loop(interval, options.coalesce, on_tick, shutdown.clone()));
        info!("scheduler started with {} interval", humantime::Duration::from(interval));

        Ok(Scheduler { shutdown, handle })
    }

    /// Cancels the tick loop and waits until it has fully quiesced.
    /// No tick fires after this returns.
    pub async fn stop(self)
    {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            error!("scheduler task failed: {}", e);
        }
        info!("scheduler stopped");
    }
}

async fn tick_loop<F, Fut>(interval: Duration, coalesce: bool, on_tick: F, shutdown: CancellationToken)
    where F: Fn() -> Fut,
          Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    // the first tick completes immediately, giving the initial ping
    ticker.set_missed_tick_behavior(if coalesce {
        MissedTickBehavior::Skip
    } else {
        MissedTickBehavior::Burst
    });

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => (),
        };
        // awaited inline: a slow tick delays the next one, never duplicates it
        on_tick().await;
    }

    debug!("tick loop stopped");
}
