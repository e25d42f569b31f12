//! Fixed-tick scheduler

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// Drives a callback at a fixed period on a dedicated task. When the
/// callback overruns its slot, missed ticks are skipped rather than
/// bursted; the wall-clock delta handed to the simulation absorbs the
/// gap. An in-flight callback always runs to completion, shutdown is
/// only observed between ticks.
pub struct TickScheduler {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TickScheduler {
    pub fn spawn(period: Duration, mut tick: impl FnMut() + Send + 'static) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => tick(),
                }
            }
            debug!("Tick scheduler stopped");
        });
        Self {
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Stop the driver and wait for the current tick to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fires_at_the_configured_period_until_shutdown() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let scheduler = TickScheduler::spawn(Duration::from_millis(20), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(205)).await;
        let seen = count.load(Ordering::SeqCst);
        assert!((10..=11).contains(&seen), "saw {seen} ticks");

        scheduler.shutdown().await;
        let frozen = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), frozen);
    }
}
