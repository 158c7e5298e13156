//! Scheduler trigger.
//!
//! Drives [`Pipeline::run_cycle`] either once (for an external cron) or on an
//! in-process interval. Cycle errors are logged here and never escape the
//! loop; the next tick re-evaluates from durable state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::error::CycleError;
use crate::pipeline::{CycleOutcome, Pipeline};

/// Shortest interval the loop will run at.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Periodic driver for a [`Pipeline`].
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    interval: Duration,
}

impl Scheduler {
    /// `interval` is raised to [`MIN_INTERVAL`] when shorter.
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>, interval: Duration) -> Self {
        Self {
            pipeline,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Fire a single cycle, logging its result.
    pub async fn trigger(&self) -> Result<CycleOutcome, CycleError> {
        trigger(&self.pipeline).await
    }

    /// Fire cycles on the interval until `shutdown` resolves.
    ///
    /// The first cycle runs immediately. Returns the number of cycles run.
    pub async fn run_until<F>(&self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_secs = self.interval.as_secs(), "Scheduler started");

        let mut cycles = 0;
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!(cycles, "Scheduler stopping");
                    return cycles;
                }
                _ = ticker.tick() => {
                    let _ = self.trigger().await;
                    cycles += 1;
                }
            }
        }
    }
}

/// Run one cycle of `pipeline`, logging success or failure at the boundary.
pub async fn trigger(pipeline: &Pipeline) -> Result<CycleOutcome, CycleError> {
    let result = pipeline.run_cycle().await;
    match &result {
        Ok(outcome) => info!(outcome = ?outcome, "Cycle complete"),
        Err(e) => error!(kind = e.kind(), error = %e, "Cycle failed"),
    }
    result
}
