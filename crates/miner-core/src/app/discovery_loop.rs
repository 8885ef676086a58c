//! DiscoveryLoop - polls the chain and feeds the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{Span, debug, info_span, warn};

use super::orchestrator::{Discovery, Orchestrator};
use crate::background::{BackgroundTask, shutdown_requested};
use crate::domain::TaskId;
use crate::error::ChainError;
use crate::ports::ChainReader;

/// Outcome counts of one discovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Deferred tasks enqueued by the tick.
    pub retried: usize,
    pub polled: usize,
    pub enqueued: usize,
    pub deferred: usize,
    pub skipped: usize,
}

impl DiscoveryReport {
    fn record(&mut self, outcome: &Discovery) {
        match outcome {
            Discovery::Enqueued(_) => self.enqueued += 1,
            Discovery::Deferred => self.deferred += 1,
            Discovery::Duplicate | Discovery::Unsupported | Discovery::BelowMinFee => {
                self.skipped += 1
            }
        }
    }
}

pub struct DiscoveryLoop {
    chain: Arc<dyn ChainReader>,
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    span: Span,
}

impl DiscoveryLoop {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        orchestrator: Arc<Orchestrator>,
        interval: Duration,
    ) -> Self {
        Self {
            chain,
            orchestrator,
            interval,
            span: info_span!("discovery"),
        }
    }

    /// Retry due deferred tasks, then poll the chain once.
    pub async fn run_once(&self) -> Result<DiscoveryReport, ChainError> {
        let mut report = DiscoveryReport {
            retried: self.orchestrator.tick().await,
            ..DiscoveryReport::default()
        };

        let tasks = self.chain.poll_submitted().await?;
        report.polled = tasks.len();
        for task in tasks {
            let outcome = self.orchestrator.on_task_discovered(task).await;
            report.record(&outcome);
        }
        Ok(report)
    }

    /// Fetch one task by id and hand it to the orchestrator.
    /// `Ok(None)` when the chain does not know the task.
    pub async fn discover_by_id(&self, task_id: &TaskId) -> Result<Option<Discovery>, ChainError> {
        let Some(record) = self.chain.find_by_task_id(task_id).await? else {
            debug!(parent: &self.span, %task_id, "task not found on chain");
            return Ok(None);
        };
        debug!(parent: &self.span, %task_id, tx_hash = %record.tx_hash, "task found on chain");
        let outcome = self.orchestrator.on_task_discovered(record.to_submitted()).await;
        Ok(Some(outcome))
    }

    /// Run `run_once` every `interval` until shut down. Chain errors are
    /// logged and the loop keeps going.
    pub fn spawn(self: Arc<Self>) -> BackgroundTask {
        let span = self.span.clone();
        BackgroundTask::spawn("discovery", span, move |mut shutdown_rx| async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown_requested(&mut shutdown_rx) => break,
                    _ = ticker.tick() => match self.run_once().await {
                        Ok(report) if report.polled > 0 || report.retried > 0 => {
                            debug!(
                                polled = report.polled,
                                retried = report.retried,
                                enqueued = report.enqueued,
                                deferred = report.deferred,
                                skipped = report.skipped,
                                "discovery pass"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "chain poll failed"),
                    },
                }
            }
        })
    }
}
