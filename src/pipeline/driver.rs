//! Pipeline driver
//!
//! Owns a [`PipelineRun`] inside a tokio task that samples it on a fixed
//! interval and publishes snapshots. The ticker is released on every exit
//! path: completion ends the task, `cancel` aborts it, and dropping the
//! handle aborts it too.

use crate::pipeline::run::{PipelineRun, RunEvent, RunPhase, RunSnapshot, RunStatus};
use crate::Result;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

const MIN_TICK: Duration = Duration::from_millis(1);

/// Aborts the ticker task when dropped.
struct TickerGuard(Option<JoinHandle<()>>);

impl TickerGuard {
    fn release(&mut self) {
        if let Some(task) = self.0.take() {
            task.abort();
        }
    }
}

impl Drop for TickerGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Live handle to a running pipeline.
pub struct PipelineHandle {
    run_id: Uuid,
    snapshots: watch::Receiver<RunSnapshot>,
    ticker: TickerGuard,
}

impl PipelineHandle {
    /// Start `run` and begin ticking it. Must be called inside a tokio runtime.
    pub fn spawn(mut run: PipelineRun) -> Result<Self> {
        run.start()?;

        let run_id = run.run_id();
        let pacing = run.pacing();
        let (tx, rx) = watch::channel(run.snapshot());

        info!(
            run_id = %run_id,
            tick_ms = pacing.tick.as_millis() as u64,
            stage_ms = pacing.stage_dwell.as_millis() as u64,
            "Pipeline ticker started"
        );

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut interval = tokio::time::interval(pacing.tick.max(MIN_TICK));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                let events = run.advance(started.elapsed());
                for event in &events {
                    if let RunEvent::StageEntered { index, label } = event {
                        debug!(run_id = %run_id, index, label, "Stage entered");
                    }
                }

                if !events.is_empty() {
                    tx.send_replace(run.snapshot());
                }

                if run.phase().is_terminal() {
                    info!(run_id = %run_id, "Pipeline ticker finished");
                    break;
                }

                if tx.is_closed() {
                    debug!(run_id = %run_id, "No observers left, stopping ticker");
                    break;
                }
            }
        });

        Ok(Self {
            run_id,
            snapshots: rx,
            ticker: TickerGuard(Some(task)),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until the run reaches a terminal phase.
    pub async fn finished(&mut self) -> RunSnapshot {
        loop {
            {
                let current = self.snapshots.borrow_and_update();
                if current.is_terminal() {
                    return current.clone();
                }
            }
            if self.snapshots.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }

    /// Stop ticking immediately. A run that already completed stays completed.
    pub fn cancel(mut self) -> RunSnapshot {
        self.ticker.release();

        let last = self.snapshot();
        if last.is_terminal() {
            return last;
        }

        info!(run_id = %self.run_id, progress = last.progress, "Pipeline run cancelled");
        RunSnapshot {
            phase: RunPhase::Cancelled,
            status: RunStatus::Cancelled,
            status_text: "Cancelled".to_string(),
            ..last
        }
    }
}
