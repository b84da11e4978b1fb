//! Staged pipeline state machine
//!
//! `Idle → Stage[0] → … → Stage[n-1] → Completed`, with `Cancelled` reachable
//! from any non-terminal state. Time is supplied by the caller as elapsed
//! duration since start, so the machine itself never reads a clock.

use crate::error::AssistantError;
use crate::pipeline::stage::{Pacing, StagePlan};
use crate::Result;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Stage(usize),
    Completed,
    Cancelled,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RunEvent {
    StageEntered { index: usize, label: &'static str },
    Progressed(f64),
    Completed,
    Cancelled,
}

/// Point-in-time view of a run, as published to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub phase: RunPhase,
    pub status: RunStatus,
    pub progress: f64,
    pub status_text: String,
    pub stage_count: usize,
}

impl RunSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

pub struct PipelineRun {
    run_id: Uuid,
    plan: StagePlan,
    pacing: Pacing,
    phase: RunPhase,
    progress: f64,
    last_elapsed: Duration,
}

impl PipelineRun {
    pub fn new(plan: StagePlan, pacing: Pacing) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            plan,
            pacing,
            phase: RunPhase::Idle,
            progress: 0.0,
            last_elapsed: Duration::ZERO,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    pub fn status(&self) -> RunStatus {
        match self.phase {
            RunPhase::Idle | RunPhase::Stage(_) => RunStatus::Running,
            RunPhase::Completed => RunStatus::Completed,
            RunPhase::Cancelled => RunStatus::Cancelled,
        }
    }

    /// Idle → Stage[0]. An empty plan completes immediately.
    pub fn start(&mut self) -> Result<Vec<RunEvent>> {
        if self.phase != RunPhase::Idle {
            return Err(AssistantError::InvalidTransition(format!(
                "run {} already started ({:?})",
                self.run_id, self.phase
            )));
        }

        match self.plan.get(0) {
            Some(stage) => {
                self.phase = RunPhase::Stage(0);
                debug!(run_id = %self.run_id, stage = stage.label, "Pipeline run started");
                Ok(vec![RunEvent::StageEntered {
                    index: 0,
                    label: stage.label,
                }])
            }
            None => {
                self.complete();
                Ok(vec![RunEvent::Completed])
            }
        }
    }

    /// Moves the run to where it should be `elapsed` after start.
    ///
    /// Stages are entered strictly in order even when one call skips past
    /// several of them. Elapsed values that go backwards are ignored.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<RunEvent> {
        let RunPhase::Stage(current) = self.phase else {
            return Vec::new();
        };

        let elapsed = elapsed.max(self.last_elapsed);
        self.last_elapsed = elapsed;

        let mut events = Vec::new();
        let dwell = self.pacing.stage_dwell;
        let reached = if dwell.is_zero() {
            self.plan.len()
        } else {
            (elapsed.as_nanos() / dwell.as_nanos()) as usize
        };

        let last_index = self.plan.len() - 1;
        for index in (current + 1)..=reached.min(last_index) {
            if let Some(stage) = self.plan.get(index) {
                self.phase = RunPhase::Stage(index);
                events.push(RunEvent::StageEntered {
                    index,
                    label: stage.label,
                });
            }
        }

        if reached >= self.plan.len() {
            self.complete();
            events.push(RunEvent::Progressed(self.progress));
            events.push(RunEvent::Completed);
            return events;
        }

        let start = f64::from(self.plan.start_percent(reached));
        let target = self
            .plan
            .get(reached)
            .map(|s| f64::from(s.target_percent))
            .unwrap_or(100.0);
        let into_stage = elapsed.saturating_sub(dwell * reached as u32);
        let fraction = into_stage.as_secs_f64() / dwell.as_secs_f64();
        let sampled = (start + (target - start) * fraction).clamp(0.0, 100.0);

        if sampled > self.progress {
            self.progress = sampled;
            events.push(RunEvent::Progressed(sampled));
        }

        events
    }

    /// Any non-terminal phase → Cancelled. Returns false if already terminal.
    pub fn cancel(&mut self) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        debug!(run_id = %self.run_id, phase = ?self.phase, "Pipeline run cancelled");
        self.phase = RunPhase::Cancelled;
        true
    }

    fn complete(&mut self) {
        self.progress = 100.0;
        self.phase = RunPhase::Completed;
        debug!(run_id = %self.run_id, "Pipeline run completed");
    }

    pub fn status_text(&self) -> String {
        match self.phase {
            RunPhase::Idle => "Waiting to start".to_string(),
            RunPhase::Stage(index) => self
                .plan
                .get(index)
                .map(|s| format!("{}...", s.label))
                .unwrap_or_default(),
            RunPhase::Completed => "Completed".to_string(),
            RunPhase::Cancelled => "Cancelled".to_string(),
        }
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            run_id: self.run_id,
            phase: self.phase,
            status: self.status(),
            progress: self.progress,
            status_text: self.status_text(),
            stage_count: self.plan.len(),
        }
    }
}
