//! Stage plans and pacing for simulated transactions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default sampling interval for progress updates.
pub const DEFAULT_TICK_MS: u64 = 30;
/// Default time spent in each stage.
pub const DEFAULT_STAGE_MS: u64 = 1500;

/// One named stage with the progress percentage reached when it completes.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PipelineStage {
    pub label: &'static str,
    pub target_percent: u8,
}

impl PipelineStage {
    pub const fn new(label: &'static str, target_percent: u8) -> Self {
        Self {
            label,
            target_percent,
        }
    }
}

/// Ordered stage list. Targets are strictly increasing and the last one is 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePlan {
    stages: &'static [PipelineStage],
}

impl StagePlan {
    pub const fn new(stages: &'static [PipelineStage]) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &'static [PipelineStage] {
        self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'static PipelineStage> {
        self.stages.get(index)
    }

    /// Progress at which stage `index` starts.
    pub fn start_percent(&self, index: usize) -> u8 {
        match index {
            0 => 0,
            i => self.stages.get(i - 1).map(|s| s.target_percent).unwrap_or(100),
        }
    }

    pub fn is_well_formed(&self) -> bool {
        let increasing = self
            .stages
            .windows(2)
            .all(|w| w[0].target_percent < w[1].target_percent);
        let ends_at_100 = self.stages.last().map(|s| s.target_percent) == Some(100);
        increasing && ends_at_100
    }
}

/// Timing for stage advancement: fixed dwell per stage, sampled every tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pacing {
    #[serde(with = "millis")]
    pub tick: Duration,
    #[serde(with = "millis")]
    pub stage_dwell: Duration,
}

impl Pacing {
    pub fn new(tick: Duration, stage_dwell: Duration) -> Self {
        Self { tick, stage_dwell }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(DEFAULT_TICK_MS),
            stage_dwell: Duration::from_millis(DEFAULT_STAGE_MS),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
