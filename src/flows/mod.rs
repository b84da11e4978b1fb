//! Flow controllers
//!
//! One controller per open operation (swap, stake, yield, DCA, portfolio,
//! project analysis). It owns the operation's parameters and its pipeline
//! run, and exposes confirm / edit / close.

use crate::error::AssistantError;
use crate::intent::patterns::display_frequency;
use crate::models::{Command, FlowKind};
use crate::pipeline::{
    Pacing, PipelineHandle, PipelineRun, PipelineStage, RunSnapshot, RunStatus, StagePlan,
};
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_STAKE_PROTOCOL: &str = "Lido";
pub const DEFAULT_YIELD_PROTOCOL: &str = "Aave";

const SWAP_STAGES: StagePlan = StagePlan::new(&[
    PipelineStage::new("Analyzing route", 25),
    PipelineStage::new("Preparing transaction", 50),
    PipelineStage::new("Executing swap", 75),
    PipelineStage::new("Confirming", 100),
]);

const STAKE_STAGES: StagePlan = StagePlan::new(&[
    PipelineStage::new("Analyzing validators", 25),
    PipelineStage::new("Preparing stake", 50),
    PipelineStage::new("Staking", 75),
    PipelineStage::new("Confirming", 100),
]);

const YIELD_STAGES: StagePlan = StagePlan::new(&[
    PipelineStage::new("Searching pools", 33),
    PipelineStage::new("Reviewing strategy", 66),
    PipelineStage::new("Depositing", 100),
]);

const DCA_STAGES: StagePlan = StagePlan::new(&[
    PipelineStage::new("Analyzing schedule", 25),
    PipelineStage::new("Preparing orders", 50),
    PipelineStage::new("Scheduling", 75),
    PipelineStage::new("Confirming", 100),
]);

const PORTFOLIO_STAGES: StagePlan = StagePlan::new(&[
    PipelineStage::new("Analyzing holdings", 25),
    PipelineStage::new("Building allocation", 50),
    PipelineStage::new("Executing trades", 75),
    PipelineStage::new("Confirming", 100),
]);

const ANALYSIS_STAGES: StagePlan = StagePlan::new(&[
    PipelineStage::new("Fetching project data", 25),
    PipelineStage::new("Reviewing fundamentals", 50),
    PipelineStage::new("Scoring risk", 75),
    PipelineStage::new("Compiling report", 100),
]);

pub fn stage_plan(kind: FlowKind) -> StagePlan {
    match kind {
        FlowKind::Swap => SWAP_STAGES,
        FlowKind::Stake => STAKE_STAGES,
        FlowKind::Yield => YIELD_STAGES,
        FlowKind::Dca => DCA_STAGES,
        FlowKind::Portfolio => PORTFOLIO_STAGES,
        FlowKind::Analysis => ANALYSIS_STAGES,
    }
}

//
// ================= Requests =================
//

/// Operation parameters. Which fields apply depends on the flow kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlowParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlowRequest {
    pub kind: FlowKind,
    pub params: FlowParams,
}

impl FlowRequest {
    /// Empty request for `kind`, with protocol defaults applied.
    pub fn blank(kind: FlowKind) -> Self {
        let protocol = match kind {
            FlowKind::Stake => Some(DEFAULT_STAKE_PROTOCOL.to_string()),
            FlowKind::Yield => Some(DEFAULT_YIELD_PROTOCOL.to_string()),
            _ => None,
        };

        Self {
            kind,
            params: FlowParams {
                protocol,
                ..FlowParams::default()
            },
        }
    }

    /// Request a command opens, prefilled with its slots.
    pub fn from_command(command: &Command) -> Option<Self> {
        let mut request = Self::blank(command.flow_kind()?);

        match command {
            Command::SwapQuery {
                amount,
                from_token,
                to_token,
            } => {
                request.params.amount = Some(amount.clone());
                request.params.from_token = Some(from_token.clone());
                request.params.to_token = Some(to_token.clone());
            }
            Command::DcaSetup {
                amount,
                token,
                frequency,
            } => {
                request.params.amount = Some(amount.clone());
                request.params.token = Some(token.clone());
                request.params.frequency = Some(frequency.clone());
            }
            Command::ProjectAnalysis { project_name } => {
                request.params.project_name = Some(project_name.clone());
            }
            _ => {}
        }

        Some(request)
    }

    /// Parameters that must be filled in before the flow can be confirmed.
    pub fn missing_params(&self) -> Vec<&'static str> {
        let p = &self.params;
        let required: Vec<(&'static str, &Option<String>)> = match self.kind {
            FlowKind::Swap => vec![
                ("amount", &p.amount),
                ("from_token", &p.from_token),
                ("to_token", &p.to_token),
            ],
            FlowKind::Dca => vec![
                ("amount", &p.amount),
                ("token", &p.token),
                ("frequency", &p.frequency),
            ],
            FlowKind::Stake | FlowKind::Yield => vec![("protocol", &p.protocol)],
            FlowKind::Analysis => vec![("project_name", &p.project_name)],
            FlowKind::Portfolio => Vec::new(),
        };

        required
            .into_iter()
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(name, _)| name)
            .collect()
    }

    /// One-line description used in acknowledgements.
    pub fn summary(&self) -> String {
        let p = &self.params;
        let or_blank = |v: &Option<String>| v.clone().unwrap_or_else(|| "?".to_string());

        match self.kind {
            FlowKind::Swap if p.amount.is_some() => format!(
                "Swap {} {} for {}",
                or_blank(&p.amount),
                or_blank(&p.from_token),
                or_blank(&p.to_token)
            ),
            FlowKind::Dca if p.amount.is_some() => format!(
                "DCA {} into {} ({})",
                or_blank(&p.amount),
                or_blank(&p.token),
                or_blank(&p.frequency)
            ),
            FlowKind::Analysis if p.project_name.is_some() => {
                format!("Analyze project {}", or_blank(&p.project_name))
            }
            FlowKind::Stake | FlowKind::Yield => {
                format!("{} via {}", self.kind, or_blank(&p.protocol))
            }
            kind => kind.to_string(),
        }
    }
}

/// Single-field change made before confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FlowEdit {
    Amount(String),
    FromToken(String),
    ToToken(String),
    Token(String),
    Frequency(String),
    Protocol(String),
}

impl FlowEdit {
    fn applies_to(&self, kind: FlowKind) -> bool {
        match self {
            FlowEdit::Amount(_) => !matches!(kind, FlowKind::Analysis | FlowKind::Portfolio),
            FlowEdit::FromToken(_) | FlowEdit::ToToken(_) => kind == FlowKind::Swap,
            FlowEdit::Token(_) => matches!(kind, FlowKind::Stake | FlowKind::Yield | FlowKind::Dca),
            FlowEdit::Frequency(_) => kind == FlowKind::Dca,
            FlowEdit::Protocol(_) => matches!(kind, FlowKind::Stake | FlowKind::Yield),
        }
    }

    fn apply(self, params: &mut FlowParams) -> Result<()> {
        match self {
            FlowEdit::Amount(amount) => {
                let amount = amount.trim().to_string();
                match amount.parse::<f64>() {
                    Ok(value) if value.is_finite() && value > 0.0 => params.amount = Some(amount),
                    _ => {
                        return Err(AssistantError::InvalidEdit(format!(
                            "'{}' is not a valid amount",
                            amount
                        )))
                    }
                }
            }
            FlowEdit::FromToken(token) => params.from_token = Some(token.trim().to_uppercase()),
            FlowEdit::ToToken(token) => params.to_token = Some(token.trim().to_uppercase()),
            FlowEdit::Token(token) => params.token = Some(token.trim().to_uppercase()),
            FlowEdit::Frequency(frequency) => {
                params.frequency = Some(display_frequency(frequency.trim()))
            }
            FlowEdit::Protocol(protocol) => params.protocol = Some(protocol.trim().to_string()),
        }
        Ok(())
    }
}

//
// ================= Controller =================
//

enum RunSlot {
    Pending(PipelineRun),
    Running(PipelineHandle),
    Finished(RunSnapshot),
}

/// What the UI renders for the open flow.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FlowView {
    pub flow_id: Uuid,
    pub kind: FlowKind,
    pub params: FlowParams,
    pub summary: String,
    pub stages: Vec<&'static str>,
    /// Parameters still needed before confirmation.
    pub missing_params: Vec<&'static str>,
    pub confirmed: bool,
    pub run: RunSnapshot,
}

pub struct FlowController {
    flow_id: Uuid,
    request: FlowRequest,
    run: RunSlot,
}

impl FlowController {
    /// A fresh run at Idle is created every time a flow opens.
    pub fn open(flow_id: Uuid, request: FlowRequest, pacing: Pacing) -> Self {
        let run = PipelineRun::new(stage_plan(request.kind), pacing);

        info!(
            flow_id = %flow_id,
            kind = %request.kind,
            summary = %request.summary(),
            "Flow opened"
        );

        Self {
            flow_id,
            request,
            run: RunSlot::Pending(run),
        }
    }

    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    pub fn request(&self) -> &FlowRequest {
        &self.request
    }

    pub fn is_confirmed(&self) -> bool {
        !matches!(self.run, RunSlot::Pending(_))
    }

    pub fn edit(&mut self, edit: FlowEdit) -> Result<()> {
        if self.is_confirmed() {
            return Err(AssistantError::InvalidEdit(
                "flow already confirmed".to_string(),
            ));
        }
        if !edit.applies_to(self.request.kind) {
            return Err(AssistantError::InvalidEdit(format!(
                "{:?} does not apply to a {} flow",
                edit, self.request.kind
            )));
        }
        edit.apply(&mut self.request.params)
    }

    /// Idle → running. Starts the ticker. Rejected while parameters are missing.
    pub fn confirm(&mut self) -> Result<RunSnapshot> {
        let missing = self.request.missing_params();
        if !self.is_confirmed() && !missing.is_empty() {
            return Err(AssistantError::InvalidEdit(format!(
                "cannot confirm {} flow, missing {}",
                self.request.kind,
                missing.join(", ")
            )));
        }

        let placeholder = self.snapshot();
        let slot = std::mem::replace(&mut self.run, RunSlot::Finished(placeholder));

        match slot {
            RunSlot::Pending(run) => {
                let handle = PipelineHandle::spawn(run)?;
                let snapshot = handle.snapshot();
                info!(flow_id = %self.flow_id, run_id = %handle.run_id(), "Flow confirmed");
                self.run = RunSlot::Running(handle);
                Ok(snapshot)
            }
            other => {
                self.run = other;
                Err(AssistantError::InvalidTransition(format!(
                    "flow {} is already confirmed",
                    self.flow_id
                )))
            }
        }
    }

    pub fn snapshot(&self) -> RunSnapshot {
        match &self.run {
            RunSlot::Pending(run) => run.snapshot(),
            RunSlot::Running(handle) => handle.snapshot(),
            RunSlot::Finished(snapshot) => snapshot.clone(),
        }
    }

    /// Waits for the run to finish. Returns immediately if not confirmed.
    pub async fn finished(&mut self) -> RunSnapshot {
        match &mut self.run {
            RunSlot::Running(handle) => handle.finished().await,
            RunSlot::Pending(run) => run.snapshot(),
            RunSlot::Finished(snapshot) => snapshot.clone(),
        }
    }

    /// Close the flow. Any unfinished run is cancelled and its ticker released.
    pub fn close(self) -> RunSnapshot {
        let outcome = match self.run {
            RunSlot::Pending(mut run) => {
                run.cancel();
                run.snapshot()
            }
            RunSlot::Running(handle) => handle.cancel(),
            RunSlot::Finished(snapshot) => snapshot,
        };

        if outcome.status == RunStatus::Cancelled {
            warn!(flow_id = %self.flow_id, progress = outcome.progress, "Flow closed before completion");
        } else {
            info!(flow_id = %self.flow_id, "Flow closed");
        }

        outcome
    }

    pub fn view(&self) -> FlowView {
        FlowView {
            flow_id: self.flow_id,
            kind: self.request.kind,
            params: self.request.params.clone(),
            summary: self.request.summary(),
            stages: stage_plan(self.request.kind)
                .stages()
                .iter()
                .map(|s| s.label)
                .collect(),
            missing_params: self.request.missing_params(),
            confirmed: self.is_confirmed(),
            run: self.snapshot(),
        }
    }
}
