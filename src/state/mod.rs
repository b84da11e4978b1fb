//! Application state
//!
//! Which flow or page is open is explicit state changed only through
//! [`reduce`], a pure transition function. [`AppController`] owns that state
//! plus the resources it implies (the live flow controller, the transcript)
//! and carries out the effects each transition asks for.

use crate::error::AssistantError;
use crate::flows::{FlowController, FlowEdit, FlowRequest, FlowView};
use crate::models::{FlowKind, NavigationTarget};
use crate::pipeline::{Pacing, RunSnapshot};
use crate::transcript::{Transcript, Turn};
use crate::Result;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "view", content = "target", rename_all = "snake_case")]
pub enum View {
    Chat,
    Flow(FlowKind),
    Page(NavigationTarget),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ActiveFlow {
    pub flow_id: Uuid,
    pub kind: FlowKind,
    pub confirmed: bool,
}

/// At most one flow is open at a time.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct AppState {
    pub view: View,
    pub active_flow: Option<ActiveFlow>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            view: View::Chat,
            active_flow: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    OpenFlow(FlowRequest),
    EditFlow(FlowEdit),
    ConfirmFlow,
    CloseFlow,
    Navigate(NavigationTarget),
}

/// Work the controller performs after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEffect {
    CloseFlow { flow_id: Uuid },
    OpenFlow { flow_id: Uuid, request: FlowRequest },
    ApplyEdit { flow_id: Uuid, edit: FlowEdit },
    StartPipeline { flow_id: Uuid },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: AppState,
    pub effects: Vec<AppEffect>,
}

/// Pure state transition. Opening a flow always supersedes the open one.
pub fn reduce(state: &AppState, action: AppAction) -> Result<Transition> {
    let mut next = *state;
    let mut effects = Vec::new();

    match action {
        AppAction::OpenFlow(request) => {
            if let Some(active) = state.active_flow {
                effects.push(AppEffect::CloseFlow {
                    flow_id: active.flow_id,
                });
            }
            let flow_id = Uuid::new_v4();
            next.active_flow = Some(ActiveFlow {
                flow_id,
                kind: request.kind,
                confirmed: false,
            });
            next.view = View::Flow(request.kind);
            effects.push(AppEffect::OpenFlow { flow_id, request });
        }
        AppAction::EditFlow(edit) => {
            let active = state.active_flow.ok_or(AssistantError::NoActiveFlow)?;
            if active.confirmed {
                return Err(AssistantError::InvalidEdit(
                    "flow already confirmed".to_string(),
                ));
            }
            effects.push(AppEffect::ApplyEdit {
                flow_id: active.flow_id,
                edit,
            });
        }
        AppAction::ConfirmFlow => {
            let active = state.active_flow.ok_or(AssistantError::NoActiveFlow)?;
            if active.confirmed {
                return Err(AssistantError::InvalidTransition(format!(
                    "flow {} is already confirmed",
                    active.flow_id
                )));
            }
            next.active_flow = Some(ActiveFlow {
                confirmed: true,
                ..active
            });
            effects.push(AppEffect::StartPipeline {
                flow_id: active.flow_id,
            });
        }
        AppAction::CloseFlow => {
            let active = state.active_flow.ok_or(AssistantError::NoActiveFlow)?;
            next.active_flow = None;
            next.view = View::Chat;
            effects.push(AppEffect::CloseFlow {
                flow_id: active.flow_id,
            });
        }
        AppAction::Navigate(target) => match target.flow_kind() {
            Some(kind) => return reduce(state, AppAction::OpenFlow(FlowRequest::blank(kind))),
            None => {
                if let Some(active) = state.active_flow {
                    effects.push(AppEffect::CloseFlow {
                        flow_id: active.flow_id,
                    });
                }
                next.active_flow = None;
                next.view = View::Page(target);
            }
        },
    }

    Ok(Transition {
        state: next,
        effects,
    })
}

/// Single owner of the application state and the resources it implies.
pub struct AppController {
    state: AppState,
    flow: Option<FlowController>,
    transcript: Transcript,
    pacing: Pacing,
    last_outcome: Option<RunSnapshot>,
}

impl AppController {
    pub fn new(pacing: Pacing, transcript_capacity: usize) -> Self {
        Self {
            state: AppState::default(),
            flow: None,
            transcript: Transcript::with_capacity(transcript_capacity),
            pacing,
            last_outcome: None,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn dispatch(&mut self, action: AppAction) -> Result<()> {
        debug!(action = ?action, "Dispatching app action");
        let transition = reduce(&self.state, action)?;

        // State only moves once every effect has been carried out.
        for effect in transition.effects {
            self.apply(effect)?;
        }
        self.state = transition.state;
        Ok(())
    }

    fn apply(&mut self, effect: AppEffect) -> Result<()> {
        match effect {
            AppEffect::CloseFlow { flow_id } => {
                if let Some(flow) = self.flow.take() {
                    debug_assert_eq!(flow.flow_id(), flow_id);
                    self.last_outcome = Some(flow.close());
                }
            }
            AppEffect::OpenFlow { flow_id, request } => {
                self.flow = Some(FlowController::open(flow_id, request, self.pacing));
            }
            AppEffect::ApplyEdit { flow_id, edit } => {
                self.flow_mut(flow_id)?.edit(edit)?;
            }
            AppEffect::StartPipeline { flow_id } => {
                self.flow_mut(flow_id)?.confirm()?;
            }
        }
        Ok(())
    }

    fn flow_mut(&mut self, flow_id: Uuid) -> Result<&mut FlowController> {
        self.flow
            .as_mut()
            .filter(|flow| flow.flow_id() == flow_id)
            .ok_or(AssistantError::NoActiveFlow)
    }

    pub fn open_flow(&mut self, request: FlowRequest) -> Result<FlowView> {
        self.dispatch(AppAction::OpenFlow(request))?;
        self.active_flow().ok_or(AssistantError::NoActiveFlow)
    }

    pub fn confirm_flow(&mut self) -> Result<FlowView> {
        self.dispatch(AppAction::ConfirmFlow)?;
        self.active_flow().ok_or(AssistantError::NoActiveFlow)
    }

    pub fn edit_flow(&mut self, edit: FlowEdit) -> Result<FlowView> {
        self.dispatch(AppAction::EditFlow(edit))?;
        self.active_flow().ok_or(AssistantError::NoActiveFlow)
    }

    /// Close the open flow, returning how its run ended.
    pub fn close_flow(&mut self) -> Result<RunSnapshot> {
        self.dispatch(AppAction::CloseFlow)?;
        info!(view = ?self.state.view, "Returned to chat");
        self.last_outcome.clone().ok_or(AssistantError::NoActiveFlow)
    }

    pub fn navigate(&mut self, target: NavigationTarget) -> Result<View> {
        self.dispatch(AppAction::Navigate(target))?;
        Ok(self.state.view)
    }

    pub fn active_flow(&self) -> Option<FlowView> {
        self.flow.as_ref().map(FlowController::view)
    }

    /// Wait for the open flow's run to end. `None` if no flow is open.
    pub async fn wait_for_flow(&mut self) -> Option<RunSnapshot> {
        match self.flow.as_mut() {
            Some(flow) => Some(flow.finished().await),
            None => None,
        }
    }

    /// Outcome of the most recently closed or superseded flow.
    pub fn last_outcome(&self) -> Option<&RunSnapshot> {
        self.last_outcome.as_ref()
    }

    pub fn record_turn(&mut self, turn: Turn) {
        debug!(kind = ?turn.kind, user = %turn.user, "Transcript turn appended");
        self.transcript.push(turn);
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Command;
    use crate::pipeline::{RunPhase, RunStatus};
    use crate::transcript::DEFAULT_CAPACITY;
    use std::time::Duration;

    fn pacing() -> Pacing {
        Pacing::new(Duration::from_millis(30), Duration::from_millis(1500))
    }

    fn swap_request() -> FlowRequest {
        FlowRequest::from_command(&Command::SwapQuery {
            amount: "1".to_string(),
            from_token: "ETH".to_string(),
            to_token: "USDC".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_open_flow_supersedes_active_flow() {
        let first = reduce(
            &AppState::default(),
            AppAction::OpenFlow(FlowRequest::blank(FlowKind::Swap)),
        )
        .unwrap();
        let first_id = first.state.active_flow.unwrap().flow_id;
        assert_eq!(first.state.view, View::Flow(FlowKind::Swap));

        let second = reduce(
            &first.state,
            AppAction::OpenFlow(FlowRequest::blank(FlowKind::Stake)),
        )
        .unwrap();
        assert_eq!(
            second.effects[0],
            AppEffect::CloseFlow { flow_id: first_id }
        );
        assert!(matches!(second.effects[1], AppEffect::OpenFlow { .. }));
        assert_eq!(second.state.active_flow.unwrap().kind, FlowKind::Stake);
    }

    #[test]
    fn test_confirm_and_close_require_open_flow() {
        let state = AppState::default();
        assert!(matches!(
            reduce(&state, AppAction::ConfirmFlow),
            Err(AssistantError::NoActiveFlow)
        ));
        assert!(matches!(
            reduce(&state, AppAction::CloseFlow),
            Err(AssistantError::NoActiveFlow)
        ));
    }

    #[test]
    fn test_double_confirm_rejected() {
        let opened = reduce(
            &AppState::default(),
            AppAction::OpenFlow(FlowRequest::blank(FlowKind::Yield)),
        )
        .unwrap();
        let confirmed = reduce(&opened.state, AppAction::ConfirmFlow).unwrap();
        assert!(confirmed.state.active_flow.unwrap().confirmed);
        assert!(reduce(&confirmed.state, AppAction::ConfirmFlow).is_err());
        assert!(reduce(
            &confirmed.state,
            AppAction::EditFlow(FlowEdit::Amount("5".to_string()))
        )
        .is_err());
    }

    #[test]
    fn test_page_navigation_closes_flow() {
        let opened = reduce(
            &AppState::default(),
            AppAction::OpenFlow(FlowRequest::blank(FlowKind::Dca)),
        )
        .unwrap();
        let navigated = reduce(&opened.state, AppAction::Navigate(NavigationTarget::Wallet)).unwrap();
        assert_eq!(navigated.state.view, View::Page(NavigationTarget::Wallet));
        assert!(navigated.state.active_flow.is_none());
        assert!(matches!(navigated.effects[0], AppEffect::CloseFlow { .. }));
    }

    #[test]
    fn test_flow_navigation_opens_blank_flow() {
        let navigated = reduce(&AppState::default(), AppAction::Navigate(NavigationTarget::Swap)).unwrap();
        assert_eq!(navigated.state.view, View::Flow(FlowKind::Swap));
        assert!(navigated.state.active_flow.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_then_reopen_starts_fresh_run() {
        let mut app = AppController::new(pacing(), DEFAULT_CAPACITY);
        app.open_flow(swap_request()).unwrap();
        app.confirm_flow().unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let running = app.active_flow().unwrap();
        assert!(running.run.progress > 25.0);

        let outcome = app.close_flow().unwrap();
        assert_eq!(outcome.status, RunStatus::Cancelled);
        assert!(app.active_flow().is_none());
        assert_eq!(app.state().view, View::Chat);

        let reopened = app.open_flow(FlowRequest::blank(FlowKind::Swap)).unwrap();
        assert_eq!(reopened.run.phase, RunPhase::Idle);
        assert_eq!(reopened.run.progress, 0.0);
        assert_ne!(reopened.run.run_id, outcome.run_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opening_new_flow_cancels_running_one() {
        let mut app = AppController::new(pacing(), DEFAULT_CAPACITY);
        app.open_flow(swap_request()).unwrap();
        app.confirm_flow().unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        app.open_flow(FlowRequest::blank(FlowKind::Stake)).unwrap();
        assert_eq!(app.last_outcome().unwrap().status, RunStatus::Cancelled);
        assert_eq!(app.active_flow().unwrap().kind, FlowKind::Stake);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_flow_completes() {
        let mut app = AppController::new(pacing(), DEFAULT_CAPACITY);
        app.open_flow(FlowRequest::blank(FlowKind::Yield)).unwrap();
        app.edit_flow(FlowEdit::Amount("100".to_string())).unwrap();
        app.confirm_flow().unwrap();

        let done = app.wait_for_flow().await.unwrap();
        assert_eq!(done.status, RunStatus::Completed);
        assert_eq!(app.active_flow().unwrap().params.amount.as_deref(), Some("100"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_with_missing_params_leaves_flow_unconfirmed() {
        let mut app = AppController::new(pacing(), DEFAULT_CAPACITY);
        app.open_flow(FlowRequest::blank(FlowKind::Dca)).unwrap();

        assert!(matches!(app.confirm_flow(), Err(AssistantError::InvalidEdit(_))));
        assert!(!app.state().active_flow.unwrap().confirmed);
        assert_eq!(app.active_flow().unwrap().run.phase, RunPhase::Idle);

        app.edit_flow(FlowEdit::Amount("10".to_string())).unwrap();
        app.edit_flow(FlowEdit::Token("eth".to_string())).unwrap();
        app.edit_flow(FlowEdit::Frequency("week".to_string())).unwrap();

        let confirmed = app.confirm_flow().unwrap();
        assert!(confirmed.confirmed);
        assert_eq!(confirmed.params.frequency.as_deref(), Some("Weekly"));
        assert!(app.state().active_flow.unwrap().confirmed);
        assert_eq!(app.wait_for_flow().await.unwrap().status, RunStatus::Completed);
    }
}
