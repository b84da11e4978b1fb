//! Intent router - processes one input batch
//!
//! INPUT → SPLIT → EXTRACT → (OPEN FLOW | NAVIGATE | ASK RESPONDER) → TRANSCRIPT
//!
//! Clauses are handled strictly in order; clause i+1 starts only after clause
//! i's side effect (including any responder call) is done. Responder failures
//! never escape: they become a single apology turn per input.

use crate::flows::{FlowRequest, FlowView};
use crate::error::AssistantError;
use crate::intent::{split_input, Extraction, SlotExtractor};
use crate::models::{AssistantReply, Clause, Command, FlowKind, NavigationTarget, RawInput};
use crate::responder::FallbackResponder;
use crate::state::{AppController, View};
use crate::transcript::{Turn, TurnKind};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(20);

pub const ERROR_REPLY: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";

/// What happened to one clause.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Disposition {
    FlowOpened { flow_id: Uuid, kind: FlowKind },
    Navigated { target: NavigationTarget },
    Answered,
    /// The responder returned nothing usable.
    NoReply,
    Failed { error: String },
}

impl Disposition {
    fn is_usable(&self) -> bool {
        matches!(
            self,
            Disposition::FlowOpened { .. } | Disposition::Navigated { .. } | Disposition::Answered
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClauseOutcome {
    pub clause: Clause,
    pub extraction: Extraction,
    pub disposition: Disposition,
}

/// Result of routing one RawInput.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub input: String,
    pub received_at: DateTime<Utc>,
    pub clauses: Vec<ClauseOutcome>,
    /// Turns appended to the transcript, in order.
    pub turns: Vec<Turn>,
    pub active_flow: Option<FlowView>,
    pub view: View,
}

impl BatchOutcome {
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.clauses.iter().map(|c| &c.extraction.command)
    }
}

pub struct IntentRouter {
    extractor: SlotExtractor,
    responder: Option<Arc<dyn FallbackResponder>>,
    fallback_timeout: Duration,
}

impl IntentRouter {
    pub fn new(responder: Option<Arc<dyn FallbackResponder>>) -> Self {
        Self {
            extractor: SlotExtractor::new(),
            responder,
            fallback_timeout: DEFAULT_FALLBACK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = timeout;
        self
    }

    /// Route every clause of `raw` in order, recording turns on `app`.
    pub async fn submit(&self, app: &mut AppController, raw: RawInput) -> BatchOutcome {
        let clauses = split_input(&raw);
        let mut outcomes = Vec::with_capacity(clauses.len());
        let mut turns = Vec::new();
        let mut error_reported = false;

        info!(
            input = %raw.text(),
            clause_count = clauses.len(),
            "Router: processing input"
        );

        for clause in clauses {
            let extraction = self.extractor.extract(&clause);
            debug!(
                clause = %clause,
                pattern = extraction.pattern.unwrap_or("none"),
                "Clause extracted"
            );

            let disposition = match &extraction.command {
                Command::Navigation { target } if target.flow_kind().is_none() => {
                    self.navigate(app, &clause, *target, &mut turns)
                }
                command => match FlowRequest::from_command(command) {
                    Some(request) => self.open_flow(app, &clause, request, &mut turns),
                    None => self.ask_responder(app, &clause, command, &mut turns).await,
                },
            };

            if let Disposition::Failed { error } = &disposition {
                warn!(clause = %clause, error = %error, "Clause failed");
                if !error_reported {
                    push_turn(
                        app,
                        &mut turns,
                        Turn::new(TurnKind::Error, clause.as_str(), AssistantReply::text(ERROR_REPLY)),
                    );
                    error_reported = true;
                }
            }

            outcomes.push(ClauseOutcome {
                clause,
                extraction,
                disposition,
            });
        }

        let any_usable = outcomes.iter().any(|o| o.disposition.is_usable());
        if !any_usable && !error_reported {
            info!(input = %raw.text(), "Nothing in the input could be handled");
            push_turn(
                app,
                &mut turns,
                Turn::new(
                    TurnKind::NotUnderstood,
                    raw.text(),
                    AssistantReply::text(not_understood(raw.text())),
                ),
            );
        }

        BatchOutcome {
            input: raw.text().to_string(),
            received_at: raw.received_at(),
            clauses: outcomes,
            turns,
            active_flow: app.active_flow(),
            view: app.state().view,
        }
    }

    fn open_flow(
        &self,
        app: &mut AppController,
        clause: &Clause,
        request: FlowRequest,
        turns: &mut Vec<Turn>,
    ) -> Disposition {
        let summary = request.summary();
        match app.open_flow(request) {
            Ok(view) => {
                info!(flow_id = %view.flow_id, kind = %view.kind, "Router: flow opened");
                push_turn(
                    app,
                    turns,
                    Turn::new(
                        TurnKind::FlowOpened,
                        clause.as_str(),
                        AssistantReply::text(format!("Opening {}. {}", view.kind, summary)),
                    ),
                );
                Disposition::FlowOpened {
                    flow_id: view.flow_id,
                    kind: view.kind,
                }
            }
            Err(e) => Disposition::Failed {
                error: e.to_string(),
            },
        }
    }

    fn navigate(
        &self,
        app: &mut AppController,
        clause: &Clause,
        target: NavigationTarget,
        turns: &mut Vec<Turn>,
    ) -> Disposition {
        match app.navigate(target) {
            Ok(view) => {
                info!(view = ?view, "Router: navigated");
                push_turn(
                    app,
                    turns,
                    Turn::new(
                        TurnKind::Navigation,
                        clause.as_str(),
                        AssistantReply::text(format!("Opening {}.", target)),
                    ),
                );
                Disposition::Navigated { target }
            }
            Err(e) => Disposition::Failed {
                error: e.to_string(),
            },
        }
    }

    async fn ask_responder(
        &self,
        app: &mut AppController,
        clause: &Clause,
        hint: &Command,
        turns: &mut Vec<Turn>,
    ) -> Disposition {
        let Some(responder) = self.responder.as_ref() else {
            debug!(clause = %clause, "No fallback responder configured");
            return Disposition::NoReply;
        };

        match self.call_responder(responder.as_ref(), clause, hint).await {
            Ok(reply) if reply.is_usable() => {
                push_turn(app, turns, Turn::new(TurnKind::Answer, clause.as_str(), reply));
                Disposition::Answered
            }
            Ok(_) => Disposition::NoReply,
            Err(e) => Disposition::Failed {
                error: e.to_string(),
            },
        }
    }

    async fn call_responder(
        &self,
        responder: &dyn FallbackResponder,
        clause: &Clause,
        hint: &Command,
    ) -> Result<AssistantReply> {
        info!(clause = %clause, "Router: calling fallback responder");

        match tokio::time::timeout(self.fallback_timeout, responder.respond(clause, hint)).await {
            Ok(result) => result,
            Err(_) => Err(AssistantError::ResponderTimeout(
                self.fallback_timeout.as_millis() as u64,
            )),
        }
    }
}

fn push_turn(app: &mut AppController, turns: &mut Vec<Turn>, turn: Turn) {
    turns.push(turn.clone());
    app.record_turn(turn);
}

fn not_understood(input: &str) -> String {
    format!(
        "I don't understand \"{}\". Try something like \"swap 1 eth for usdc\" or \"price of bitcoin\".",
        input.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pacing;
    use crate::responder::CannedResponder;
    use crate::transcript::DEFAULT_CAPACITY;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn controller() -> AppController {
        AppController::new(Pacing::default(), DEFAULT_CAPACITY)
    }

    fn router(responder: impl FallbackResponder + 'static) -> IntentRouter {
        IntentRouter::new(Some(Arc::new(responder)))
    }

    /// Records every clause it is asked about.
    #[derive(Default)]
    struct RecordingResponder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FallbackResponder for RecordingResponder {
        async fn respond(&self, clause: &Clause, _hint: &Command) -> Result<AssistantReply> {
            self.seen.lock().unwrap().push(clause.to_string());
            Ok(AssistantReply::text(format!("re: {}", clause)))
        }
    }

    struct StalledResponder;

    #[async_trait]
    impl FallbackResponder for StalledResponder {
        async fn respond(&self, _clause: &Clause, _hint: &Command) -> Result<AssistantReply> {
            std::future::pending::<()>().await;
            Ok(AssistantReply::default())
        }
    }

    #[tokio::test]
    async fn test_swap_then_trending_in_order() {
        let mut app = controller();
        let raw = RawInput::new("swap 1 eth for usdc and show me trending tokens");
        let received_at = raw.received_at();
        let outcome = router(CannedResponder::new()).submit(&mut app, raw).await;
        assert_eq!(outcome.received_at, received_at);
        assert!(outcome.turns.iter().all(|t| t.timestamp >= received_at));

        let commands: Vec<&Command> = outcome.commands().collect();
        assert_eq!(
            commands,
            vec![
                &Command::SwapQuery {
                    amount: "1".to_string(),
                    from_token: "ETH".to_string(),
                    to_token: "USDC".to_string(),
                },
                &Command::TrendingQuery,
            ]
        );

        let kinds: Vec<TurnKind> = app.transcript().turns().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TurnKind::FlowOpened, TurnKind::Answer]);
        assert_eq!(outcome.turns.len(), 2);
        assert_eq!(outcome.active_flow.unwrap().kind, FlowKind::Swap);
    }

    #[tokio::test]
    async fn test_gibberish_with_failing_responder_gives_one_error() {
        let mut app = controller();
        let outcome = router(CannedResponder::failing())
            .submit(&mut app, RawInput::new("asdkjasd"))
            .await;

        assert_eq!(app.transcript().len(), 1);
        let turn = app.transcript().turns().next().unwrap();
        assert_eq!(turn.kind, TurnKind::Error);
        assert_eq!(turn.reply.text, ERROR_REPLY);
        assert!(matches!(
            outcome.clauses[0].disposition,
            Disposition::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_multiple_failures_report_once() {
        let mut app = controller();
        router(CannedResponder::failing())
            .submit(&mut app, RawInput::new("price of bitcoin and latest news"))
            .await;

        let errors = app
            .transcript()
            .turns()
            .filter(|t| t.kind == TurnKind::Error)
            .count();
        assert_eq!(errors, 1);
        assert_eq!(app.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_unhandled_batch_gets_single_not_understood() {
        let mut app = controller();
        let outcome = IntentRouter::new(None)
            .submit(&mut app, RawInput::new("asdkjasd and qwerty"))
            .await;

        assert_eq!(outcome.clauses.len(), 2);
        assert_eq!(app.transcript().len(), 1);
        let turn = app.transcript().turns().next().unwrap();
        assert_eq!(turn.kind, TurnKind::NotUnderstood);
        assert_eq!(turn.user, "asdkjasd and qwerty");
    }

    #[tokio::test]
    async fn test_partial_success_skips_not_understood() {
        let mut app = controller();
        router(CannedResponder::new())
            .submit(&mut app, RawInput::new("asdkjasd and stake my eth"))
            .await;

        let kinds: Vec<TurnKind> = app.transcript().turns().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TurnKind::FlowOpened]);
        assert_eq!(app.active_flow().unwrap().kind, FlowKind::Stake);
    }

    #[tokio::test]
    async fn test_unrecognized_clause_goes_to_responder() {
        let responder = Arc::new(RecordingResponder::default());
        let router = IntentRouter::new(Some(responder.clone()));
        let mut app = controller();

        router.submit(&mut app, RawInput::new("asdkjasd")).await;

        assert_eq!(*responder.seen.lock().unwrap(), vec!["asdkjasd".to_string()]);
        assert_eq!(app.transcript().turns().next().unwrap().kind, TurnKind::Answer);
    }

    #[tokio::test]
    async fn test_later_flow_replaces_earlier() {
        let mut app = controller();
        let outcome = router(CannedResponder::new())
            .submit(&mut app, RawInput::new("swap 1 eth for usdc and stake"))
            .await;

        assert_eq!(outcome.active_flow.unwrap().kind, FlowKind::Stake);
        assert_eq!(outcome.view, View::Flow(FlowKind::Stake));
        assert_eq!(app.transcript().len(), 2);
    }

    #[tokio::test]
    async fn test_page_navigation_changes_view() {
        let mut app = controller();
        let outcome = router(CannedResponder::new())
            .submit(&mut app, RawInput::new("open settings"))
            .await;

        assert_eq!(outcome.view, View::Page(NavigationTarget::Settings));
        assert!(outcome.active_flow.is_none());
        assert_eq!(app.transcript().turns().next().unwrap().kind, TurnKind::Navigation);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_responder_times_out() {
        let mut app = controller();
        let outcome = router(StalledResponder)
            .with_timeout(Duration::from_secs(1))
            .submit(&mut app, RawInput::new("latest news"))
            .await;

        match &outcome.clauses[0].disposition {
            Disposition::Failed { error } => assert!(error.contains("timed out")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(app.transcript().turns().next().unwrap().kind, TurnKind::Error);
    }
}
