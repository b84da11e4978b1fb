//! Fallback responder trait and implementations
//!
//! Clauses that don't open a flow are answered by a free-form responder.
//! It is the only network-bound collaborator of the core, and it may fail.

use crate::error::AssistantError;
use crate::models::{AssistantReply, Clause, Command, NewsItem, TrendingToken};
use crate::Result;
use async_trait::async_trait;
use serde_json::json;

pub mod gemini;
pub use gemini::GeminiResponder;

/// Trait for free-form replies (LLM or data backed)
#[async_trait]
pub trait FallbackResponder: Send + Sync {
    /// Answer `clause`. `hint` is the command the extractor produced for it,
    /// `Command::Unrecognized` when nothing matched.
    async fn respond(&self, clause: &Clause, hint: &Command) -> Result<AssistantReply>;
}

/// Canned responder for development & testing
/// Keeps the assistant usable without network access
#[derive(Debug, Clone, Default)]
pub struct CannedResponder {
    failing: bool,
    answer_unrecognized: bool,
}

impl CannedResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails, as an unreachable upstream would.
    pub fn failing() -> Self {
        Self {
            failing: true,
            answer_unrecognized: false,
        }
    }

    /// Also produce a generic reply for clauses nothing matched.
    pub fn answering_unrecognized(mut self) -> Self {
        self.answer_unrecognized = true;
        self
    }
}

#[async_trait]
impl FallbackResponder for CannedResponder {
    async fn respond(&self, clause: &Clause, hint: &Command) -> Result<AssistantReply> {
        if self.failing {
            return Err(AssistantError::ResponderError(format!(
                "upstream unavailable for '{}'",
                clause
            )));
        }

        let reply = match hint {
            Command::PriceQuery { coin_id } => AssistantReply {
                text: format!("Here is the latest price for {}.", coin_id),
                data: Some(json!({
                    "coin_id": coin_id,
                    "currency": "usd",
                })),
                ..AssistantReply::default()
            },
            Command::TrendingQuery => AssistantReply {
                text: "These tokens are trending right now.".to_string(),
                trending: Some(vec![
                    TrendingToken {
                        symbol: "ETH".to_string(),
                        name: "Ethereum".to_string(),
                        price_change_24h: Some(2.4),
                    },
                    TrendingToken {
                        symbol: "SOL".to_string(),
                        name: "Solana".to_string(),
                        price_change_24h: Some(-1.1),
                    },
                ]),
                ..AssistantReply::default()
            },
            Command::NewsQuery => AssistantReply {
                text: "Latest crypto headlines.".to_string(),
                news: Some(vec![NewsItem {
                    title: "Markets steady ahead of rate decision".to_string(),
                    url: None,
                    source: Some("Example Wire".to_string()),
                }]),
                ..AssistantReply::default()
            },
            Command::BridgeQuery => AssistantReply::text(
                "Bridging moves tokens between chains. Pick a source and destination chain to compare routes.",
            ),
            Command::Unrecognized if self.answer_unrecognized => {
                AssistantReply::text(format!("Here is what I know about \"{}\".", clause))
            }
            _ => AssistantReply::default(),
        };

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause(text: &str) -> Clause {
        Clause::normalize(text).unwrap()
    }

    #[test]
    fn test_canned_replies_by_hint() {
        let responder = CannedResponder::new();

        let trending = tokio_test::block_on(
            responder.respond(&clause("what's trending"), &Command::TrendingQuery),
        )
        .unwrap();
        assert!(trending.is_usable());
        assert_eq!(trending.trending.unwrap().len(), 2);

        let price = tokio_test::block_on(responder.respond(
            &clause("price of bitcoin"),
            &Command::PriceQuery {
                coin_id: "bitcoin".to_string(),
            },
        ))
        .unwrap();
        assert_eq!(price.data.unwrap()["coin_id"], "bitcoin");
    }

    #[test]
    fn test_unrecognized_is_empty_unless_enabled() {
        let gibberish = clause("asdkjasd");

        let silent = tokio_test::block_on(
            CannedResponder::new().respond(&gibberish, &Command::Unrecognized),
        )
        .unwrap();
        assert!(!silent.is_usable());

        let chatty = tokio_test::block_on(
            CannedResponder::new()
                .answering_unrecognized()
                .respond(&gibberish, &Command::Unrecognized),
        )
        .unwrap();
        assert!(chatty.is_usable());
    }

    #[test]
    fn test_failing_responder_errors() {
        let result = tokio_test::block_on(
            CannedResponder::failing().respond(&clause("news"), &Command::NewsQuery),
        );
        assert!(matches!(result, Err(AssistantError::ResponderError(_))));
    }
}
