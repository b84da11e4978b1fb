//! Slot Extractor
//!
//! Evaluates the ranked pattern table against one clause. First match wins.
//! Extraction is pure: the same clause always yields the same command.

use crate::intent::patterns::{IntentFamily, IntentPattern, INTENT_PATTERNS};
use crate::models::{Clause, Command};
use serde::Serialize;
use tracing::debug;

/// Command plus the pattern that produced it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Extraction {
    pub command: Command,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<IntentFamily>,
}

impl Extraction {
    fn matched(pattern: &'static IntentPattern, command: Command) -> Self {
        Self {
            command,
            pattern: Some(pattern.name),
            rank: Some(pattern.rank),
            family: Some(pattern.family),
        }
    }

    fn unrecognized() -> Self {
        Self {
            command: Command::Unrecognized,
            pattern: None,
            rank: None,
            family: None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.command != Command::Unrecognized
    }
}

#[derive(Clone, Copy)]
pub struct SlotExtractor {
    patterns: &'static [IntentPattern],
}

impl SlotExtractor {
    pub fn new() -> Self {
        Self {
            patterns: INTENT_PATTERNS.as_slice(),
        }
    }

    pub fn extract(&self, clause: &Clause) -> Extraction {
        for pattern in self.patterns {
            if let Some(command) = pattern.try_match(clause.as_str()) {
                debug!(
                    clause = %clause,
                    pattern = pattern.name,
                    rank = pattern.rank,
                    "Clause matched intent pattern"
                );
                return Extraction::matched(pattern, command);
            }
        }

        debug!(clause = %clause, "Clause matched no intent pattern");
        Extraction::unrecognized()
    }

    /// Shorthand for callers that only need the command.
    pub fn command_for(&self, clause: &Clause) -> Command {
        self.extract(clause).command
    }
}

impl Default for SlotExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::splitter::split_clauses;
    use crate::models::NavigationTarget;

    fn command(text: &str) -> Command {
        let clause = Clause::normalize(text).expect("non-empty clause");
        SlotExtractor::new().command_for(&clause)
    }

    #[test]
    fn test_full_dca_scenario() {
        assert_eq!(
            command("Create a DCA to purchase 10 USDC worth of ETH on daily basis"),
            Command::DcaSetup {
                amount: "10".to_string(),
                token: "ETH".to_string(),
                frequency: "Daily".to_string(),
            }
        );
    }

    #[test]
    fn test_narrow_dca_beats_create_dca_fallback() {
        let extraction = SlotExtractor::new()
            .extract(&Clause::normalize("create a dca to buy 25.5 usdt of btc every weekly").unwrap());
        assert_eq!(extraction.pattern, Some("dca_full"));
        assert_eq!(
            extraction.command,
            Command::DcaSetup {
                amount: "25.5".to_string(),
                token: "BTC".to_string(),
                frequency: "Weekly".to_string(),
            }
        );

        assert_eq!(
            command("create a dca"),
            Command::Navigation {
                target: NavigationTarget::Dca
            }
        );
    }

    #[test]
    fn test_compact_dca() {
        assert_eq!(
            command("dca 50 usdc into sol monthly"),
            Command::DcaSetup {
                amount: "50".to_string(),
                token: "SOL".to_string(),
                frequency: "Monthly".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_frequency_passes_through() {
        assert_eq!(
            command("dca 5 into eth hourly"),
            Command::DcaSetup {
                amount: "5".to_string(),
                token: "ETH".to_string(),
                frequency: "Hourly".to_string(),
            }
        );
    }

    #[test]
    fn test_full_swap_uppercases_tokens_and_keeps_amount() {
        for (text, amount) in [
            ("swap 1 eth for usdc", "1"),
            ("Swap 0.25 Eth for UsDc", "0.25"),
            ("swap 1000 ETH to usdc", "1000"),
        ] {
            assert_eq!(
                command(text),
                Command::SwapQuery {
                    amount: amount.to_string(),
                    from_token: "ETH".to_string(),
                    to_token: "USDC".to_string(),
                },
                "input: {}",
                text
            );
        }
    }

    #[test]
    fn test_unknown_tickers_pass_through() {
        assert_eq!(
            command("swap 3 wif into bonk"),
            Command::SwapQuery {
                amount: "3".to_string(),
                from_token: "WIF".to_string(),
                to_token: "BONK".to_string(),
            }
        );
    }

    #[test]
    fn test_bare_swap_opens_empty_swap_flow() {
        assert_eq!(
            command("i want to swap"),
            Command::Navigation {
                target: NavigationTarget::Swap
            }
        );
    }

    #[test]
    fn test_malformed_amount_falls_through_to_broad_pattern() {
        let extraction = SlotExtractor::new()
            .extract(&Clause::normalize("swap 1.2.3 eth for usdc").unwrap());
        assert_eq!(extraction.pattern, Some("swap_keyword"));
        assert_eq!(
            extraction.command,
            Command::Navigation {
                target: NavigationTarget::Swap
            }
        );
    }

    #[test]
    fn test_informational_intents() {
        assert_eq!(command("show me trending tokens"), Command::TrendingQuery);
        assert_eq!(command("latest crypto news"), Command::NewsQuery);
        assert_eq!(command("best yield for usdc"), Command::YieldQuery);
        assert_eq!(command("bridge to arbitrum"), Command::BridgeQuery);
        assert_eq!(command("stake my eth"), Command::StakeQuery);
        assert_eq!(command("build me a portfolio"), Command::PortfolioQuery);
    }

    #[test]
    fn test_price_queries() {
        assert_eq!(
            command("what is the price of bitcoin today?"),
            Command::PriceQuery {
                coin_id: "bitcoin".to_string()
            }
        );
        assert_eq!(
            command("how much is shiba inu"),
            Command::PriceQuery {
                coin_id: "shiba-inu".to_string()
            }
        );
        assert_eq!(
            command("eth price"),
            Command::PriceQuery {
                coin_id: "eth".to_string()
            }
        );
    }

    #[test]
    fn test_project_analysis() {
        assert_eq!(
            command("analyze project Aave"),
            Command::ProjectAnalysis {
                project_name: "aave".to_string()
            }
        );
    }

    #[test]
    fn test_navigation() {
        assert_eq!(
            command("take me to my wallet"),
            Command::Navigation {
                target: NavigationTarget::Wallet
            }
        );
        assert_eq!(
            command("open settings"),
            Command::Navigation {
                target: NavigationTarget::Settings
            }
        );
    }

    #[test]
    fn test_gibberish_is_unrecognized() {
        let extraction = SlotExtractor::new().extract(&Clause::normalize("asdkjasd").unwrap());
        assert!(!extraction.is_recognized());
        assert_eq!(extraction.pattern, None);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let extractor = SlotExtractor::new();
        for clause in split_clauses("swap 1 eth for usdc and show me trending tokens and asdkjasd") {
            assert_eq!(extractor.extract(&clause), extractor.extract(&clause));
        }
    }

    #[test]
    fn test_chained_scenario_order() {
        let extractor = SlotExtractor::new();
        let commands: Vec<Command> = split_clauses("swap 1 eth for usdc and show me trending tokens")
            .iter()
            .map(|clause| extractor.command_for(clause))
            .collect();

        assert_eq!(
            commands,
            vec![
                Command::SwapQuery {
                    amount: "1".to_string(),
                    from_token: "ETH".to_string(),
                    to_token: "USDC".to_string(),
                },
                Command::TrendingQuery,
            ]
        );
    }
}
