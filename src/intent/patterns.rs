//! Intent pattern table
//!
//! Static, explicitly ranked list of intent patterns. Lower rank is tried first.
//! Within a family every parameterized pattern must outrank every keyword-only
//! pattern, since both can match the same clause.

use crate::models::{Command, NavigationTarget};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IntentFamily {
    Dca,
    Swap,
    ProjectAnalysis,
    Price,
    Trending,
    News,
    Yield,
    Bridge,
    Stake,
    Portfolio,
    Navigation,
}

/// Narrow patterns capture slots; keyword patterns only detect the family.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Specificity {
    Parameterized,
    Keyword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordMode {
    All,
    Any,
}

pub type SlotFn = fn(&Captures<'_>) -> Option<Command>;

pub enum Matcher {
    Regex {
        regex: Regex,
        slots: SlotFn,
    },
    Keywords {
        mode: KeywordMode,
        words: &'static [&'static str],
        command: fn() -> Command,
    },
}

pub struct IntentPattern {
    pub rank: u16,
    pub name: &'static str,
    pub family: IntentFamily,
    pub specificity: Specificity,
    pub matcher: Matcher,
}

impl IntentPattern {
    /// Returns the command this pattern extracts from `clause`, or `None`
    /// when the matcher fails or a captured slot is malformed.
    pub fn try_match(&self, clause: &str) -> Option<Command> {
        match &self.matcher {
            Matcher::Regex { regex, slots } => regex.captures(clause).and_then(|caps| slots(&caps)),
            Matcher::Keywords {
                mode,
                words,
                command,
            } => {
                let hit = match mode {
                    KeywordMode::All => words.iter().all(|kw| keyword_present(clause, kw)),
                    KeywordMode::Any => words.iter().any(|kw| keyword_present(clause, kw)),
                };
                hit.then(command)
            }
        }
    }
}

/// Single words match whole words only; phrases match as substrings.
fn keyword_present(text: &str, keyword: &str) -> bool {
    if keyword.chars().all(|c| c.is_ascii_alphanumeric()) {
        text.split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == keyword)
    } else {
        text.contains(keyword)
    }
}

//
// ================= Slot normalization =================
//

/// Amounts must parse as a finite decimal. Thousands separators are accepted
/// only in groups of three and are dropped ("1,000" -> "1000").
fn checked_amount(raw: &str) -> Option<String> {
    let (integer, fraction) = match raw.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (raw, None),
    };

    let mut groups = integer.split(',');
    let first = groups.next().unwrap_or_default();
    let grouped: Vec<&str> = groups.collect();
    if !grouped.is_empty()
        && (first.is_empty() || first.len() > 3 || grouped.iter().any(|g| g.len() != 3))
    {
        return None;
    }

    let amount = match fraction {
        Some(fraction) => format!("{}.{}", integer.replace(',', ""), fraction),
        None => integer.replace(',', ""),
    };
    match amount.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(amount),
        _ => None,
    }
}

fn token_symbol(raw: &str) -> String {
    raw.to_uppercase()
}

/// "daily", "day" -> "Daily" (same for week and month). Unknown words pass
/// through with only the first letter capitalized.
pub fn display_frequency(raw: &str) -> String {
    match raw.to_lowercase().as_str() {
        "day" | "daily" | "everyday" => return "Daily".to_string(),
        "week" | "weekly" => return "Weekly".to_string(),
        "month" | "monthly" => return "Monthly".to_string(),
        _ => {}
    }

    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Connector words the frequency slot may sit next to but never be.
const FREQUENCY_CONNECTORS: &[&str] = &["on", "at", "every", "a", "an", "per", "each"];

const PROJECT_FILLER: &[&str] = &[
    "analysis", "analyze", "analyse", "the", "of", "about", "for", "on", "named", "called",
    "info", "details", "token", "coin", "a", "an", "is",
];

const COIN_FILLER: &[&str] = &["the", "a", "current", "token", "coin", "s", "whats", "what", "its"];

fn coin_id(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw.split_whitespace().collect();
    if words.is_empty() || words.iter().all(|w| COIN_FILLER.contains(w)) {
        return None;
    }
    Some(words.join("-"))
}

//
// ================= Slot functions =================
//

fn dca_slots(caps: &Captures<'_>) -> Option<Command> {
    let frequency = caps.name("frequency")?.as_str();
    if FREQUENCY_CONNECTORS.contains(&frequency) {
        return None;
    }

    Some(Command::DcaSetup {
        amount: checked_amount(caps.name("amount")?.as_str())?,
        token: token_symbol(caps.name("token")?.as_str()),
        frequency: display_frequency(frequency),
    })
}

fn swap_slots(caps: &Captures<'_>) -> Option<Command> {
    Some(Command::SwapQuery {
        amount: checked_amount(caps.name("amount")?.as_str())?,
        from_token: token_symbol(caps.name("from")?.as_str()),
        to_token: token_symbol(caps.name("to")?.as_str()),
    })
}

fn project_slots(caps: &Captures<'_>) -> Option<Command> {
    let rest = caps.name("rest")?.as_str();
    let project_name = rest
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-' && c != '.'))
        .find(|w| !w.is_empty() && !PROJECT_FILLER.contains(w))?;

    Some(Command::ProjectAnalysis {
        project_name: project_name.to_string(),
    })
}

fn price_slots(caps: &Captures<'_>) -> Option<Command> {
    Some(Command::PriceQuery {
        coin_id: coin_id(caps.name("coin")?.as_str())?,
    })
}

fn navigation_slots(caps: &Captures<'_>) -> Option<Command> {
    Some(Command::Navigation {
        target: NavigationTarget::from_word(caps.name("target")?.as_str())?,
    })
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("intent pattern is valid")
}

const AMOUNT: &str = r"(?P<amount>\.?[0-9][0-9.,]*)";

lazy_static! {
    /// Every intent pattern, sorted by rank.
    pub static ref INTENT_PATTERNS: Vec<IntentPattern> = vec![
        IntentPattern {
            rank: 10,
            name: "dca_full",
            family: IntentFamily::Dca,
            specificity: Specificity::Parameterized,
            matcher: Matcher::Regex {
                regex: regex(&format!(
                    r"\bdca\b.*?\b(?:purchase|buy|invest)\s+{AMOUNT}\s*(?P<spend>[a-z][a-z0-9]*)\s+(?:worth\s+)?(?:of|in|into)\s+(?P<token>[a-z][a-z0-9]*)(?:\s+(?:on|at|every|each|per))?(?:\s+an?)?\s+(?P<frequency>[a-z]+)"
                )),
                slots: dca_slots,
            },
        },
        IntentPattern {
            rank: 20,
            name: "dca_compact",
            family: IntentFamily::Dca,
            specificity: Specificity::Parameterized,
            matcher: Matcher::Regex {
                regex: regex(&format!(
                    r"\bdca\s+{AMOUNT}\s*(?:(?P<spend>[a-z][a-z0-9]*)\s+)?(?:into|in|of|for)\s+(?P<token>[a-z][a-z0-9]*)\s+(?:(?:every|each|per)\s+)?(?P<frequency>[a-z]+)"
                )),
                slots: dca_slots,
            },
        },
        IntentPattern {
            rank: 30,
            name: "dca_create",
            family: IntentFamily::Dca,
            specificity: Specificity::Keyword,
            matcher: Matcher::Keywords {
                mode: KeywordMode::All,
                words: &["create", "dca"],
                command: || Command::Navigation { target: NavigationTarget::Dca },
            },
        },
        IntentPattern {
            rank: 40,
            name: "dca_keyword",
            family: IntentFamily::Dca,
            specificity: Specificity::Keyword,
            matcher: Matcher::Keywords {
                mode: KeywordMode::Any,
                words: &["dca", "dollar cost averaging", "dollar-cost"],
                command: || Command::Navigation { target: NavigationTarget::Dca },
            },
        },
        IntentPattern {
            rank: 50,
            name: "swap_full",
            family: IntentFamily::Swap,
            specificity: Specificity::Parameterized,
            matcher: Matcher::Regex {
                regex: regex(&format!(
                    r"\b(?:swap|exchange|convert|trade)\s+{AMOUNT}\s*(?P<from>[a-z][a-z0-9]*)\s+(?:for|to|into|->)\s+(?P<to>[a-z][a-z0-9]*)\b"
                )),
                slots: swap_slots,
            },
        },
        IntentPattern {
            rank: 60,
            name: "swap_keyword",
            family: IntentFamily::Swap,
            specificity: Specificity::Keyword,
            matcher: Matcher::Keywords {
                mode: KeywordMode::Any,
                words: &["swap"],
                command: || Command::Navigation { target: NavigationTarget::Swap },
            },
        },
        IntentPattern {
            rank: 70,
            name: "project_analysis",
            family: IntentFamily::ProjectAnalysis,
            specificity: Specificity::Parameterized,
            matcher: Matcher::Regex {
                regex: regex(r"\bproject\b(?P<rest>.*)$"),
                slots: project_slots,
            },
        },
        IntentPattern {
            rank: 80,
            name: "price_of",
            family: IntentFamily::Price,
            specificity: Specificity::Parameterized,
            matcher: Matcher::Regex {
                regex: regex(r"\bprice\s+(?:of|for)\s+(?P<coin>[a-z0-9][a-z0-9 -]*?)(?:\s+(?:in|vs|versus|against)\s+[a-z0-9]+)?\s*(?:today|now|right now)?\s*\??$"),
                slots: price_slots,
            },
        },
        IntentPattern {
            rank: 90,
            name: "how_much_is",
            family: IntentFamily::Price,
            specificity: Specificity::Parameterized,
            matcher: Matcher::Regex {
                regex: regex(r"\bhow much is\s+(?P<coin>[a-z0-9][a-z0-9 -]*?)(?:\s+worth)?(?:\s+(?:in|vs|versus|against)\s+[a-z0-9]+)?\s*(?:today|now)?\s*\??$"),
                slots: price_slots,
            },
        },
        IntentPattern {
            rank: 100,
            name: "coin_price",
            family: IntentFamily::Price,
            specificity: Specificity::Parameterized,
            matcher: Matcher::Regex {
                regex: regex(r"\b(?P<coin>[a-z0-9]+)\s+price\b"),
                slots: price_slots,
            },
        },
        IntentPattern {
            rank: 110,
            name: "trending",
            family: IntentFamily::Trending,
            specificity: Specificity::Keyword,
            matcher: Matcher::Keywords {
                mode: KeywordMode::Any,
                words: &["trending", "gainers", "hot tokens"],
                command: || Command::TrendingQuery,
            },
        },
        IntentPattern {
            rank: 120,
            name: "news",
            family: IntentFamily::News,
            specificity: Specificity::Keyword,
            matcher: Matcher::Keywords {
                mode: KeywordMode::Any,
                words: &["news", "headlines"],
                command: || Command::NewsQuery,
            },
        },
        IntentPattern {
            rank: 130,
            name: "yield",
            family: IntentFamily::Yield,
            specificity: Specificity::Keyword,
            matcher: Matcher::Keywords {
                mode: KeywordMode::Any,
                words: &["yield", "yields", "apy", "farming", "earn"],
                command: || Command::YieldQuery,
            },
        },
        IntentPattern {
            rank: 140,
            name: "bridge",
            family: IntentFamily::Bridge,
            specificity: Specificity::Keyword,
            matcher: Matcher::Keywords {
                mode: KeywordMode::Any,
                words: &["bridge", "bridging"],
                command: || Command::BridgeQuery,
            },
        },
        IntentPattern {
            rank: 150,
            name: "stake",
            family: IntentFamily::Stake,
            specificity: Specificity::Keyword,
            matcher: Matcher::Keywords {
                mode: KeywordMode::Any,
                words: &["stake", "staking", "unstake"],
                command: || Command::StakeQuery,
            },
        },
        IntentPattern {
            rank: 160,
            name: "portfolio",
            family: IntentFamily::Portfolio,
            specificity: Specificity::Keyword,
            matcher: Matcher::Keywords {
                mode: KeywordMode::Any,
                words: &["portfolio", "holdings", "my assets"],
                command: || Command::PortfolioQuery,
            },
        },
        IntentPattern {
            rank: 170,
            name: "navigation",
            family: IntentFamily::Navigation,
            specificity: Specificity::Parameterized,
            matcher: Matcher::Regex {
                regex: regex(r"\b(?:go to|open|show(?: me)?|take me to|navigate to)\s+(?:my\s+|the\s+)?(?P<target>wallet|settings|history|rewards|dashboard|home)\b"),
                slots: navigation_slots,
            },
        },
    ];
}
