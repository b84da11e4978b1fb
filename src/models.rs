//! Core data models for the command assistant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Input =================
//

/// Literal text as typed or transcribed. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawInput {
    text: String,
    received_at: DateTime<Utc>,
}

impl RawInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Utc::now(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// One lowercased, trimmed segment of a [`RawInput`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Clause(String);

impl Clause {
    /// Normalizes a raw segment. Returns `None` for segments that are empty after trimming.
    pub fn normalize(segment: &str) -> Option<Self> {
        let normalized = segment.trim().to_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ================= Commands =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Swap,
    Stake,
    Yield,
    Dca,
    Portfolio,
    Analysis,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NavigationTarget {
    Swap,
    Stake,
    Yield,
    Dca,
    Portfolio,
    Wallet,
    Settings,
    History,
    Rewards,
    Dashboard,
}

impl NavigationTarget {
    /// The flow this target opens, if it is a flow rather than a plain view.
    pub fn flow_kind(self) -> Option<FlowKind> {
        match self {
            NavigationTarget::Swap => Some(FlowKind::Swap),
            NavigationTarget::Stake => Some(FlowKind::Stake),
            NavigationTarget::Yield => Some(FlowKind::Yield),
            NavigationTarget::Dca => Some(FlowKind::Dca),
            NavigationTarget::Portfolio => Some(FlowKind::Portfolio),
            NavigationTarget::Wallet
            | NavigationTarget::Settings
            | NavigationTarget::History
            | NavigationTarget::Rewards
            | NavigationTarget::Dashboard => None,
        }
    }

    /// Page named by a "go to …" clause. Flow pages are reached through
    /// their keyword patterns instead.
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "wallet" => Some(NavigationTarget::Wallet),
            "settings" => Some(NavigationTarget::Settings),
            "history" => Some(NavigationTarget::History),
            "rewards" => Some(NavigationTarget::Rewards),
            "dashboard" | "home" => Some(NavigationTarget::Dashboard),
            _ => None,
        }
    }
}

/// Typed intent extracted from one clause, with its slots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    PriceQuery {
        coin_id: String,
    },
    TrendingQuery,
    NewsQuery,
    YieldQuery,
    SwapQuery {
        amount: String,
        from_token: String,
        to_token: String,
    },
    BridgeQuery,
    PortfolioQuery,
    StakeQuery,
    ProjectAnalysis {
        project_name: String,
    },
    DcaSetup {
        amount: String,
        token: String,
        frequency: String,
    },
    Navigation {
        target: NavigationTarget,
    },
    Unrecognized,
}

impl Command {
    /// Flow opened by this command, if any.
    pub fn flow_kind(&self) -> Option<FlowKind> {
        match self {
            Command::SwapQuery { .. } => Some(FlowKind::Swap),
            Command::StakeQuery => Some(FlowKind::Stake),
            Command::YieldQuery => Some(FlowKind::Yield),
            Command::DcaSetup { .. } => Some(FlowKind::Dca),
            Command::PortfolioQuery => Some(FlowKind::Portfolio),
            Command::ProjectAnalysis { .. } => Some(FlowKind::Analysis),
            Command::Navigation { target } => target.flow_kind(),
            Command::PriceQuery { .. }
            | Command::TrendingQuery
            | Command::NewsQuery
            | Command::BridgeQuery
            | Command::Unrecognized => None,
        }
    }
}

//
// ================= Assistant Replies =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendingToken {
    pub symbol: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change_24h: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Reply produced by the assistant for one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AssistantReply {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trending: Option<Vec<TrendingToken>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news: Option<Vec<NewsItem>>,
}

impl AssistantReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// A reply is usable when it carries any content at all.
    pub fn is_usable(&self) -> bool {
        !self.text.trim().is_empty()
            || self.data.is_some()
            || self.trending.as_ref().is_some_and(|t| !t.is_empty())
            || self.news.as_ref().is_some_and(|n| !n.is_empty())
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlowKind::Swap => "Swap",
            FlowKind::Stake => "Stake",
            FlowKind::Yield => "Yield",
            FlowKind::Dca => "DCA",
            FlowKind::Portfolio => "Portfolio",
            FlowKind::Analysis => "Project Analysis",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NavigationTarget::Swap => "Swap",
            NavigationTarget::Stake => "Stake",
            NavigationTarget::Yield => "Yield",
            NavigationTarget::Dca => "DCA",
            NavigationTarget::Portfolio => "Portfolio",
            NavigationTarget::Wallet => "Wallet",
            NavigationTarget::Settings => "Settings",
            NavigationTarget::History => "History",
            NavigationTarget::Rewards => "Rewards",
            NavigationTarget::Dashboard => "Dashboard",
        };
        write!(f, "{}", s)
    }
}
