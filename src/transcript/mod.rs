//! Conversation transcript
//!
//! Ordered record of turns (user clause + assistant reply) shown in the chat
//! pane. Bounded: the oldest turns are dropped once capacity is exceeded.

use crate::models::AssistantReply;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    /// A flow was opened for the clause.
    FlowOpened,
    /// The view changed to a page.
    Navigation,
    /// Reply from the fallback responder.
    Answer,
    /// The fallback responder failed.
    Error,
    /// Nothing in the input could be handled.
    NotUnderstood,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub turn_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: TurnKind,
    /// The clause (or whole input, for `NotUnderstood`) this turn answers.
    pub user: String,
    pub reply: AssistantReply,
}

impl Turn {
    pub fn new(kind: TurnKind, user: impl Into<String>, reply: AssistantReply) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            user: user.into(),
            reply,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    capacity: usize,
    turns: VecDeque<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            created_at: Utc::now(),
            updated_at: Utc::now(),
            capacity: capacity.max(1),
            turns: VecDeque::new(),
        }
    }

    /// Append a turn, evicting the oldest if over capacity.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
        self.updated_at = Utc::now();
    }

    pub fn turns(&self) -> impl DoubleEndedIterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turns_keep_insertion_order() {
        let mut transcript = Transcript::new();
        transcript.push(Turn::new(TurnKind::Answer, "first", AssistantReply::text("one")));
        transcript.push(Turn::new(TurnKind::Answer, "second", AssistantReply::text("two")));

        let users: Vec<&str> = transcript.turns().map(|t| t.user.as_str()).collect();
        assert_eq!(users, vec!["first", "second"]);
        assert_eq!(transcript.turns().next_back().unwrap().user, "second");
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut transcript = Transcript::with_capacity(3);
        for i in 0..5 {
            transcript.push(Turn::new(
                TurnKind::Answer,
                format!("q{}", i),
                AssistantReply::text("a"),
            ));
        }

        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.turns().next().unwrap().user, "q2");
    }
}
