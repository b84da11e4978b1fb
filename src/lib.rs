//! Crypto Command Assistant
//!
//! Core of a conversational DeFi dashboard that:
//! - Splits free text into clauses and extracts one command per clause
//! - Opens the matching operation flow (swap, stake, yield, DCA, portfolio, analysis)
//! - Falls back to a free-form responder for everything else
//! - Animates confirmed operations through a staged, cancellable pipeline
//!
//! UNIFIED LOOP:
//! INPUT → SPLIT → EXTRACT → ROUTE → (FLOW | RESPONDER) → TRANSCRIPT

pub mod api;
pub mod config;
pub mod error;
pub mod flows;
pub mod intent;
pub mod models;
pub mod pipeline;
pub mod responder;
pub mod router;
pub mod state;
pub mod transcript;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use router::{BatchOutcome, IntentRouter};
pub use state::AppController;
