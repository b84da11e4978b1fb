//! Command interpretation
//!
//! raw text → clauses → one command per clause.

pub mod extractor;
pub mod patterns;
pub mod splitter;

pub use extractor::{Extraction, SlotExtractor};
pub use patterns::{IntentFamily, IntentPattern, Specificity, INTENT_PATTERNS};
pub use splitter::{split_clauses, split_input};
