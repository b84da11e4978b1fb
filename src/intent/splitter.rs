//! Command Splitter
//!
//! Breaks one raw input into clauses on "and" / "&" boundaries.
//! Order is preserved; it is the order clauses are routed in.

use crate::models::{Clause, RawInput};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CONJUNCTION: Regex =
        Regex::new(r"(?i)\band\b|&").expect("conjunction pattern is valid");
}

/// Split raw text into normalized clauses, dropping empty pieces.
///
/// Never fails: input with no conjunction yields a single clause
/// (or none, if the input is blank).
pub fn split_clauses(text: &str) -> Vec<Clause> {
    CONJUNCTION
        .split(text)
        .filter_map(Clause::normalize)
        .collect()
}

pub fn split_input(input: &RawInput) -> Vec<Clause> {
    split_clauses(input.text())
}
