//! Herald Rule Matcher
//!
//! Evaluates every active alert rule against each newly ingested trade and
//! records one [`MatchEvent`](herald_core::MatchEvent) per (rule, trade) pair.
//!
//! - [`predicate`]: the per-kind predicates (member, ticker, amount threshold)
//! - [`RuleMatcher`]: batch evaluation with cursor tracking and a seen index

pub mod predicate;

mod matcher;

pub use matcher::{MatchBatch, RuleMatcher};
pub use predicate::{MatchSkip, evaluate};
