//! Kind-specific rule predicates
//!
//! One closed set of predicates covers every rule kind, so member, ticker and
//! amount alerts share a single matching path.

use herald_core::{AlertRule, RuleId, RuleKind, RuleTarget, TradeId, TradeRecord};
use thiserror::Error;

/// Why a rule × trade pairing could not be evaluated
///
/// A skip only affects that one pairing; the rest of the batch continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchSkip {
    #[error("trade {trade_id} reports no usable amount")]
    MissingAmount { trade_id: TradeId },

    #[error("trade {trade_id} has no member id")]
    MissingMember { trade_id: TradeId },

    #[error("rule {rule_id} has an empty {kind} target")]
    EmptyTarget { rule_id: RuleId, kind: RuleKind },
}

/// Evaluate one rule against one trade
///
/// Returns `Ok(false)` for a well-formed pairing that simply does not match,
/// and `Err` when the data needed by the rule kind is missing.
pub fn evaluate(rule: &AlertRule, trade: &TradeRecord) -> Result<bool, MatchSkip> {
    match &rule.target {
        RuleTarget::Member(member_id) => member_matches(rule, member_id, trade),
        RuleTarget::Ticker(ticker) => ticker_matches(rule, ticker, trade),
        RuleTarget::Threshold(min) => {
            let amount = trade
                .amount
                .effective()
                .ok_or_else(|| MatchSkip::MissingAmount {
                    trade_id: trade.id.clone(),
                })?;
            Ok(amount >= *min)
        }
    }
}

fn member_matches(rule: &AlertRule, member_id: &str, trade: &TradeRecord) -> Result<bool, MatchSkip> {
    if member_id.trim().is_empty() {
        return Err(MatchSkip::EmptyTarget {
            rule_id: rule.id,
            kind: RuleKind::MemberTrade,
        });
    }
    if trade.member_id.trim().is_empty() {
        return Err(MatchSkip::MissingMember {
            trade_id: trade.id.clone(),
        });
    }
    Ok(trade.member_id == member_id)
}

fn ticker_matches(rule: &AlertRule, ticker: &str, trade: &TradeRecord) -> Result<bool, MatchSkip> {
    let wanted = ticker.trim();
    if wanted.is_empty() {
        return Err(MatchSkip::EmptyTarget {
            rule_id: rule.id,
            kind: RuleKind::TickerTrade,
        });
    }
    // A trade without a ticker (bonds, real estate, ...) never matches
    Ok(trade
        .ticker
        .as_deref()
        .is_some_and(|t| t.trim().eq_ignore_ascii_case(wanted)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use herald_core::{TradeAmount, TransactionType};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn trade(amount: TradeAmount) -> TradeRecord {
        TradeRecord::new(
            "T-1",
            "P000197",
            "Nancy Pelosi",
            TransactionType::Purchase,
            amount,
            Utc::now(),
        )
        .with_ticker("NVDA")
    }

    #[test]
    fn test_member_predicate() {
        let owner = Uuid::new_v4();
        let t = trade(TradeAmount::exact(dec!(1000)));
        assert_eq!(evaluate(&AlertRule::member(owner, "p", "P000197"), &t), Ok(true));
        assert_eq!(evaluate(&AlertRule::member(owner, "p", "C001098"), &t), Ok(false));
    }

    #[test]
    fn test_ticker_predicate_ignores_case() {
        let owner = Uuid::new_v4();
        let t = trade(TradeAmount::exact(dec!(1000)));
        assert_eq!(evaluate(&AlertRule::ticker(owner, "n", "nvda"), &t), Ok(true));
        assert_eq!(evaluate(&AlertRule::ticker(owner, "n", " NvDa "), &t), Ok(true));
        assert_eq!(evaluate(&AlertRule::ticker(owner, "a", "AAPL"), &t), Ok(false));

        let mut no_ticker = t.clone();
        no_ticker.ticker = None;
        assert_eq!(evaluate(&AlertRule::ticker(owner, "n", "NVDA"), &no_ticker), Ok(false));
    }

    #[test]
    fn test_threshold_predicate() {
        let owner = Uuid::new_v4();
        let rule = AlertRule::threshold(owner, "big", dec!(100000));

        assert_eq!(evaluate(&rule, &trade(TradeAmount::exact(dec!(250000)))), Ok(true));
        assert_eq!(evaluate(&rule, &trade(TradeAmount::exact(dec!(100000)))), Ok(true));
        assert_eq!(evaluate(&rule, &trade(TradeAmount::exact(dec!(99999.99)))), Ok(false));

        // Midpoint of 50,001 - 100,000 is 75,000.5
        assert_eq!(
            evaluate(&rule, &trade(TradeAmount::range(dec!(50001), dec!(100000)))),
            Ok(false)
        );
        // Midpoint of 100,001 - 250,000 is 175,000.5
        assert_eq!(
            evaluate(&rule, &trade(TradeAmount::range(dec!(100001), dec!(250000)))),
            Ok(true)
        );
    }

    #[test]
    fn test_threshold_without_amount_is_skipped() {
        let rule = AlertRule::threshold(Uuid::new_v4(), "big", dec!(100000));
        let t = trade(TradeAmount::default());
        assert_eq!(
            evaluate(&rule, &t),
            Err(MatchSkip::MissingAmount {
                trade_id: "T-1".to_string()
            })
        );

        // The same trade is still fine for other kinds
        assert_eq!(evaluate(&AlertRule::ticker(rule.owner_id, "n", "NVDA"), &t), Ok(true));
    }

    #[test]
    fn test_empty_targets_are_skipped() {
        let owner = Uuid::new_v4();
        let t = trade(TradeAmount::exact(dec!(1)));
        assert!(matches!(
            evaluate(&AlertRule::ticker(owner, "blank", "  "), &t),
            Err(MatchSkip::EmptyTarget { kind: RuleKind::TickerTrade, .. })
        ));
        assert!(matches!(
            evaluate(&AlertRule::member(owner, "blank", ""), &t),
            Err(MatchSkip::EmptyTarget { kind: RuleKind::MemberTrade, .. })
        ));
    }
}
