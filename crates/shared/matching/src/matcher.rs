use std::sync::Arc;

use herald_core::{AlertRule, MatchCursor, MatchEvent, MatchKey, Timestamp, TradeRecord};
use herald_ports::{MatchEventStore, StoreResult};
use log::{debug, warn};

use crate::predicate::{MatchSkip, evaluate};

/// Result of matching one batch of trades
#[derive(Debug, Clone, Default)]
pub struct MatchBatch {
    /// Events recorded for the first time in this batch
    pub events: Vec<MatchEvent>,
    /// Cursor after this batch
    pub cursor: MatchCursor,
    /// Pairings that could not be evaluated
    pub skipped: Vec<(MatchKey, MatchSkip)>,
    /// Matches already recorded by an earlier or overlapping run
    pub duplicates: usize,
    /// Trades dropped because they sit below the incoming cursor
    pub stale_trades: usize,
}

/// Evaluates active rules against newly ingested trades
///
/// The seen index in [`MatchEventStore`] makes the matcher idempotent: running
/// it twice over overlapping windows records each (rule, trade) pair once.
pub struct RuleMatcher {
    events: Arc<dyn MatchEventStore>,
}

impl RuleMatcher {
    pub fn new(events: Arc<dyn MatchEventStore>) -> Self {
        Self { events }
    }

    /// Match `trades` against `rules`, starting from `cursor`
    ///
    /// Trades strictly below the cursor are skipped. Inactive rules are
    /// ignored. Data problems skip a single pairing; store failures abort the
    /// batch and propagate.
    pub async fn match_batch(
        &self,
        trades: &[TradeRecord],
        rules: &[AlertRule],
        cursor: MatchCursor,
        now: Timestamp,
    ) -> StoreResult<MatchBatch> {
        let mut batch = MatchBatch {
            cursor,
            ..Default::default()
        };

        let active: Vec<&AlertRule> = rules.iter().filter(|r| r.active).collect();

        for trade in trades {
            if cursor.is_behind(trade.ingested_at) {
                debug!(
                    "[matcher] trade {} ingested at {} is behind cursor, skipping",
                    trade.id, trade.ingested_at
                );
                batch.stale_trades += 1;
                continue;
            }
            batch.cursor = batch.cursor.advanced_to(trade.ingested_at);

            for rule in &active {
                match evaluate(rule, trade) {
                    Ok(true) => {
                        let event = MatchEvent::new(rule, trade, now);
                        if self.events.record_if_new(event.clone()).await? {
                            debug!("[matcher] rule {} matched trade {}", rule.id, trade.id);
                            batch.events.push(event);
                        } else {
                            batch.duplicates += 1;
                        }
                    }
                    Ok(false) => {}
                    Err(skip) => {
                        warn!("[matcher] skipping rule {} for trade {}: {}", rule.id, trade.id, skip);
                        batch
                            .skipped
                            .push((MatchKey::new(rule.id, trade.id.clone()), skip));
                    }
                }
            }
        }

        Ok(batch)
    }
}
