use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::{Amount, MemberId, Ticker, Timestamp, TradeId};

/// Transaction type reported on a disclosure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Purchase,
    Sale,
    PartialSale,
    Exchange,
    Other,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Purchase => write!(f, "purchase"),
            TransactionType::Sale => write!(f, "sale"),
            TransactionType::PartialSale => write!(f, "partial sale"),
            TransactionType::Exchange => write!(f, "exchange"),
            TransactionType::Other => write!(f, "other"),
        }
    }
}

/// Disclosed amount: either an exact figure or a reporting band
///
/// Disclosures usually report a band ("$1,001 - $15,000"); the top band is
/// open-ended, so either bound may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeAmount {
    #[serde(default)]
    pub exact: Option<Amount>,
    #[serde(default)]
    pub min: Option<Amount>,
    #[serde(default)]
    pub max: Option<Amount>,
}

impl TradeAmount {
    pub fn exact(amount: Amount) -> Self {
        Self {
            exact: Some(amount),
            ..Default::default()
        }
    }

    pub fn range(min: Amount, max: Amount) -> Self {
        Self {
            exact: None,
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_least(min: Amount) -> Self {
        Self {
            exact: None,
            min: Some(min),
            max: None,
        }
    }

    /// Amount used for threshold comparisons
    ///
    /// The exact figure when present, otherwise the midpoint of the band.
    /// A band with a single bound uses that bound. `None` when nothing was
    /// reported, or when the band is too large to average.
    pub fn effective(&self) -> Option<Amount> {
        if let Some(exact) = self.exact {
            return Some(exact);
        }
        match (self.min, self.max) {
            (Some(min), Some(max)) => min.checked_add(max).map(|sum| sum / Decimal::TWO),
            (Some(bound), None) | (None, Some(bound)) => Some(bound),
            (None, None) => None,
        }
    }

    pub fn is_reported(&self) -> bool {
        self.effective().is_some()
    }
}

/// A disclosed trade, as delivered by the ingestion collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: TradeId,
    pub member_id: MemberId,
    /// Display name of the reporting member
    pub member_name: String,
    #[serde(default)]
    pub ticker: Option<Ticker>,
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub amount: TradeAmount,
    /// When the trade happened (can be weeks before ingestion)
    #[serde(default)]
    pub transaction_date: Option<NaiveDate>,
    /// When the disclosure was ingested; the basis for "new since last run"
    pub ingested_at: Timestamp,
}

impl TradeRecord {
    pub fn new(
        id: impl Into<TradeId>,
        member_id: impl Into<MemberId>,
        member_name: impl Into<String>,
        transaction_type: TransactionType,
        amount: TradeAmount,
        ingested_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            member_id: member_id.into(),
            member_name: member_name.into(),
            ticker: None,
            transaction_type,
            amount,
            transaction_date: None,
            ingested_at,
        }
    }

    pub fn with_ticker(mut self, ticker: impl Into<Ticker>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }

    pub fn with_transaction_date(mut self, date: NaiveDate) -> Self {
        self.transaction_date = Some(date);
        self
    }
}
