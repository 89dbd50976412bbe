//! Rendered notification messages
//!
//! Every event carries its own snapshot of the trade and rule, so rendering
//! is a pure function of the job.

use herald_core::{BatchKey, MatchEvent, NotificationJob, TradeAmount};
use herald_ports::RenderedNotification;
use rust_decimal::Decimal;

/// Render a job into an email subject and body
pub fn render(job: &NotificationJob) -> RenderedNotification {
    let subject = match (job.events.as_slice(), &job.batch_key) {
        ([event], None) => single_subject(event),
        (events, Some(BatchKey::Daily { date, .. })) => {
            format!("Daily digest for {}: {}", date, count(events.len()))
        }
        (events, Some(BatchKey::Weekly { week_start, .. })) => {
            format!("Weekly digest for the week of {}: {}", week_start, count(events.len()))
        }
        (events, _) => format!("{} while notifications were paused", count(events.len())),
    };

    let mut body = String::new();
    if job.events.len() > 1 || job.is_digest() {
        body.push_str(&format!("{} matched your alert rules.\n\n", count(job.events.len())));
    }
    for event in &job.events {
        body.push_str(&line(event));
        body.push('\n');
    }

    RenderedNotification { subject, body }
}

fn count(n: usize) -> String {
    if n == 1 {
        "1 trade alert".to_string()
    } else {
        format!("{} trade alerts", n)
    }
}

fn single_subject(event: &MatchEvent) -> String {
    let trade = &event.trade;
    match &trade.ticker {
        Some(ticker) => format!(
            "Trade alert: {} {} {}",
            trade.member_name,
            trade.transaction_type,
            ticker.trim().to_uppercase()
        ),
        None => format!("Trade alert: {} {}", trade.member_name, trade.transaction_type),
    }
}

fn line(event: &MatchEvent) -> String {
    let trade = &event.trade;
    let asset = trade
        .ticker
        .as_deref()
        .map(|t| t.trim().to_uppercase())
        .unwrap_or_else(|| "an undisclosed asset".to_string());
    let mut line = format!(
        "- [{}] {} reported a {} of {} ({})",
        event.rule_name,
        trade.member_name,
        trade.transaction_type,
        asset,
        format_amount(&trade.amount)
    );
    if let Some(date) = trade.transaction_date {
        line.push_str(&format!(" on {}", date));
    }
    line
}

/// Human-readable amount: `$250,000`, `$1,001 - $15,000`, `over $50,000,000`
pub fn format_amount(amount: &TradeAmount) -> String {
    if let Some(exact) = amount.exact {
        return dollars(exact);
    }
    match (amount.min, amount.max) {
        (Some(min), Some(max)) => format!("{} - {}", dollars(min), dollars(max)),
        (Some(min), None) => format!("over {}", dollars(min)),
        (None, Some(max)) => format!("up to {}", dollars(max)),
        (None, None) => "amount not disclosed".to_string(),
    }
}

fn dollars(amount: Decimal) -> String {
    let rounded = amount.round_dp(2).normalize();
    let sign = if rounded.is_sign_negative() { "-" } else { "" };
    let text = rounded.abs().to_string();
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match fraction {
        Some(fraction) => format!("{}${}.{:0<2}", sign, grouped, fraction),
        None => format!("{}${}", sign, grouped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use herald_core::{AlertRule, TradeRecord, TransactionType};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn event(rule: &AlertRule, id: &str, ticker: Option<&str>) -> MatchEvent {
        let mut trade = TradeRecord::new(
            id,
            "P000197",
            "Nancy Pelosi",
            TransactionType::Purchase,
            TradeAmount::exact(dec!(250000)),
            Utc::now(),
        );
        trade.ticker = ticker.map(str::to_string);
        MatchEvent::new(rule, &trade, Utc::now())
    }

    #[test]
    fn test_amount_formatting() {
        assert_eq!(format_amount(&TradeAmount::exact(dec!(250000))), "$250,000");
        assert_eq!(format_amount(&TradeAmount::exact(dec!(999))), "$999");
        assert_eq!(format_amount(&TradeAmount::exact(dec!(1234.5))), "$1,234.50");
        assert_eq!(
            format_amount(&TradeAmount::range(dec!(1001), dec!(15000))),
            "$1,001 - $15,000"
        );
        assert_eq!(
            format_amount(&TradeAmount::at_least(dec!(50000000))),
            "over $50,000,000"
        );
        assert_eq!(format_amount(&TradeAmount::default()), "amount not disclosed");
    }

    #[test]
    fn test_single_event_render() {
        let rule = AlertRule::threshold(Uuid::new_v4(), "Big trades", dec!(100000));
        let now = Utc::now();
        let job = NotificationJob::new(
            rule.owner_id,
            "u@example.com",
            vec![event(&rule, "t1", Some("nvda"))],
            now,
            now,
        );

        let rendered = render(&job);
        assert_eq!(rendered.subject, "Trade alert: Nancy Pelosi purchase NVDA");
        assert_eq!(
            rendered.body,
            "- [Big trades] Nancy Pelosi reported a purchase of NVDA ($250,000)\n"
        );
    }

    #[test]
    fn test_digest_render_has_header() {
        let rule = AlertRule::threshold(Uuid::new_v4(), "Big trades", dec!(100000));
        let now = Utc::now();
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let job = NotificationJob::new(
            rule.owner_id,
            "u@example.com",
            vec![event(&rule, "t1", Some("NVDA")), event(&rule, "t2", None)],
            now,
            now,
        )
        .with_batch_key(BatchKey::Daily {
            owner_id: rule.owner_id,
            date,
        });

        let rendered = render(&job);
        assert_eq!(rendered.subject, "Daily digest for 2024-05-06: 2 trade alerts");
        assert!(rendered.body.starts_with("2 trade alerts matched your alert rules."));
        assert!(rendered.body.contains("an undisclosed asset"));
        assert_eq!(rendered.body.lines().filter(|l| l.starts_with("- ")).count(), 2);
    }
}
