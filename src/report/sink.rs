use std::io::Write;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::fetcher::time_left;
use crate::types::{AggregatedRow, Money};

/// Consumer of a finished, already-ordered report.
pub trait ReportSink {
    fn emit(&mut self, rows: &[AggregatedRow]) -> Result<()>;
}

/// Plain-text rendering, one block per row.
pub struct TextReportSink<W: Write> {
    out: W,
    now: DateTime<Utc>,
}

impl<W: Write> TextReportSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, now: Utc::now() }
    }

    /// Render remaining time relative to a fixed instant.
    pub fn at(out: W, now: DateTime<Utc>) -> Self {
        Self { out, now }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for TextReportSink<W> {
    fn emit(&mut self, rows: &[AggregatedRow]) -> Result<()> {
        if rows.is_empty() {
            writeln!(self.out, "No listings found.")?;
            return Ok(());
        }
        for row in rows {
            let l = &row.listing;
            let r = &row.reference;
            writeln!(self.out, "{}", truncate(&l.title, 80))?;
            writeln!(
                self.out,
                "  bid: {} + shipping: {} = total: {} | {}",
                format_money(l.current_price),
                format_money(l.cheapest_shipping()),
                format_money(l.landed_cost()),
                time_left(l.end_time, self.now),
            )?;
            writeln!(self.out, "  listing: {}", or_dash(&l.detail_url))?;
            let label = r
                .matched_label
                .as_ref()
                .map(|m| format!(" ({m})"))
                .unwrap_or_default();
            writeln!(
                self.out,
                "  reference: {}{} [{}] {}",
                r.price.map(format_money).unwrap_or_else(|| "-".to_string()),
                label,
                r.status,
                r.source_url.as_deref().unwrap_or("-"),
            )?;
            writeln!(
                self.out,
                "  profit: {} ({})",
                format_profit(row.profit),
                row.profit_sign,
            )?;
        }
        self.out.flush()?;
        Ok(())
    }
}

pub fn format_money(v: Money) -> String {
    format!("${:.2}", v)
}

pub fn format_profit(v: Option<Money>) -> String {
    match v {
        Some(p) if p.is_sign_negative() => format!("-${:.2}", p.abs()),
        Some(p) => format!("+${:.2}", p),
        None => "-".to_string(),
    }
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::merger::merge;
    use crate::types::{ConditionLabel, Listing, ReferencePriceResult};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn row(found: bool) -> AggregatedRow {
        let listing = Listing {
            id: "1".to_string(),
            title: "Pikachu PSA 10".to_string(),
            current_price: dec!(40),
            shipping_options: vec![],
            end_time: Some(Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap()),
            detail_url: "https://www.ebay.com/itm/1".to_string(),
        };
        let result = if found {
            let label = ConditionLabel::graded("psa", "10");
            ReferencePriceResult::found("1", dec!(55.5), "https://ref/pikachu", label)
        } else {
            ReferencePriceResult::failed("1", None)
        };
        merge(&listing, &result)
    }

    #[test]
    fn renders_breakdown_and_profit() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut sink = TextReportSink::at(Vec::new(), now);
        sink.emit(&[row(true), row(false)]).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();

        assert!(text.contains("bid: $40.00 + shipping: $0.00 = total: $40.00 | 1d 0h 0m left"));
        assert!(text.contains("reference: $55.50 (PSA 10) [found] https://ref/pikachu"));
        assert!(text.contains("profit: +$15.50 (positive)"));
        assert!(text.contains("reference: - [failed] -"));
        assert!(text.contains("profit: - (unknown)"));
    }

    #[test]
    fn empty_report() {
        let mut sink = TextReportSink::new(Vec::new());
        sink.emit(&[]).unwrap();
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "No listings found.\n");
    }

    #[test]
    fn money_formatting() {
        assert_eq!(format_money(dec!(3.1)), "$3.10");
        assert_eq!(format_profit(Some(dec!(-7.99))), "-$7.99");
        assert_eq!(truncate("abcdef", 4), "abc…");
    }
}
