use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, ScrapeError};

// ── Capture timestamp ─────────────────────────────────────────────────────────

/// The one instant stamped on every record of an acquisition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureTimestamp(DateTime<Utc>);

impl CaptureTimestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for CaptureTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}

// ── Raw rows ──────────────────────────────────────────────────────────────────

/// Trimmed cell texts of one `<tr>`, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTableRow {
    pub cells: Vec<String>,
}

impl RawTableRow {
    pub fn new<S: Into<String>>(cells: impl IntoIterator<Item = S>) -> Self {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, idx: usize) -> &str {
        self.cells.get(idx).map(String::as_str).unwrap_or_default()
    }
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// Snapshot table as read off the page: normalised label → value.
pub type SnapshotTable = BTreeMap<String, Decimal>;

/// The market snapshot indicators that get persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub asi: Decimal,
    pub deals: Decimal,
    pub volume: Decimal,
    pub value: Decimal,
    pub equity_cap: Decimal,
    pub bond_cap: Decimal,
    pub etf_cap: Decimal,
}

/// Indicator name → labels it may appear under on the page (already normalised).
const INDICATOR_LABELS: [(&str, &[&str]); 7] = [
    ("asi", &["asi", "all-share_index", "all_share_index", "nse_all-share_index", "nse_asi"]),
    ("deals", &["deals", "total_deals"]),
    ("volume", &["volume", "total_volume", "traded_volume"]),
    ("value", &["value", "total_value", "traded_value"]),
    ("equity_cap", &["equity_cap", "equity_market_cap", "equity_capitalization"]),
    ("bond_cap", &["bond_cap", "bond_market_cap", "bond_capitalization"]),
    ("etf_cap", &["etf_cap", "etf_market_cap", "etf_capitalization"]),
];

/// Whether a normalised snapshot label names one of the persisted indicators.
pub fn is_indicator_label(label: &str) -> bool {
    INDICATOR_LABELS
        .iter()
        .any(|(_, labels)| labels.contains(&label))
}

impl SnapshotRecord {
    /// Resolve the recognised indicators out of a snapshot table.
    /// Unknown labels are ignored; a missing indicator is an error.
    pub fn from_table(table: &SnapshotTable) -> Result<Self> {
        let pick = |indicator: &'static str| -> Result<Decimal> {
            let (_, labels) = INDICATOR_LABELS
                .iter()
                .find(|(name, _)| *name == indicator)
                .ok_or(ScrapeError::MissingIndicator(indicator))?;
            labels
                .iter()
                .find_map(|label| table.get(*label).copied())
                .ok_or(ScrapeError::MissingIndicator(indicator))
        };

        Ok(Self {
            asi: pick("asi")?,
            deals: pick("deals")?,
            volume: pick("volume")?,
            value: pick("value")?,
            equity_cap: pick("equity_cap")?,
            bond_cap: pick("bond_cap")?,
            etf_cap: pick("etf_cap")?,
        })
    }
}

// ── Trades / movers ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub volume: i64,
    pub value: Decimal,
}

/// One row of the advancers or decliners table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockStatusRecord {
    pub symbol: String,
    pub last_close: Decimal,
    pub current: Decimal,
    pub change: Decimal,
    pub percent_change: String, // sign and % glyph kept as printed
}

/// All four batches read from one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketCapture {
    pub snapshot: SnapshotTable,
    pub trades: Vec<TradeRecord>,
    pub advancers: Vec<StockStatusRecord>,
    pub decliners: Vec<StockStatusRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn full_table() -> SnapshotTable {
        [
            ("all-share_index", dec!(24738.64)),
            ("deals", dec!(5432)),
            ("volume", dec!(312345678)),
            ("value", dec!(4123456789.50)),
            ("equity_cap", dec!(12925496838843.08)),
            ("bond_cap", dec!(9876543210.00)),
            ("etf_cap", dec!(1234567.00)),
            ("market_breadth", dec!(1.5)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    #[test]
    fn test_snapshot_record_resolves_aliases() {
        let record = SnapshotRecord::from_table(&full_table()).unwrap();
        assert_eq!(record.asi, dec!(24738.64));
        assert_eq!(record.deals, dec!(5432));
        assert_eq!(record.etf_cap, dec!(1234567));
    }

    #[test]
    fn test_snapshot_record_missing_indicator() {
        let mut table = full_table();
        table.remove("bond_cap");
        let err = SnapshotRecord::from_table(&table).unwrap_err();
        assert!(matches!(err, ScrapeError::MissingIndicator("bond_cap")));
    }

    #[test]
    fn test_indicator_labels() {
        assert!(is_indicator_label("all-share_index"));
        assert!(is_indicator_label("etf_cap"));
        assert!(!is_indicator_label("market_status"));
    }

    #[test]
    fn test_capture_timestamp_display_is_rfc3339() {
        let at = DateTime::parse_from_rfc3339("2024-03-01T14:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            CaptureTimestamp::from_datetime(at).to_string(),
            "2024-03-01T14:30:00+00:00"
        );
    }
}
