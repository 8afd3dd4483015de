//! Append-only `;`-delimited files, one per category.
//!
//! Each line is `<captured_at>;<field>;<field>…` with the fields in record
//! declaration order. A batch is serialised in memory first and appended
//! with a single write.

use crate::models::{CaptureTimestamp, SnapshotRecord, StockStatusRecord, TradeRecord};
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::MarketStore;

pub const SNAPSHOTS_FILE: &str = "snapshots.csv";
pub const TRADES_FILE: &str = "trades.csv";
pub const ADVANCERS_FILE: &str = "advancers.csv";
pub const DECLINERS_FILE: &str = "decliners.csv";

pub struct FlatFileStore {
    dir: PathBuf,
}

impl FlatFileStore {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Could not create dir {:?}", dir))?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    fn append(&self, file: &str, lines: Vec<Vec<String>>) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .from_writer(Vec::new());
        for line in &lines {
            writer.write_record(line)?;
        }
        let buf = writer.into_inner().context("Failed to serialise batch")?;

        let path = self.dir.join(file);
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Could not open {:?}", path))?;
        out.write_all(&buf)
            .with_context(|| format!("Could not append to {:?}", path))?;

        debug!("{:?}: {} lines appended", path, lines.len());
        Ok(())
    }
}

fn status_lines(stocks: &[StockStatusRecord], at: CaptureTimestamp) -> Vec<Vec<String>> {
    stocks
        .iter()
        .map(|s| {
            vec![
                at.to_string(),
                s.symbol.clone(),
                s.last_close.to_string(),
                s.current.to_string(),
                s.change.to_string(),
                s.percent_change.clone(),
            ]
        })
        .collect()
}

impl MarketStore for FlatFileStore {
    fn save_snapshot(&self, snapshot: &SnapshotRecord, captured_at: CaptureTimestamp) -> Result<()> {
        let line = vec![
            captured_at.to_string(),
            snapshot.asi.to_string(),
            snapshot.deals.to_string(),
            snapshot.volume.to_string(),
            snapshot.value.to_string(),
            snapshot.equity_cap.to_string(),
            snapshot.bond_cap.to_string(),
            snapshot.etf_cap.to_string(),
        ];
        self.append(SNAPSHOTS_FILE, vec![line])
    }

    fn save_trades(&self, trades: &[TradeRecord], captured_at: CaptureTimestamp) -> Result<()> {
        let lines = trades
            .iter()
            .map(|t| {
                vec![
                    captured_at.to_string(),
                    t.symbol.clone(),
                    t.volume.to_string(),
                    t.value.to_string(),
                ]
            })
            .collect();
        self.append(TRADES_FILE, lines)
    }

    fn save_advancers(&self, stocks: &[StockStatusRecord], captured_at: CaptureTimestamp) -> Result<()> {
        self.append(ADVANCERS_FILE, status_lines(stocks, captured_at))
    }

    fn save_decliners(&self, stocks: &[StockStatusRecord], captured_at: CaptureTimestamp) -> Result<()> {
        self.append(DECLINERS_FILE, status_lines(stocks, captured_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "ngx-flat-{}-{}-{}",
            name,
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn fixed_time() -> CaptureTimestamp {
        let at = DateTime::parse_from_rfc3339("2024-03-01T14:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        CaptureTimestamp::from_datetime(at)
    }

    #[test]
    fn test_trades_lines_are_appended() {
        let dir = scratch_dir("trades");
        let store = FlatFileStore::open(&dir).unwrap();
        let trades = [TradeRecord { symbol: "ACME".into(), volume: 1000, value: dec!(5000.00) }];

        store.save_trades(&trades, fixed_time()).unwrap();
        store.save_trades(&trades, fixed_time()).unwrap();

        let text = std::fs::read_to_string(dir.join(TRADES_FILE)).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "2024-03-01T14:30:00+00:00;ACME;1000;5000.00");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_status_line_field_order() {
        let dir = scratch_dir("decliners");
        let store = FlatFileStore::open(&dir).unwrap();
        let stocks = [StockStatusRecord {
            symbol: "OANDO".into(),
            last_close: dec!(5.00),
            current: dec!(4.50),
            change: dec!(-0.50),
            percent_change: "-10.00%".into(),
        }];

        store.save_decliners(&stocks, fixed_time()).unwrap();

        let text = std::fs::read_to_string(dir.join(DECLINERS_FILE)).unwrap();
        assert_eq!(text, "2024-03-01T14:30:00+00:00;OANDO;5.00;4.50;-0.50;-10.00%\n");
        assert!(!dir.join(ADVANCERS_FILE).exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
