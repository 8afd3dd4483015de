pub mod flat_file;

use crate::models::{CaptureTimestamp, SnapshotRecord, StockStatusRecord, TradeRecord};
use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use chrono::{NaiveDateTime, Utc};
use duckdb::{Connection, params};
use std::path::Path;
use tracing::info;

pub use self::flat_file::FlatFileStore;

// ── Store contract ────────────────────────────────────────────────────────────

/// Where a run's batches end up. Each call stores the whole batch or fails.
pub trait MarketStore {
    fn save_snapshot(&self, snapshot: &SnapshotRecord, captured_at: CaptureTimestamp) -> Result<()>;
    fn save_trades(&self, trades: &[TradeRecord], captured_at: CaptureTimestamp) -> Result<()>;
    fn save_advancers(&self, stocks: &[StockStatusRecord], captured_at: CaptureTimestamp) -> Result<()>;
    fn save_decliners(&self, stocks: &[StockStatusRecord], captured_at: CaptureTimestamp) -> Result<()>;
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// Fractional digits of every `DECIMAL(38,10)` column.
const MONEY_SCALE: u32 = 10;

/// Bind text for a money column. DuckDB would round extra fractional digits
/// on the cast, so a value finer than the column is refused instead.
fn money(d: &Decimal) -> Result<String> {
    if d.scale() > MONEY_SCALE {
        bail!("{} has more than {} fractional digits", d, MONEY_SCALE);
    }
    Ok(d.to_string())
}

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS snapshots (
    captured_at     TIMESTAMP PRIMARY KEY,
    asi             DECIMAL(38,10) NOT NULL,
    deals           DECIMAL(38,10) NOT NULL,
    traded_volume   DECIMAL(38,10) NOT NULL,
    traded_value    DECIMAL(38,10) NOT NULL,
    equity_cap      DECIMAL(38,10) NOT NULL,
    bond_cap        DECIMAL(38,10) NOT NULL,
    etf_cap         DECIMAL(38,10) NOT NULL
);

CREATE TABLE IF NOT EXISTS trades (
    captured_at     TIMESTAMP NOT NULL,
    seq             INTEGER   NOT NULL,
    symbol          VARCHAR   NOT NULL,
    traded_volume   BIGINT    NOT NULL,
    traded_value    DECIMAL(38,10) NOT NULL,
    PRIMARY KEY (captured_at, seq)
);

-- seq keeps the page's ranking
CREATE TABLE IF NOT EXISTS advancers (
    captured_at     TIMESTAMP NOT NULL,
    seq             INTEGER   NOT NULL,
    symbol          VARCHAR   NOT NULL,
    last_close      DECIMAL(38,10) NOT NULL,
    current_price   DECIMAL(38,10) NOT NULL,
    price_change    DECIMAL(38,10) NOT NULL,
    percent_change  VARCHAR   NOT NULL,
    PRIMARY KEY (captured_at, seq)
);

CREATE TABLE IF NOT EXISTS decliners (
    captured_at     TIMESTAMP NOT NULL,
    seq             INTEGER   NOT NULL,
    symbol          VARCHAR   NOT NULL,
    last_close      DECIMAL(38,10) NOT NULL,
    current_price   DECIMAL(38,10) NOT NULL,
    price_change    DECIMAL(38,10) NOT NULL,
    percent_change  VARCHAR   NOT NULL,
    PRIMARY KEY (captured_at, seq)
);

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_trades_symbol    ON trades (symbol);
CREATE INDEX IF NOT EXISTS idx_advancers_symbol ON advancers (symbol);
CREATE INDEX IF NOT EXISTS idx_decliners_symbol ON decliners (symbol);
"#;

/// Record counts per category, for `stats`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub snapshots: i64,
    pub trades: i64,
    pub advancers: i64,
    pub decliners: i64,
    pub latest_capture: Option<NaiveDateTime>,
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running migrations…");
        self.conn.execute_batch(DDL).context("DDL failed")?;
        self.conn.execute_batch(INDEXES).context("Index creation failed")?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    fn insert_statuses(
        &self,
        table: &str,
        stocks: &[StockStatusRecord],
        captured_at: CaptureTimestamp,
    ) -> Result<()> {
        let at = captured_at.as_datetime().naive_utc();
        let sql = format!(
            r#"INSERT INTO {table}
                   (captured_at, seq, symbol, last_close, current_price, price_change, percent_change)
               VALUES (?, ?, ?,
                   CAST(? AS DECIMAL(38,10)), CAST(? AS DECIMAL(38,10)), CAST(? AS DECIMAL(38,10)),
                   ?)"#
        );

        let tx = self.conn.unchecked_transaction()?;
        for (seq, s) in stocks.iter().enumerate() {
            tx.execute(&sql, params![
                at, seq as i64, s.symbol,
                money(&s.last_close)?, money(&s.current)?, money(&s.change)?,
                s.percent_change,
            ]).with_context(|| format!("insert {} {}", table, s.symbol))?;
        }
        tx.commit()?;
        Ok(())
    }

    // ── Stats ─────────────────────────────────────────────────────────────────

    fn count(&self, table: &str) -> Result<i64> {
        let mut s = self.conn.prepare(&format!("SELECT COUNT(*) FROM {table}"))?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let mut s = self.conn.prepare("SELECT MAX(captured_at) FROM snapshots")?;
        let latest_capture: Option<NaiveDateTime> = s.query_row([], |r| r.get(0))?;
        Ok(StoreStats {
            snapshots: self.count("snapshots")?,
            trades: self.count("trades")?,
            advancers: self.count("advancers")?,
            decliners: self.count("decliners")?,
            latest_capture,
        })
    }
}

impl MarketStore for Repository {
    fn save_snapshot(&self, snapshot: &SnapshotRecord, captured_at: CaptureTimestamp) -> Result<()> {
        self.conn.execute(
            r#"INSERT INTO snapshots
                   (captured_at, asi, deals, traded_volume, traded_value, equity_cap, bond_cap, etf_cap)
               VALUES (?,
                   CAST(? AS DECIMAL(38,10)), CAST(? AS DECIMAL(38,10)), CAST(? AS DECIMAL(38,10)),
                   CAST(? AS DECIMAL(38,10)), CAST(? AS DECIMAL(38,10)), CAST(? AS DECIMAL(38,10)),
                   CAST(? AS DECIMAL(38,10)))"#,
            params![
                captured_at.as_datetime().naive_utc(),
                money(&snapshot.asi)?,
                money(&snapshot.deals)?,
                money(&snapshot.volume)?,
                money(&snapshot.value)?,
                money(&snapshot.equity_cap)?,
                money(&snapshot.bond_cap)?,
                money(&snapshot.etf_cap)?,
            ],
        ).with_context(|| format!("insert snapshot {}", captured_at))?;
        Ok(())
    }

    fn save_trades(&self, trades: &[TradeRecord], captured_at: CaptureTimestamp) -> Result<()> {
        let at = captured_at.as_datetime().naive_utc();
        let tx = self.conn.unchecked_transaction()?;
        for (seq, t) in trades.iter().enumerate() {
            tx.execute(
                r#"INSERT INTO trades (captured_at, seq, symbol, traded_volume, traded_value)
                   VALUES (?, ?, ?, ?, CAST(? AS DECIMAL(38,10)))"#,
                params![at, seq as i64, t.symbol, t.volume, money(&t.value)?],
            ).with_context(|| format!("insert trade {}", t.symbol))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn save_advancers(&self, stocks: &[StockStatusRecord], captured_at: CaptureTimestamp) -> Result<()> {
        self.insert_statuses("advancers", stocks, captured_at)
    }

    fn save_decliners(&self, stocks: &[StockStatusRecord], captured_at: CaptureTimestamp) -> Result<()> {
        self.insert_statuses("decliners", stocks, captured_at)
    }
}
