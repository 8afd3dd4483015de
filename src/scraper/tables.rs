//! Table extractors for the four market summary sections.
//!
//! Every section is read the same way: find the container by id, take the
//! rows of its table body, drop the trailing summary row, then project each
//! remaining row positionally into a record. Row order is kept because it is
//! the page's own ranking (e.g. advancers by percent gain).

use crate::config::{RowPolicy, SectionIds};
use crate::error::{Result, ScrapeError};
use crate::models::{is_indicator_label, MarketCapture, RawTableRow, SnapshotTable, StockStatusRecord, TradeRecord};
use tracing::{debug, warn};

use super::cleaner::{normalise_label, percent_text, symbol_text, to_decimal, to_integer};
use super::parsers::TableSource;

const SNAPSHOT_CELLS: usize = 2;
const TRADE_CELLS: usize = 3;
const STOCK_STATUS_CELLS: usize = 5;

/// Every table body on the summary page ends with a footer row ("View
/// all", totals) that is not data. The last row is removed unconditionally.
pub fn drop_summary_row(mut rows: Vec<RawTableRow>) -> Vec<RawTableRow> {
    rows.pop();
    rows
}

pub struct TableExtractor {
    sections: SectionIds,
    policy: RowPolicy,
}

impl TableExtractor {
    pub fn new(sections: SectionIds, policy: RowPolicy) -> Self {
        Self { sections, policy }
    }

    /// Snapshot, trades, advancers, decliners, in that order.
    pub fn extract_all(&self, doc: &impl TableSource) -> Result<MarketCapture> {
        Ok(MarketCapture {
            snapshot: self.snapshot(doc)?,
            trades: self.trades(doc)?,
            advancers: self.advancers(doc)?,
            decliners: self.decliners(doc)?,
        })
    }

    /// Recognised indicators only: other labels are dropped before their
    /// value is parsed, so a text value like "Open" never fails the run.
    pub fn snapshot(&self, doc: &impl TableSource) -> Result<SnapshotTable> {
        let pairs = self.project(doc, &self.sections.snapshot, SNAPSHOT_CELLS, |row| {
            let label = normalise_label(row.cell(0));
            if !is_indicator_label(&label) {
                debug!("snapshot: ignoring row `{}`", label);
                return Ok(None);
            }
            Ok(Some((label, to_decimal(row.cell(1))?)))
        })?;
        Ok(pairs.into_iter().flatten().collect())
    }

    pub fn trades(&self, doc: &impl TableSource) -> Result<Vec<TradeRecord>> {
        self.project(doc, &self.sections.trades, TRADE_CELLS, |row| {
            Ok(TradeRecord {
                symbol: symbol_text(row.cell(0)),
                volume: to_integer(row.cell(1))?,
                value: to_decimal(row.cell(2))?,
            })
        })
    }

    pub fn advancers(&self, doc: &impl TableSource) -> Result<Vec<StockStatusRecord>> {
        self.project(doc, &self.sections.advancers, STOCK_STATUS_CELLS, stock_status)
    }

    pub fn decliners(&self, doc: &impl TableSource) -> Result<Vec<StockStatusRecord>> {
        self.project(doc, &self.sections.decliners, STOCK_STATUS_CELLS, stock_status)
    }

    /// Shared row walk: section lookup, footer drop, shape check, projection.
    fn project<T>(
        &self,
        doc: &impl TableSource,
        section: &str,
        expected: usize,
        to_record: impl Fn(&RawTableRow) -> Result<T>,
    ) -> Result<Vec<T>> {
        let rows = doc
            .section_rows(section)
            .ok_or_else(|| ScrapeError::SectionNotFound(section.to_string()))?;
        let rows = drop_summary_row(rows);

        let mut records = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;

        for (idx, row) in rows.iter().enumerate() {
            let result = if row.len() != expected {
                Err(ScrapeError::MalformedRow {
                    section: section.to_string(),
                    row: idx,
                    expected,
                    found: row.len(),
                })
            } else {
                to_record(row)
            };

            match result {
                Ok(record) => records.push(record),
                Err(e) if e.is_row_scoped() && self.policy == RowPolicy::Skip => {
                    warn!("{}: skipping row {}: {}", section, idx, e);
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        debug!("{}: {} records, {} skipped", section, records.len(), skipped);
        Ok(records)
    }
}

fn stock_status(row: &RawTableRow) -> Result<StockStatusRecord> {
    Ok(StockStatusRecord {
        symbol: symbol_text(row.cell(0)),
        last_close: to_decimal(row.cell(1))?,
        current: to_decimal(row.cell(2))?,
        change: to_decimal(row.cell(3))?,
        percent_change: percent_text(row.cell(4)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::parsers::HtmlDocument;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    /// In-memory sections, no HTML involved.
    #[derive(Default)]
    struct FixtureDocument {
        sections: HashMap<String, Vec<RawTableRow>>,
    }

    impl FixtureDocument {
        fn with(mut self, id: &str, rows: &[&[&str]]) -> Self {
            let rows = rows.iter().map(|cells| RawTableRow::new(cells.iter().copied())).collect();
            self.sections.insert(id.to_string(), rows);
            self
        }
    }

    impl TableSource for FixtureDocument {
        fn section_rows(&self, section_id: &str) -> Option<Vec<RawTableRow>> {
            self.sections.get(section_id).cloned()
        }
    }

    fn extractor(policy: RowPolicy) -> TableExtractor {
        TableExtractor::new(SectionIds::default(), policy)
    }

    const SUMMARY_PAGE: &str = r#"
        <html><body>
        <div id="snapshot"><table><tbody>
          <tr><td>ASI</td><td>24,738.64</td></tr>
          <tr><td>Deals</td><td>5,432</td></tr>
          <tr><td>Volume</td><td>312,345,678</td></tr>
          <tr><td>Value</td><td>N4,123,456,789.50</td></tr>
          <tr><td>Equity Cap</td><td>N12,925,496,838,843.08</td></tr>
          <tr><td>Bond Cap</td><td>N9,876,543,210.00</td></tr>
          <tr><td>ETF Cap</td><td>N1,234,567.00</td></tr>
          <tr><td colspan="2">As at 2:30pm</td></tr>
        </tbody></table></div>
        <div id="traders"><table><tbody>
          <tr><td>ZENITHBANK</td><td>45,123,000</td><td>N1,200,450,000.00</td></tr>
          <tr><td>GTCO</td><td>30,000,500</td><td>N850,000,000.25</td></tr>
          <tr><td colspan="3">View all</td></tr>
        </tbody></table></div>
        <div id="advancers"><table><tbody>
          <tr><td>UNILEVER</td><td>N12.00</td><td>N13.20</td><td>1.20</td><td>+10.00%</td></tr>
          <tr><td>FIDELITYBK</td><td>N2.01</td><td>N2.21</td><td>0.20</td><td>+9.95%</td></tr>
          <tr><td colspan="5">View all</td></tr>
        </tbody></table></div>
        <div id="decliners"><table><tbody>
          <tr><td>OANDO</td><td>N5.00</td><td>N4.50</td><td>-0.50</td><td>-10.00%</td></tr>
          <tr><td colspan="5">View all</td></tr>
        </tbody></table></div>
        </body></html>
    "#;

    #[test]
    fn test_drop_summary_row() {
        let rows = vec![RawTableRow::new(["a"]), RawTableRow::new(["footer"])];
        assert_eq!(drop_summary_row(rows), vec![RawTableRow::new(["a"])]);
        assert!(drop_summary_row(vec![]).is_empty());
    }

    #[test]
    fn test_trades_single_row_and_footer() {
        let doc = FixtureDocument::default()
            .with("traders", &[&["ACME", "1,000", "N5,000.00"], &["Total", "1,000"]]);
        let trades = extractor(RowPolicy::Skip).trades(&doc).unwrap();
        assert_eq!(
            trades,
            vec![TradeRecord {
                symbol: "ACME".into(),
                volume: 1000,
                value: dec!(5000.00),
            }]
        );
    }

    #[test]
    fn test_snapshot_label_keys() {
        let doc = FixtureDocument::default()
            .with("snapshot", &[&["All-Share Index", "N1,000.00"], &["updated", ""]]);
        let snapshot = extractor(RowPolicy::Skip).snapshot(&doc).unwrap();
        let expected: SnapshotTable = [("all-share_index".to_string(), dec!(1000.00))].into();
        assert_eq!(snapshot, expected);
    }

    #[test]
    fn test_unknown_snapshot_label_ignored_when_strict() {
        let doc = FixtureDocument::default().with(
            "snapshot",
            &[&["ASI", "24,738.64"], &["Market Status", "Open"], &["As at 2:30pm", ""]],
        );
        let snapshot = extractor(RowPolicy::Abort).snapshot(&doc).unwrap();
        let expected: SnapshotTable = [("asi".to_string(), dec!(24738.64))].into();
        assert_eq!(snapshot, expected);
    }

    #[test]
    fn test_symbol_kept_as_printed() {
        let doc = FixtureDocument::default().with(
            "traders",
            &[&[" Zenithbank ", "10", "N1.00"], &["View all"]],
        );
        let trades = extractor(RowPolicy::Abort).trades(&doc).unwrap();
        assert_eq!(trades[0].symbol, "Zenithbank");
    }

    #[test]
    fn test_batch_length_is_body_rows_minus_one() {
        let doc = HtmlDocument::parse(SUMMARY_PAGE);
        let capture = extractor(RowPolicy::Abort).extract_all(&doc).unwrap();
        assert_eq!(capture.snapshot.len(), 7);
        assert_eq!(capture.trades.len(), 2);
        assert_eq!(capture.advancers.len(), 2);
        assert_eq!(capture.decliners.len(), 1);
    }

    #[test]
    fn test_html_page_end_to_end() {
        let doc = HtmlDocument::parse(SUMMARY_PAGE);
        let capture = extractor(RowPolicy::Abort).extract_all(&doc).unwrap();

        assert_eq!(capture.snapshot["asi"], dec!(24738.64));
        assert_eq!(capture.snapshot["equity_cap"], dec!(12925496838843.08));
        assert_eq!(capture.trades[1].symbol, "GTCO");
        assert_eq!(capture.trades[1].value, dec!(850000000.25));

        // page ranking preserved
        let symbols: Vec<_> = capture.advancers.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(symbols, ["UNILEVER", "FIDELITYBK"]);

        let oando = &capture.decliners[0];
        assert_eq!(oando.last_close, dec!(5.00));
        assert_eq!(oando.current, dec!(4.50));
        assert_eq!(oando.change, dec!(-0.50));
        assert_eq!(oando.percent_change, "-10.00%");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let doc = HtmlDocument::parse(SUMMARY_PAGE);
        let ex = extractor(RowPolicy::Skip);
        assert_eq!(ex.extract_all(&doc).unwrap(), ex.extract_all(&doc).unwrap());
    }

    #[test]
    fn test_missing_section_is_fatal() {
        let doc = FixtureDocument::default().with("traders", &[&["x"]]);
        let err = extractor(RowPolicy::Skip).advancers(&doc).unwrap_err();
        assert!(matches!(err, ScrapeError::SectionNotFound(ref s) if s == "advancers"));
    }

    #[test]
    fn test_malformed_row_skipped() {
        let doc = FixtureDocument::default().with(
            "advancers",
            &[
                &["UNILEVER", "N12.00", "N13.20", "1.20", "+10.00%"],
                &["BROKEN", "N1.00"],
                &["FIDELITYBK", "N2.01", "N2.21", "0.20", "+9.95%"],
                &["View all"],
            ],
        );
        let advancers = extractor(RowPolicy::Skip).advancers(&doc).unwrap();
        assert_eq!(advancers.len(), 2);
        assert_eq!(advancers[1].symbol, "FIDELITYBK");
    }

    #[test]
    fn test_malformed_row_aborts_when_strict() {
        let doc = FixtureDocument::default().with(
            "decliners",
            &[&["OANDO", "N5.00", "N4.50", "-0.50"], &["View all"]],
        );
        let err = extractor(RowPolicy::Abort).decliners(&doc).unwrap_err();
        assert!(matches!(
            err,
            ScrapeError::MalformedRow { row: 0, expected: 5, found: 4, .. }
        ));
    }

    #[test]
    fn test_unparseable_number_never_defaults() {
        let doc = FixtureDocument::default().with(
            "traders",
            &[&["ACME", "n/a", "N5,000.00"], &["BETA", "10", "N1.00"], &["Total"]],
        );
        let trades = extractor(RowPolicy::Skip).trades(&doc).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].symbol, "BETA");

        let err = extractor(RowPolicy::Abort).trades(&doc).unwrap_err();
        assert!(matches!(err, ScrapeError::NumericParse { kind: "integer", .. }));
    }
}
