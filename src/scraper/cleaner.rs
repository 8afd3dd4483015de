//! Value normalisation: page text → typed numbers.

use crate::error::{Result, ScrapeError};
use rust_decimal::Decimal;
use std::str::FromStr;

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Comma-grouped integer.
/// "12,345" → 12345
pub fn to_integer(s: &str) -> Result<i64> {
    let cleaned = s.trim().replace(',', "");
    cleaned.parse().map_err(|_| ScrapeError::NumericParse {
        input: s.to_string(),
        kind: "integer",
    })
}

/// Naira amount, optionally prefixed with the currency glyph.
/// "N1,234.50" → 1234.50 | "₦0.00" → 0 | "-0.45" → -0.45
pub fn to_decimal(s: &str) -> Result<Decimal> {
    let trimmed = s.trim();
    let unprefixed = trimmed
        .strip_prefix('N')
        .or_else(|| trimmed.strip_prefix('₦'))
        .unwrap_or(trimmed);
    let cleaned = unprefixed.trim().replace(',', "");
    let err = || ScrapeError::NumericParse {
        input: s.to_string(),
        kind: "decimal",
    };
    // `Decimal::from_str` also takes `_` digit separators
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
    {
        return Err(err());
    }
    Decimal::from_str(&cleaned).map_err(|_| err())
}

/// Percent change stays text: "+9.95%", "-10.00 %", "9.95" all occur.
pub fn percent_text(s: &str) -> String {
    s.trim().to_string()
}

/// Snapshot label → stable key.
/// "Equity  Cap" → "equity_cap" | "All-Share Index" → "all-share_index"
pub fn normalise_label(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Ticker symbol as printed, surrounding whitespace removed.
pub fn symbol_text(s: &str) -> String {
    s.trim().to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
