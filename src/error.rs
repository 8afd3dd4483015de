use thiserror::Error;

/// Everything that can go wrong during one acquisition run.
///
/// `MalformedRow` and `NumericParse` are row-scoped: the extractor decides,
/// via [`crate::config::RowPolicy`], whether they skip the row or abort the
/// batch. Every other variant ends the run before anything is stored.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("page unavailable: readiness marker `{marker}` never appeared at {url} after {retries} retries")]
    PageUnavailable {
        url: String,
        marker: String,
        retries: u32,
    },

    #[error("section `{0}` not found on page (layout changed?)")]
    SectionNotFound(String),

    #[error("malformed row {row} in section `{section}`: expected {expected} cells, found {found}")]
    MalformedRow {
        section: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("cannot parse {kind} from {input:?}")]
    NumericParse { input: String, kind: &'static str },

    #[error("snapshot indicator `{0}` missing from page")]
    MissingIndicator(&'static str),

    #[error("page session failed: {0:#}")]
    Session(anyhow::Error),

    #[error("storage failed: {0:#}")]
    Storage(anyhow::Error),
}

impl ScrapeError {
    /// Row-scoped errors may be skipped; the rest abort the run.
    pub fn is_row_scoped(&self) -> bool {
        matches!(
            self,
            ScrapeError::MalformedRow { .. } | ScrapeError::NumericParse { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
