use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Registry server error at {url}, HTTP {http_status}")]
    ServerError { url: String, http_status: u16 },

    #[error("Unexpected HTTP {http_status} from {url}")]
    HttpStatus { url: String, http_status: u16 },

    #[error("Rate limited by {url}, retry after {retry_after:?}")]
    RateLimited { url: String, retry_after: Duration },

    #[error("Registry page layout changed: {reason}")]
    StructureChanged { reason: String },

    #[error("Run exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Configuration error: {0}")]
    Config(#[from] deeds_core::DeedsError),
}

impl ScanError {
    /// Whether another attempt at the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::ServerError { .. } | Self::RateLimited { .. }
        )
    }

    pub(crate) fn structure(reason: impl Into<String>) -> Self {
        Self::StructureChanged {
            reason: reason.into(),
        }
    }
}

/// Reasons a single grid row cannot become a record.
///
/// These never abort a run; the row is logged and skipped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("row has {found} cells, expected {expected}")]
    CellCount { found: usize, expected: usize },

    #[error("invalid recording date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ScanError>;
