//! Deeds Scanner - registry search and result extraction.
//!
//! This crate walks the registry's ASP.NET search form page by page and turns
//! each row of the results grid into a [`DeedRecord`].
//!
//! # Features
//!
//! - Explicit `__VIEWSTATE` round-tripping between requests
//! - Pager discovery and bounded concurrent page fetching
//! - Retry logic with exponential backoff for transient failures
//! - Rate limit handling with extended backoff
//! - Per-row error isolation: a bad row is logged and skipped
//!
//! # Example
//!
//! ```rust,no_run
//! use deeds_core::AppConfig;
//! use deeds_scanner::{HttpFetcher, SearchOrchestrator};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
//! let orchestrator = SearchOrchestrator::from_config(fetcher, &config)?;
//!
//! let (records, summary) = orchestrator.collect().await?;
//! println!("{} records from {} pages", records.len(), summary.pages_total);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod description;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod fetcher;
#[allow(missing_docs)]
pub mod form;
pub mod orchestrator;
#[allow(missing_docs)]
pub mod parser;
pub mod record;

// Re-export commonly used types
pub use description::DescriptionParts;
pub use error::{Result, RowError, ScanError};
pub use fetcher::{HttpFetcher, PageFetcher};
pub use form::{FormRequest, HttpMethod, SearchForm, SessionToken};
pub use orchestrator::{RunSummary, SearchOrchestrator};
pub use parser::{extract_session_token, parse_row, GridLayout, ResultParser, ResultsPage};
pub use record::{DeedRecord, RowCells, ROW_CELL_COUNT};
