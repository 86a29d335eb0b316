//! Deeds Core - Foundation crate for the deeds registry scraper.
//!
//! This crate provides shared types, error handling and configuration
//! management that the scanner and the command-line shell depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Validated newtypes (`DocTypeCode`, `DateRange`)
//!
//! # Example
//!
//! ```rust
//! use deeds_core::AppConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! config.validate()?;
//!
//! let range = config.search.date_range()?;
//! println!("searching {range} for type {}", config.search.doc_type_code);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, GridLayout, HttpConfig, OutputConfig, RunConfig, SearchConfig};
pub use error::{ConfigError, ConfigResult, DeedsError, Result};
pub use types::{parse_iso_date, DateRange, DocTypeCode};
