//! Shared types used across the deeds workspace.
//!
//! This module defines validated newtypes for the search parameters the
//! registry form accepts.

use crate::error::DeedsError;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Newtype for registry document-type codes.
///
/// The registry's document-type dropdown submits numeric option values
/// (for example `101627`), 1-12 digits long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocTypeCode(String);

impl DocTypeCode {
    /// Create a new `DocTypeCode` from a string.
    ///
    /// # Errors
    /// Returns error if the code is not 1-12 ASCII digits.
    pub fn new(code: impl Into<String>) -> Result<Self, DeedsError> {
        let code = code.into();
        let code = code.trim().to_string();
        Self::validate(&code)?;
        Ok(Self(code))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> Result<(), DeedsError> {
        static CODE_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = CODE_REGEX.get_or_init(|| Regex::new(r"^[0-9]{1,12}$").expect("valid regex"));

        if regex.is_match(code) {
            Ok(())
        } else {
            Err(DeedsError::Validation(format!(
                "invalid document type code: must be 1-12 digits, got '{code}'"
            )))
        }
    }
}

impl Default for DocTypeCode {
    fn default() -> Self {
        Self("101627".to_string())
    }
}

impl TryFrom<String> for DocTypeCode {
    type Error = DeedsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocTypeCode> for String {
    fn from(code: DocTypeCode) -> Self {
        code.0
    }
}

impl fmt::Display for DocTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive range of recording dates to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a new range.
    ///
    /// # Errors
    /// Returns error if `end` is before `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DeedsError> {
        if end < start {
            return Err(DeedsError::Validation(format!(
                "invalid date range: end {end} is before start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// First day of the range.
    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range (inclusive).
    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Parse an ISO `YYYY-MM-DD` date as used in configuration and CLI flags.
///
/// # Errors
/// Returns error if the text is not a valid calendar date.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate, DeedsError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| DeedsError::Validation(format!("invalid date '{value}': {e}")))
}
