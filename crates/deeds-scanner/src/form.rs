//! Form submissions for the registry's ASP.NET WebForms search page.
//!
//! Every POST must carry the `__VIEWSTATE` issued with the previous
//! response. [`SessionToken`] holds that state and is passed explicitly into
//! each request constructor.

use chrono::NaiveDate;
use deeds_core::{DateRange, DocTypeCode, SearchConfig};

const START_DATE_FIELD: &str = "ctl00$cphMainContent$txtLCSTartDate$dateInput";
const END_DATE_FIELD: &str = "ctl00$cphMainContent$txtLCEndDate$dateInput";
const START_DATE_TEXT_FIELD: &str = "ctl00_cphMainContent_txtLCSTartDate_dateInput_text";
const END_DATE_TEXT_FIELD: &str = "ctl00_cphMainContent_txtLCEndDate_dateInput_text";
const DOC_TYPE_FIELD: &str = "ctl00$cphMainContent$ddlLCDocumentType$vddlDropDown";
const SEARCH_BUTTON_FIELD: &str = "ctl00$cphMainContent$btnSearchLC";
const SEARCH_BUTTON_VALUE: &str = "Search Land Court";

/// Postback target of the results grid's pager links.
pub const RESULTS_GRID_TARGET: &str = "ctl00$cphMainContent$gvSearchResults";

/// Hidden WebForms state issued with a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub view_state: String,
    pub view_state_generator: Option<String>,
    pub event_validation: Option<String>,
}

impl SessionToken {
    #[must_use]
    pub fn new(view_state: impl Into<String>) -> Self {
        Self {
            view_state: view_state.into(),
            view_state_generator: None,
            event_validation: None,
        }
    }

    fn push_fields(&self, fields: &mut Vec<(String, String)>) {
        fields.push(("__VIEWSTATE".to_string(), self.view_state.clone()));
        if let Some(generator) = &self.view_state_generator {
            fields.push(("__VIEWSTATEGENERATOR".to_string(), generator.clone()));
        }
        if let Some(validation) = &self.event_validation {
            fields.push(("__EVENTVALIDATION".to_string(), validation.clone()));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A request to the registry: a GET, or a urlencoded form POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRequest {
    pub method: HttpMethod,
    pub url: String,
    pub fields: Vec<(String, String)>,
}

impl FormRequest {
    /// Value of a form field, if present.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Page number requested through the grid pager, if this is a page request.
    #[must_use]
    pub fn page_argument(&self) -> Option<u32> {
        self.field("__EVENTARGUMENT")?
            .strip_prefix("Page$")?
            .parse()
            .ok()
    }
}

/// The search the scraper submits: where, which dates, which document type.
#[derive(Debug, Clone)]
pub struct SearchForm {
    url: String,
    range: DateRange,
    doc_type: DocTypeCode,
}

impl SearchForm {
    #[must_use]
    pub fn new(url: impl Into<String>, range: DateRange, doc_type: DocTypeCode) -> Self {
        Self {
            url: url.into(),
            range,
            doc_type,
        }
    }

    pub fn from_config(config: &SearchConfig) -> deeds_core::Result<Self> {
        Ok(Self::new(
            config.url.clone(),
            config.date_range()?,
            config.doc_type_code.clone(),
        ))
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Plain GET of the search page, which issues the first token.
    #[must_use]
    pub fn landing_request(&self) -> FormRequest {
        FormRequest {
            method: HttpMethod::Get,
            url: self.url.clone(),
            fields: Vec::new(),
        }
    }

    /// Submit the search criteria, as pressing "Search Land Court" does.
    #[must_use]
    pub fn search_request(&self, token: &SessionToken) -> FormRequest {
        let mut fields = vec![
            (END_DATE_FIELD.to_string(), picker_date(self.range.end())),
            (START_DATE_FIELD.to_string(), picker_date(self.range.start())),
            (DOC_TYPE_FIELD.to_string(), self.doc_type.to_string()),
            (
                SEARCH_BUTTON_FIELD.to_string(),
                SEARCH_BUTTON_VALUE.to_string(),
            ),
        ];
        token.push_fields(&mut fields);

        FormRequest {
            method: HttpMethod::Post,
            url: self.url.clone(),
            fields,
        }
    }

    /// Ask the results grid for one page, as clicking a pager link does.
    #[must_use]
    pub fn page_request(&self, token: &SessionToken, page: u32) -> FormRequest {
        let mut fields = vec![
            (
                START_DATE_TEXT_FIELD.to_string(),
                display_date(self.range.start()),
            ),
            (END_DATE_TEXT_FIELD.to_string(), display_date(self.range.end())),
            (DOC_TYPE_FIELD.to_string(), self.doc_type.to_string()),
        ];
        token.push_fields(&mut fields);
        fields.push(("__EVENTARGUMENT".to_string(), format!("Page${page}")));
        fields.push(("__EVENTTARGET".to_string(), RESULTS_GRID_TARGET.to_string()));

        FormRequest {
            method: HttpMethod::Post,
            url: self.url.clone(),
            fields,
        }
    }
}

/// Date picker wire format: `2020-12-31-00-00-00`.
fn picker_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d-00-00-00").to_string()
}

/// Text box format: `1/1/2020`.
fn display_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}
