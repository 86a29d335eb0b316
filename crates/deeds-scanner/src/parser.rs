use crate::description::DescriptionParts;
use crate::error::{Result, RowError, ScanError};
use crate::form::SessionToken;
use crate::record::{DeedRecord, RowCells, ROW_CELL_COUNT};
use chrono::NaiveDate;
pub use deeds_core::GridLayout;
use scraper::{ElementRef, Html, Selector};

/// Recording dates in the grid read `03/15/2020`.
const GRID_DATE_FORMAT: &str = "%m/%d/%Y";

/// Compiled selectors for one [`GridLayout`].
#[derive(Debug)]
pub struct ResultParser {
    grid: Selector,
    rows: Selector,
    pager: Selector,
    table: Selector,
    cell: Selector,
}

impl ResultParser {
    pub fn new(layout: &GridLayout) -> Result<Self> {
        if layout.row_classes.is_empty() {
            return Err(ScanError::structure("grid layout names no row classes"));
        }

        let grid_id = &layout.grid_id;
        let rows = layout
            .row_classes
            .iter()
            .map(|class| format!("#{grid_id} tr.{class}"))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(Self {
            grid: compile(&format!("#{grid_id}"))?,
            rows: compile(&rows)?,
            pager: compile(&format!("#{grid_id} tr.{}", layout.pager_class))?,
            table: compile("table")?,
            cell: compile("td")?,
        })
    }

    /// Parse the response to the search submission.
    pub fn parse_results(&self, html: &str) -> Result<ResultsPage> {
        let document = Html::parse_document(html);
        let token = session_token(&document)?;
        self.ensure_grid(&document)?;

        // The pager row nests its own table with one cell per page link.
        let page_count = document
            .select(&self.pager)
            .next()
            .and_then(|pager| pager.select(&self.table).next())
            .and_then(|links| u32::try_from(links.select(&self.cell).count()).ok())
            .filter(|&n| n > 0);

        Ok(ResultsPage {
            token,
            page_count,
            rows: self.collect_rows(&document),
        })
    }

    /// Parse the grid rows of one result page.
    pub fn parse_rows(&self, html: &str) -> Result<Vec<std::result::Result<RowCells, RowError>>> {
        let document = Html::parse_document(html);
        self.ensure_grid(&document)?;
        Ok(self.collect_rows(&document))
    }

    fn ensure_grid(&self, document: &Html) -> Result<()> {
        if document.select(&self.grid).next().is_none() {
            return Err(ScanError::structure("results grid not found"));
        }
        Ok(())
    }

    fn collect_rows(&self, document: &Html) -> Vec<std::result::Result<RowCells, RowError>> {
        document.select(&self.rows).map(row_cells).collect()
    }
}

/// What the search response tells us: the next token, how many pages, and
/// the rows it already shows.
#[derive(Debug, Clone)]
pub struct ResultsPage {
    pub token: SessionToken,
    /// `None` when the grid has no pager, i.e. everything fits on one page.
    pub page_count: Option<u32>,
    pub rows: Vec<std::result::Result<RowCells, RowError>>,
}

impl ResultsPage {
    pub fn parse(html: &str, layout: &GridLayout) -> Result<Self> {
        ResultParser::new(layout)?.parse_results(html)
    }
}

/// Read the hidden WebForms state from a response.
pub fn extract_session_token(html: &str) -> Result<SessionToken> {
    session_token(&Html::parse_document(html))
}

/// Turn one grid row into a record.
pub fn parse_row(row: &RowCells) -> std::result::Result<DeedRecord, RowError> {
    let raw_date = row.date().trim();
    let date = NaiveDate::parse_from_str(raw_date, GRID_DATE_FORMAT).map_err(|e| {
        RowError::InvalidDate {
            value: raw_date.to_string(),
            reason: e.to_string(),
        }
    })?;

    let description = DescriptionParts::parse(row.description());

    Ok(DeedRecord {
        date,
        doc_type: row.doc_type().trim().to_string(),
        book: non_empty(row.book()),
        page_num: non_empty(row.page_num()),
        doc_num: row.doc_num().trim().to_string(),
        city: row.city().trim().to_string(),
        description: description.description(),
        cost: description.cost,
        street_address: description.street_address,
        state: None,
        zip: None,
    })
}

fn session_token(document: &Html) -> Result<SessionToken> {
    let view_state = hidden_input(document, "__VIEWSTATE")
        .ok_or_else(|| ScanError::structure("__VIEWSTATE input not found"))?;

    Ok(SessionToken {
        view_state,
        view_state_generator: hidden_input(document, "__VIEWSTATEGENERATOR"),
        event_validation: hidden_input(document, "__EVENTVALIDATION"),
    })
}

fn hidden_input(document: &Html, id: &str) -> Option<String> {
    let selector = Selector::parse(&format!("input#{id}")).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
}

fn row_cells(row: ElementRef) -> std::result::Result<RowCells, RowError> {
    let texts: Vec<String> = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "td")
        .map(|td| td.text().collect::<String>().trim().to_string())
        .collect();

    let found = texts.len();
    let cells: [String; ROW_CELL_COUNT] = texts.try_into().map_err(|_| RowError::CellCount {
        found,
        expected: ROW_CELL_COUNT,
    })?;

    Ok(RowCells::new(cells))
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| ScanError::structure(format!("invalid selector '{selector}': {e}")))
}
