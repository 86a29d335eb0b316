use async_trait::async_trait;
use chrono::NaiveDate;
use deeds_core::{AppConfig, DateRange, DocTypeCode};
use deeds_scanner::{
    FormRequest, HttpMethod, PageFetcher, Result, ScanError, SearchForm, SearchOrchestrator,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const SEARCH_URL: &str = "http://registry.test/Searches/ImageSearch.aspx";
const DEFAULT_GRID_ID: &str = "ctl00_cphMainContent_gvSearchResults";

/// Helper to render a registry response with the given pager and rows
fn registry_html(view_state: &str, pager_links: u32, rows: &[[&str; 7]]) -> String {
    let pager = if pager_links == 0 {
        String::new()
    } else {
        let links: String = (1..=pager_links)
            .map(|n| format!("<td><a href=\"javascript:__doPostBack()\">{n}</a></td>"))
            .collect();
        format!(
            r#"<tr class="gridPager"><td colspan="8"><table><tr>{links}</tr></table></td></tr>"#
        )
    };

    let rows: String = rows
        .iter()
        .enumerate()
        .map(|(i, cells)| {
            let class = if i % 2 == 0 { "gridRow" } else { "gridAltRow" };
            format!(
                r#"<tr class="{class}"><td><a href="/img">img</a></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><span>{}</span></td></tr>"#,
                cells[0], cells[1], cells[2], cells[3], cells[4], cells[5], cells[6]
            )
        })
        .collect();

    format!(
        r#"<html><body><form method="post">
        <input type="hidden" name="__VIEWSTATE" id="__VIEWSTATE" value="{view_state}" />
        <table id="{DEFAULT_GRID_ID}">{pager}{rows}</table>
        </form></body></html>"#
    )
}

fn landing_html() -> String {
    r#"<html><body><form method="post">
        <input type="hidden" name="__VIEWSTATE" id="__VIEWSTATE" value="vs-landing" />
        <input type="hidden" name="__EVENTVALIDATION" id="__EVENTVALIDATION" value="ev-landing" />
    </form></body></html>"#
        .to_string()
}

/// In-memory registry that records every request it receives.
struct MockRegistry {
    pages: u32,
    rows_per_page: usize,
    failing_pages: HashSet<u32>,
    bad_date_page: Option<u32>,
    grid_id: String,
    landing: String,
    requests: Mutex<Vec<FormRequest>>,
}

impl MockRegistry {
    fn new(pages: u32, rows_per_page: usize) -> Self {
        Self {
            pages,
            rows_per_page,
            failing_pages: HashSet::new(),
            bad_date_page: None,
            grid_id: DEFAULT_GRID_ID.to_string(),
            landing: landing_html(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn page_rows(&self, page: u32) -> String {
        let doc_nums: Vec<String> = (0..self.rows_per_page)
            .map(|row| format!("{page}-{row}"))
            .collect();
        let rows: Vec<[&str; 7]> = doc_nums
            .iter()
            .enumerate()
            .map(|(row, doc_num)| {
                let date = if self.bad_date_page == Some(page) && row == 0 {
                    "not-a-date"
                } else {
                    "03/15/2020"
                };
                [
                    date,
                    "DEED",
                    "1234",
                    "56",
                    doc_num.as_str(),
                    "TAUNTON",
                    "LOT 12A SP 45-B 123 MAIN ST $250.00",
                ]
            })
            .collect();
        registry_html(&format!("vs-page-{page}"), self.pages, &rows)
            .replace(DEFAULT_GRID_ID, &self.grid_id)
    }

    fn requests(&self) -> Vec<FormRequest> {
        self.requests.lock().expect("lock").clone()
    }

    fn page_arguments(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self
            .requests()
            .iter()
            .filter_map(FormRequest::page_argument)
            .collect();
        pages.sort_unstable();
        pages
    }
}

#[async_trait]
impl PageFetcher for MockRegistry {
    async fn fetch(&self, request: &FormRequest) -> Result<String> {
        self.requests.lock().expect("lock").push(request.clone());

        if request.method == HttpMethod::Get {
            return Ok(self.landing.clone());
        }

        match request.page_argument() {
            None => {
                let mut html = self.page_rows(1);
                html = html.replace("vs-page-1", "vs-search");
                Ok(html)
            }
            Some(page) if self.failing_pages.contains(&page) => Err(ScanError::ServerError {
                url: request.url.clone(),
                http_status: 503,
            }),
            Some(page) => Ok(self.page_rows(page)),
        }
    }
}

fn search_form() -> SearchForm {
    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date"),
        NaiveDate::from_ymd_opt(2020, 12, 31).expect("valid date"),
    )
    .expect("valid range");
    SearchForm::new(SEARCH_URL, range, DocTypeCode::default())
}

fn orchestrator(registry: &Arc<MockRegistry>) -> SearchOrchestrator<MockRegistry> {
    SearchOrchestrator::new(Arc::clone(registry), search_form())
        .with_max_retries(1)
        .with_retry_delay(Duration::from_millis(1))
}

#[tokio::test]
async fn test_every_page_requested_once() {
    let registry = Arc::new(MockRegistry::new(3, 2));

    let (records, summary) = orchestrator(&registry)
        .collect()
        .await
        .expect("run should succeed");

    assert_eq!(registry.page_arguments(), vec![1, 2, 3]);
    assert_eq!(summary.pages_total, 3);
    assert_eq!(summary.records_emitted, 6);
    assert!(summary.is_complete());
    assert_eq!(records.len(), 6);

    let doc_nums: Vec<&str> = records.iter().map(|r| r.doc_num.as_str()).collect();
    assert_eq!(doc_nums, vec!["1-0", "1-1", "2-0", "2-1", "3-0", "3-1"]);

    let first = &records[0];
    assert_eq!(first.date, NaiveDate::from_ymd_opt(2020, 3, 15).expect("valid date"));
    assert_eq!(first.description.as_deref(), Some("LOT 12A SP 45-B"));
    assert_eq!(first.street_address.as_deref(), Some("123 MAIN ST"));
    assert_eq!(first.cost, Some(250.0));
}

#[tokio::test]
async fn test_tokens_flow_between_requests() {
    let registry = Arc::new(MockRegistry::new(2, 1));

    orchestrator(&registry)
        .collect()
        .await
        .expect("run should succeed");

    let requests = registry.requests();
    assert_eq!(requests[0].method, HttpMethod::Get);

    let search = &requests[1];
    assert_eq!(search.field("__VIEWSTATE"), Some("vs-landing"));
    assert_eq!(search.field("__EVENTVALIDATION"), Some("ev-landing"));
    assert_eq!(
        search.field("ctl00$cphMainContent$btnSearchLC"),
        Some("Search Land Court")
    );

    for page_request in &requests[2..] {
        assert_eq!(page_request.field("__VIEWSTATE"), Some("vs-search"));
        assert_eq!(
            page_request.field("__EVENTTARGET"),
            Some("ctl00$cphMainContent$gvSearchResults")
        );
    }
}

#[tokio::test]
async fn test_failed_page_does_not_abort_run() {
    let mut registry = MockRegistry::new(3, 2);
    registry.failing_pages.insert(2);
    let registry = Arc::new(registry);

    let (records, summary) = orchestrator(&registry)
        .collect()
        .await
        .expect("run should succeed");

    assert_eq!(records.len(), 4);
    assert_eq!(summary.pages_failed, vec![2]);
    assert!(!summary.is_complete());

    // One retry for the failing page
    let page_two = registry
        .requests()
        .iter()
        .filter(|r| r.page_argument() == Some(2))
        .count();
    assert_eq!(page_two, 2);
}

#[tokio::test]
async fn test_bad_row_is_skipped() {
    let mut registry = MockRegistry::new(2, 3);
    registry.bad_date_page = Some(2);
    let registry = Arc::new(registry);

    let (records, summary) = orchestrator(&registry)
        .collect()
        .await
        .expect("run should succeed");

    assert_eq!(summary.rows_skipped, 1);
    assert_eq!(summary.records_emitted, 5);
    assert!(records.iter().all(|r| r.doc_num != "2-0"));
}

#[tokio::test]
async fn test_missing_view_state_aborts_run() {
    let mut registry = MockRegistry::new(3, 1);
    registry.landing = "<html><body><p>Maintenance</p></body></html>".to_string();
    let registry = Arc::new(registry);

    let err = orchestrator(&registry)
        .collect()
        .await
        .expect_err("run should fail");

    assert!(matches!(err, ScanError::StructureChanged { .. }));
    assert_eq!(registry.requests().len(), 1);
}

#[tokio::test]
async fn test_no_pager_reads_search_response() {
    let registry = Arc::new(MockRegistry::new(0, 3));

    let (records, summary) = orchestrator(&registry)
        .collect()
        .await
        .expect("run should succeed");

    assert!(registry.page_arguments().is_empty());
    assert_eq!(summary.pages_total, 1);
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn test_concurrent_pages_all_arrive() {
    let registry = Arc::new(MockRegistry::new(5, 2));

    let (records, summary) = orchestrator(&registry)
        .with_max_concurrent_pages(3)
        .collect()
        .await
        .expect("run should succeed");

    assert_eq!(registry.page_arguments(), vec![1, 2, 3, 4, 5]);
    assert_eq!(summary.records_emitted, 10);

    let mut doc_nums: Vec<String> = records.into_iter().map(|r| r.doc_num).collect();
    doc_nums.sort();
    doc_nums.dedup();
    assert_eq!(doc_nums.len(), 10);
}

#[tokio::test]
async fn test_dropped_receiver_stops_run() {
    let registry = Arc::new(MockRegistry::new(3, 2));
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let summary = orchestrator(&registry)
        .run(tx)
        .await
        .expect("run should stop cleanly");

    assert_eq!(summary.records_emitted, 0);
    assert_eq!(registry.page_arguments(), vec![1]);
}

struct StalledFetcher;

#[async_trait]
impl PageFetcher for StalledFetcher {
    async fn fetch(&self, _request: &FormRequest) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

#[tokio::test(start_paused = true)]
async fn test_deadline_aborts_stalled_run() {
    let orchestrator = SearchOrchestrator::new(Arc::new(StalledFetcher), search_form())
        .with_deadline(Some(Duration::from_secs(5)));

    let err = orchestrator.collect().await.expect_err("deadline should fire");

    assert!(matches!(err, ScanError::DeadlineExceeded(d) if d == Duration::from_secs(5)));
}

/// Fails with a rate limit on the first landing request, then behaves.
struct RateLimitedOnce {
    inner: MockRegistry,
    limited: Mutex<bool>,
}

#[async_trait]
impl PageFetcher for RateLimitedOnce {
    async fn fetch(&self, request: &FormRequest) -> Result<String> {
        {
            let mut limited = self.limited.lock().expect("lock");
            if !*limited {
                *limited = true;
                return Err(ScanError::RateLimited {
                    url: request.url.clone(),
                    retry_after: Duration::from_secs(30),
                });
            }
        }
        self.inner.fetch(request).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_is_retried() {
    let fetcher = Arc::new(RateLimitedOnce {
        inner: MockRegistry::new(1, 1),
        limited: Mutex::new(false),
    });

    let (records, _summary) = SearchOrchestrator::new(fetcher, search_form())
        .collect()
        .await
        .expect("run should recover");

    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_configured_grid_id_is_used() {
    let mut registry = MockRegistry::new(2, 1);
    registry.grid_id = "searchResults".to_string();
    let registry = Arc::new(registry);

    let mut config = AppConfig::default();
    config.search.url = SEARCH_URL.to_string();
    config.grid.grid_id = "searchResults".to_string();
    config.http.retry_delay_ms = 1;
    config.validate().expect("valid config");

    let (records, summary) = SearchOrchestrator::from_config(Arc::clone(&registry), &config)
        .expect("orchestrator from config")
        .collect()
        .await
        .expect("run should succeed");

    assert_eq!(summary.pages_total, 2);
    assert_eq!(records.len(), 2);

    // The default layout cannot find the renamed grid
    let err = SearchOrchestrator::new(Arc::clone(&registry), search_form())
        .collect()
        .await
        .expect_err("default grid id is absent");
    assert!(matches!(err, ScanError::StructureChanged { .. }));
}
