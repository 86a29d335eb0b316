//! Search orchestrator driving one registry run.
//!
//! A run is an explicit chain: load the search page, submit the criteria with
//! the token it issued, read the pager, then request every result page with
//! the token from the search response. Pages are fetched with bounded
//! concurrency and every request goes through the same retry policy.

use crate::error::{Result, RowError, ScanError};
use crate::fetcher::PageFetcher;
use crate::form::{FormRequest, SearchForm, SessionToken};
use crate::parser::{extract_session_token, parse_row, GridLayout, ResultParser};
use crate::record::{DeedRecord, RowCells};
use deeds_core::AppConfig;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Default number of retries after the first attempt.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay in milliseconds for retry backoff.
const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

/// Rate limit backoff multiplier (longer wait for rate limits).
const RATE_LIMIT_BACKOFF_MULTIPLIER: u32 = 3;

/// Records buffered between the run and a [`SearchOrchestrator::collect`] consumer.
const RECORD_BUFFER: usize = 256;

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Identifier used in this run's log lines
    pub run_id: Uuid,
    /// Result pages the pager announced (1 when there was no pager)
    pub pages_total: u32,
    /// Pages that could not be fetched or read after retries
    pub pages_failed: Vec<u32>,
    /// Records handed to the output channel
    pub records_emitted: usize,
    /// Rows that could not become records
    pub rows_skipped: usize,
}

impl RunSummary {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            pages_total: 0,
            pages_failed: Vec::new(),
            records_emitted: 0,
            rows_skipped: 0,
        }
    }

    /// True when every announced page was read.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pages_failed.is_empty()
    }
}

type PageRows = Vec<std::result::Result<RowCells, RowError>>;

/// Drives the landing → search → pages chain for one [`SearchForm`].
pub struct SearchOrchestrator<F: PageFetcher + ?Sized> {
    fetcher: Arc<F>,
    form: SearchForm,
    layout: GridLayout,
    max_concurrent_pages: usize,
    max_retries: u32,
    retry_delay: Duration,
    request_delay: Duration,
    deadline: Option<Duration>,
}

impl<F: PageFetcher + ?Sized> SearchOrchestrator<F> {
    /// Create an orchestrator with sequential page fetching and default retries.
    #[must_use]
    pub fn new(fetcher: Arc<F>, form: SearchForm) -> Self {
        Self {
            fetcher,
            form,
            layout: GridLayout::default(),
            max_concurrent_pages: 1,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            request_delay: Duration::ZERO,
            deadline: None,
        }
    }

    /// Create an orchestrator from the `[search]`, `[http]`, `[run]` and `[grid]` sections.
    ///
    /// A `deadline_secs` of 0 runs without a deadline.
    pub fn from_config(fetcher: Arc<F>, config: &AppConfig) -> Result<Self> {
        let form = SearchForm::from_config(&config.search)?;
        let deadline = (config.run.deadline_secs > 0)
            .then(|| Duration::from_secs(config.run.deadline_secs));

        Ok(Self::new(fetcher, form)
            .with_max_concurrent_pages(config.http.max_concurrent_pages)
            .with_max_retries(config.http.max_retries)
            .with_retry_delay(Duration::from_millis(config.http.retry_delay_ms))
            .with_request_delay(Duration::from_millis(
                config.http.delay_between_requests_ms,
            ))
            .with_deadline(deadline)
            .with_layout(config.grid.clone()))
    }

    /// Set the maximum number of result pages in flight.
    #[must_use]
    pub fn with_max_concurrent_pages(mut self, max: usize) -> Self {
        self.max_concurrent_pages = max.max(1);
        self
    }

    /// Set how many times a transient failure is retried.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the base delay, doubled on each retry.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Pause before every request.
    #[must_use]
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Abort the run with [`ScanError::DeadlineExceeded`] once `deadline` passes.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Read results from a grid other than the registry default.
    #[must_use]
    pub fn with_layout(mut self, layout: GridLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Run the search, sending each record to `records` as it is parsed.
    ///
    /// Failing to load the search page or submit the search aborts the run.
    /// A result page that still fails after retries is recorded in
    /// [`RunSummary::pages_failed`] and the run carries on; a row that cannot
    /// be parsed is logged and skipped. If the receiver is dropped the run
    /// stops early and returns what it has.
    pub async fn run(&self, records: mpsc::Sender<DeedRecord>) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();

        let summary = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.execute(run_id, &records))
                .await
                .map_err(|_| {
                    tracing::error!("Run {} exceeded its deadline of {:?}", run_id, deadline);
                    ScanError::DeadlineExceeded(deadline)
                })??,
            None => self.execute(run_id, &records).await?,
        };

        tracing::info!(
            "Run {} finished: {} records from {} pages, {} pages failed, {} rows skipped",
            summary.run_id,
            summary.records_emitted,
            summary.pages_total,
            summary.pages_failed.len(),
            summary.rows_skipped
        );

        Ok(summary)
    }

    /// Run the search and gather every record in memory.
    pub async fn collect(&self) -> Result<(Vec<DeedRecord>, RunSummary)> {
        let (tx, mut rx) = mpsc::channel(RECORD_BUFFER);

        let consume = async {
            let mut records = Vec::new();
            while let Some(record) = rx.recv().await {
                records.push(record);
            }
            records
        };

        let (summary, records) = tokio::join!(self.run(tx), consume);
        Ok((records, summary?))
    }

    async fn execute(
        &self,
        run_id: Uuid,
        records: &mpsc::Sender<DeedRecord>,
    ) -> Result<RunSummary> {
        let parser = ResultParser::new(&self.layout)?;
        let mut summary = RunSummary::new(run_id);

        tracing::info!(
            "Run {} searching {} for {}",
            run_id,
            self.form.url(),
            self.form.range()
        );

        let landing = self.fetch_with_retry(&self.form.landing_request()).await?;
        let token = extract_session_token(&landing)?;

        let search = self.fetch_with_retry(&self.form.search_request(&token)).await?;
        let results = parser.parse_results(&search)?;

        let Some(page_count) = results.page_count else {
            tracing::info!("Run {} found no pager, reading a single page", run_id);
            summary.pages_total = 1;
            self.emit_rows(1, results.rows, records, &mut summary).await;
            return Ok(summary);
        };

        tracing::info!("Run {} found {} result pages", run_id, page_count);
        summary.pages_total = page_count;

        let token = results.token;
        let mut in_flight = FuturesUnordered::new();

        for page in 1..=page_count {
            in_flight.push(self.fetch_page(&parser, &token, page));

            // Respect concurrency limit
            while in_flight.len() >= self.max_concurrent_pages {
                if let Some((page, outcome)) = in_flight.next().await {
                    if !self.finish_page(page, outcome, records, &mut summary).await {
                        return Ok(summary);
                    }
                }
            }
        }

        while let Some((page, outcome)) = in_flight.next().await {
            if !self.finish_page(page, outcome, records, &mut summary).await {
                return Ok(summary);
            }
        }

        summary.pages_failed.sort_unstable();
        Ok(summary)
    }

    async fn fetch_page(
        &self,
        parser: &ResultParser,
        token: &SessionToken,
        page: u32,
    ) -> (u32, Result<PageRows>) {
        let request = self.form.page_request(token, page);
        let outcome = match self.fetch_with_retry(&request).await {
            Ok(html) => parser.parse_rows(&html),
            Err(e) => Err(e),
        };
        (page, outcome)
    }

    /// Returns false once the record receiver is gone.
    async fn finish_page(
        &self,
        page: u32,
        outcome: Result<PageRows>,
        records: &mpsc::Sender<DeedRecord>,
        summary: &mut RunSummary,
    ) -> bool {
        match outcome {
            Ok(rows) => self.emit_rows(page, rows, records, summary).await,
            Err(e) => {
                tracing::error!("Page {} failed, continuing without it: {}", page, e);
                summary.pages_failed.push(page);
                true
            }
        }
    }

    /// Returns false once the record receiver is gone.
    async fn emit_rows(
        &self,
        page: u32,
        rows: PageRows,
        records: &mpsc::Sender<DeedRecord>,
        summary: &mut RunSummary,
    ) -> bool {
        let mut emitted = 0;

        for (index, row) in rows.into_iter().enumerate() {
            let parsed = match row {
                Ok(cells) => parse_row(&cells).map_err(|e| {
                    tracing::warn!(
                        page,
                        row = index,
                        cells = ?cells.as_slice(),
                        "Skipping row: {}",
                        e
                    );
                }),
                Err(e) => {
                    tracing::warn!(page, row = index, "Skipping row: {}", e);
                    Err(())
                }
            };
            let Ok(record) = parsed else {
                summary.rows_skipped += 1;
                continue;
            };

            if records.send(record).await.is_err() {
                tracing::warn!("Record receiver dropped, stopping run {}", summary.run_id);
                return false;
            }
            emitted += 1;
            summary.records_emitted += 1;
        }

        tracing::debug!("Page {} emitted {} records", page, emitted);
        true
    }

    /// Fetch with retry logic and exponential backoff.
    ///
    /// Retries transient errors up to `max_retries` times. Rate limit errors
    /// use a longer backoff, or the server's `Retry-After` if that is longer
    /// still. Other errors are returned immediately.
    async fn fetch_with_retry(&self, request: &FormRequest) -> Result<String> {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let mut attempt = 0;
        loop {
            match self.fetcher.fetch(request).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt, &e);

                    tracing::warn!(
                        "Fetch failed for {} {} (attempt {}/{}), retrying in {:?}: {}",
                        request.url,
                        request
                            .page_argument()
                            .map_or_else(|| "(search)".to_string(), |p| format!("page {p}")),
                        attempt + 1,
                        self.max_retries + 1,
                        delay,
                        e
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn backoff(&self, attempt: u32, error: &ScanError) -> Duration {
        let base = self
            .retry_delay
            .saturating_mul(2u32.saturating_pow(attempt));

        match error {
            ScanError::RateLimited { retry_after, .. } => {
                tracing::warn!("Rate limited, using longer backoff");
                base.saturating_mul(RATE_LIMIT_BACKOFF_MULTIPLIER)
                    .max(*retry_after)
            }
            _ => base,
        }
    }
}
