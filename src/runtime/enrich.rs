//! Parallel per-row enrichment against a [`MedicalTextAnalyzer`].
//!
//! Each row's text cell is sent to the analyzer, with bounded concurrency,
//! client-side quota admission and retry on transient failures. The raw JSON
//! response lands in a bookkeeping column next to the original data; what
//! happens on a failed row is decided by the configured [`ErrorHandling`]
//! policy.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use thiserror::Error;
use uuid::Uuid;

use crate::contract::{ensure_column_exists, ApiConfigurationPreset, ErrorHandling};
use crate::manifest::{ParamValue, ValidationError};
use crate::runtime::analyzer::{invoke, AnalyzerError, AnalyzerOperation, MedicalTextAnalyzer};
use crate::runtime::{build_unique_column_names, RowBatch};

// ============================================================================
// Configuration
// ============================================================================

pub const DEFAULT_PARALLEL_REQUESTS: usize = 4;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Cap on analyzer call starts per quota window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum call starts per window.
    pub calls: u32,
    /// Window length.
    pub period: Duration,
}

/// Tuning knobs for one enrichment run.
#[derive(Debug, Clone)]
pub struct EnrichmentOptions {
    pub operation: AnalyzerOperation,
    /// Prefix of the response and error bookkeeping columns.
    pub column_prefix: String,
    pub error_handling: ErrorHandling,
    /// How many analyzer calls may be in flight at once.
    pub parallel_requests: usize,
    /// Total tries per row, first call included.
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    /// Client-side quota over call starts, retries included. `None` turns the
    /// quota off.
    pub rate_limit: Option<RateLimit>,
}

impl EnrichmentOptions {
    pub fn new(operation: AnalyzerOperation) -> Self {
        Self {
            operation,
            column_prefix: operation.default_column_prefix().to_string(),
            error_handling: ErrorHandling::default(),
            parallel_requests: DEFAULT_PARALLEL_REQUESTS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            rate_limit: None,
        }
    }

    /// Builds options from a resolved API configuration preset. The preset's
    /// quota numbers become the client-side rate limit, and its quota period
    /// doubles as the delay between retries.
    pub fn from_preset(
        operation: AnalyzerOperation,
        preset: &ApiConfigurationPreset,
        error_handling: ErrorHandling,
    ) -> Self {
        Self::new(operation)
            .with_error_handling(error_handling)
            .with_parallel_requests(preset.parallel_workers)
            .with_retry(DEFAULT_RETRY_ATTEMPTS, preset.retry_delay())
            .with_rate_limit(
                preset.api_quota_rate_limit,
                Duration::from_secs(preset.api_quota_period),
            )
    }

    pub fn with_column_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.column_prefix = prefix.into();
        self
    }

    pub fn with_error_handling(mut self, error_handling: ErrorHandling) -> Self {
        self.error_handling = error_handling;
        self
    }

    pub fn with_parallel_requests(mut self, parallel_requests: usize) -> Self {
        assert!(
            parallel_requests > 0,
            "Parallel requests must be greater than 0"
        );
        self.parallel_requests = parallel_requests;
        self
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        assert!(attempts > 0, "Retry attempts must be greater than 0");
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    pub fn with_rate_limit(mut self, calls: u32, period: Duration) -> Self {
        assert!(calls > 0, "Rate limit must be greater than 0");
        self.rate_limit = Some(RateLimit { calls, period });
        self
    }
}

// ============================================================================
// Client-side Quota
// ============================================================================

/// Fixed-window call counter shared by every in-flight row of a run.
struct QuotaGuard {
    limit: RateLimit,
    window: Mutex<QuotaWindow>,
}

struct QuotaWindow {
    started: Instant,
    admitted: u32,
}

impl QuotaGuard {
    fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            window: Mutex::new(QuotaWindow {
                started: Instant::now(),
                admitted: 0,
            }),
        }
    }

    /// Waits until the current window has room for one more call start.
    ///
    /// The lock is never held across an await.
    async fn admit(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock().unwrap();
                let elapsed = window.started.elapsed();
                if elapsed >= self.limit.period {
                    window.started = Instant::now();
                    window.admitted = 0;
                }
                if window.admitted < self.limit.calls {
                    window.admitted += 1;
                    return;
                }
                self.limit.period.saturating_sub(elapsed)
            };
            tokio::time::sleep(wait).await;
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that abort an enrichment run.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// The configured text column is absent from the batch.
    #[error("Column error: {0}")]
    Column(#[from] ValidationError),

    /// A row failed under the FAIL error handling policy.
    #[error("Row {row} failed: {source}")]
    RowFailed { row: usize, source: AnalyzerError },
}

// ============================================================================
// Enrichment
// ============================================================================

/// Runs the selected analyzer operation over every row of `batch`.
///
/// The returned batch keeps the input columns and row order, and appends the
/// response, error message and error type bookkeeping columns (named to avoid
/// collisions with existing columns). Rows whose text cell is blank or not a
/// string are not sent to the analyzer and get an empty response cell; they
/// consume no quota.
pub async fn enrich_rows<A>(
    analyzer: &A,
    batch: &RowBatch,
    text_column: &str,
    options: &EnrichmentOptions,
) -> Result<RowBatch, EnrichmentError>
where
    A: MedicalTextAnalyzer + ?Sized,
{
    ensure_column_exists(text_column, &batch.columns)?;

    let run_id = Uuid::new_v4();
    log::info!(
        "Enrichment run {}: {} rows over column '{}' ({} parallel requests)",
        run_id,
        batch.len(),
        text_column,
        options.parallel_requests
    );

    let quota = options.rate_limit.map(QuotaGuard::new);
    let calls = batch.rows.iter().enumerate().map(|(index, row)| {
        let text = row
            .get(text_column)
            .and_then(ParamValue::as_str)
            .map(str::trim)
            .unwrap_or("");
        let quota = quota.as_ref();
        async move {
            if text.is_empty() {
                return (index, Ok(String::new()));
            }
            (index, call_with_retry(analyzer, quota, options, run_id, index, text).await)
        }
    });
    let mut results = stream::iter(calls).buffered(options.parallel_requests);

    let mut outcomes: Vec<(String, Option<AnalyzerError>)> = Vec::with_capacity(batch.len());
    while let Some((index, outcome)) = results.next().await {
        match outcome {
            Ok(raw) => outcomes.push((raw, None)),
            Err(err) if options.error_handling == ErrorHandling::Fail => {
                log::error!("Enrichment run {}: row {} failed: {}", run_id, index, err);
                return Err(EnrichmentError::RowFailed { row: index, source: err });
            }
            Err(err) => {
                log::warn!(
                    "Enrichment run {}: row {} failed: {} (recorded in the output)",
                    run_id,
                    index,
                    err
                );
                outcomes.push((String::new(), Some(err)));
            }
        }
    }

    let api_columns = build_unique_column_names(&batch.columns, &options.column_prefix);
    let mut output = RowBatch::new(batch.columns.clone());
    output.add_column(api_columns.response.clone());
    output.add_column(api_columns.error_message.clone());
    output.add_column(api_columns.error_type.clone());

    let mut failed = 0;
    for (row, (raw, error)) in batch.rows.iter().zip(outcomes) {
        let mut enriched = row.clone();
        enriched.insert(api_columns.response.clone(), ParamValue::String(raw));
        match error {
            Some(err) => {
                failed += 1;
                enriched.insert(
                    api_columns.error_message.clone(),
                    ParamValue::String(err.to_string()),
                );
                enriched.insert(
                    api_columns.error_type.clone(),
                    ParamValue::String(err.type_label()),
                );
            }
            None => {
                enriched.insert(api_columns.error_message.clone(), ParamValue::Null);
                enriched.insert(api_columns.error_type.clone(), ParamValue::Null);
            }
        }
        output.push_row(enriched);
    }

    log::info!(
        "Enrichment run {}: completed with {} failed row(s)",
        run_id,
        failed
    );
    Ok(output)
}

/// One row's analyzer call, retried on transient errors. Every attempt,
/// retries included, is an outbound call and counts against the quota.
async fn call_with_retry<A>(
    analyzer: &A,
    quota: Option<&QuotaGuard>,
    options: &EnrichmentOptions,
    run_id: Uuid,
    row: usize,
    text: &str,
) -> Result<String, AnalyzerError>
where
    A: MedicalTextAnalyzer + ?Sized,
{
    let mut attempt: u32 = 1;
    loop {
        if let Some(quota) = quota {
            quota.admit().await;
        }
        match invoke(analyzer, options.operation, text).await {
            Ok(response) => return Ok(serde_json::to_string(&response)?),
            Err(err) if err.is_retryable() && attempt < options.retry_attempts => {
                log::warn!(
                    "Enrichment run {}: row {} attempt {}/{} failed: {}, retrying in {:?}",
                    run_id,
                    row,
                    attempt,
                    options.retry_attempts,
                    err,
                    options.retry_delay
                );
                tokio::time::sleep(options.retry_delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
