use crate::catalog::{ScanMode, StreamCatalog};
use crate::config::types::Config;
use crate::fetch::{
    partition, Aggregate, Aggregator, AggregatorSettings, EventFetcher, FailurePolicy,
    FetchFailure, MAX_STREAMS_PER_REQUEST,
};
use crate::query::{LogSequence, QueryParams, StreamDescriptor};
use crate::remote::{LogService, RemoteError, RetryPolicy};
use crate::sequencer::{merge, merge_all};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that end a query without results
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("stream discovery failed: {0}")]
    Discovery(#[source] RemoteError),

    #[error("{} fetch task(s) failed: {}", .failures.len(), summarize(.failures))]
    Fetch { failures: Vec<FetchFailure> },
}

fn summarize(failures: &[FetchFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// How events are requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// One interleaved request chain per batch of streams.
    #[default]
    Interleaved,
    /// One forward-reading request chain per stream.
    PerStream,
}

/// Tuning for one query run.
#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub max_batch_size: usize,
    pub scan_mode: ScanMode,
    pub retry: RetryPolicy,
    pub aggregator: AggregatorSettings,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            max_batch_size: MAX_STREAMS_PER_REQUEST,
            scan_mode: ScanMode::default(),
            retry: RetryPolicy::default(),
            aggregator: AggregatorSettings::default(),
        }
    }
}

impl From<&Config> for QuerySettings {
    fn from(config: &Config) -> Self {
        Self {
            max_batch_size: config.fetch.max_batch_size,
            scan_mode: config.fetch.scan_mode,
            retry: RetryPolicy {
                max_attempts: config.retry.max_attempts,
                initial_backoff: config.retry.initial_backoff,
                attempt_timeout: config.fetch.request_timeout,
            },
            aggregator: AggregatorSettings {
                max_concurrency: config.fetch.max_concurrency,
                deadline: config.fetch.query_timeout,
                policy: config.fetch.failure_policy,
            },
        }
    }
}

/// Result of a query.
///
/// `failures` is only ever non-empty under [`FailurePolicy::BestEffort`];
/// fail-fast queries turn failures into [`QueryError::Fetch`].
#[derive(Debug, Default)]
pub struct QueryOutput {
    pub logs: LogSequence,
    pub failures: Vec<FetchFailure>,
    pub streams_scanned: usize,
}

/// List the streams a query over `params` would read.
pub async fn list_streams(
    service: Arc<dyn LogService>,
    params: &QueryParams,
    settings: &QuerySettings,
) -> Result<Vec<StreamDescriptor>, QueryError> {
    let catalog = StreamCatalog::new(service, settings.scan_mode, settings.retry);
    catalog
        .discover(params.group(), params.prefix(), params.start())
        .await
        .map_err(QueryError::Discovery)
}

/// Run a query in the given mode.
pub async fn execute(
    service: Arc<dyn LogService>,
    params: &QueryParams,
    settings: &QuerySettings,
    mode: FetchMode,
) -> Result<QueryOutput, QueryError> {
    match mode {
        FetchMode::Interleaved => run_query(service, params, settings).await,
        FetchMode::PerStream => run_per_stream_query(service, params, settings).await,
    }
}

/// Discover streams, fetch them in interleaved batches in parallel and
/// return one time-ordered sequence.
pub async fn run_query(
    service: Arc<dyn LogService>,
    params: &QueryParams,
    settings: &QuerySettings,
) -> Result<QueryOutput, QueryError> {
    if params.is_empty_window() {
        info!(group = %params.group(), start = params.start(), "Empty window, nothing to fetch");
        return Ok(QueryOutput::default());
    }

    let streams = list_streams(service.clone(), params, settings).await?;
    let streams_scanned = streams.len();
    if streams.is_empty() {
        info!(group = %params.group(), "No streams match, nothing to fetch");
        return Ok(QueryOutput::default());
    }

    let names: Vec<String> = streams.into_iter().map(|s| s.name).collect();
    let units: Vec<(String, Vec<String>)> = partition(&names, settings.max_batch_size)
        .into_iter()
        .enumerate()
        .map(|(i, batch)| {
            let label = format!("batch {} ({}..{})", i, batch[0], batch[batch.len() - 1]);
            (label, batch.to_vec())
        })
        .collect();

    info!(
        group = %params.group(),
        streams = streams_scanned,
        batches = units.len(),
        "Fetching events"
    );

    let fetcher = EventFetcher::new(service, settings.retry);
    let group: Arc<str> = Arc::from(params.group());
    let (start, end) = (params.start(), params.end());

    let aggregate = Aggregator::new(settings.aggregator.clone())
        .run(units, move |batch: Vec<String>| {
            let fetcher = fetcher.clone();
            let group = group.clone();
            async move { fetcher.fetch_interleaved(&group, &batch, start, end).await }
        })
        .await;

    finish(aggregate, settings.aggregator.policy, streams_scanned, merge_all)
}

/// Discover streams, fetch each one on its own in parallel and fold the
/// per-stream sequences together in discovery order.
pub async fn run_per_stream_query(
    service: Arc<dyn LogService>,
    params: &QueryParams,
    settings: &QuerySettings,
) -> Result<QueryOutput, QueryError> {
    if params.is_empty_window() {
        info!(group = %params.group(), start = params.start(), "Empty window, nothing to fetch");
        return Ok(QueryOutput::default());
    }

    let streams = list_streams(service.clone(), params, settings).await?;
    let streams_scanned = streams.len();
    if streams.is_empty() {
        info!(group = %params.group(), "No streams match, nothing to fetch");
        return Ok(QueryOutput::default());
    }

    info!(
        group = %params.group(),
        streams = streams_scanned,
        "Fetching events per stream"
    );

    let units: Vec<(String, String)> = streams
        .into_iter()
        .map(|s| (s.name.clone(), s.name))
        .collect();

    let fetcher = EventFetcher::new(service, settings.retry);
    let group: Arc<str> = Arc::from(params.group());
    let (start, end) = (params.start(), params.end());

    let aggregate = Aggregator::new(settings.aggregator.clone())
        .run(units, move |stream: String| {
            let fetcher = fetcher.clone();
            let group = group.clone();
            async move { fetcher.fetch_stream(&group, &stream, start, end).await }
        })
        .await;

    finish(aggregate, settings.aggregator.policy, streams_scanned, |sequences| {
        sequences.into_iter().fold(LogSequence::new(), merge)
    })
}

fn finish(
    aggregate: Aggregate,
    policy: FailurePolicy,
    streams_scanned: usize,
    combine: impl FnOnce(Vec<LogSequence>) -> LogSequence,
) -> Result<QueryOutput, QueryError> {
    let Aggregate {
        sequences,
        failures,
    } = aggregate;

    if !failures.is_empty() {
        match policy {
            FailurePolicy::FailFast => return Err(QueryError::Fetch { failures }),
            FailurePolicy::BestEffort => warn!(
                failed = failures.len(),
                succeeded = sequences.len(),
                "Returning partial results"
            ),
        }
    }

    let logs = combine(sequences);
    info!(events = logs.len(), "Query complete");

    Ok(QueryOutput {
        logs,
        failures,
        streams_scanned,
    })
}
