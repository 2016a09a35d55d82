use crate::cli::output::{write_events, write_streams, OutputFormat};
use crate::config::{load_or_default, ConfigError};
use crate::fetch::FailurePolicy;
use crate::pipeline::{execute, list_streams, FetchMode, QueryError, QuerySettings};
use crate::query::{ParseError, QueryParams, TimeWindow};
use crate::remote::{CloudWatchLogsService, LogService};
use crate::sequencer::dedup;
use chrono::Utc;
use clap::Args;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid time window: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("output error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Log group to read from
    #[arg(long)]
    pub group: String,

    /// Only read streams whose name starts with this
    #[arg(long, alias = "stream")]
    pub prefix: Option<String>,

    /// Window start: 'now', an RFC 3339 time, or a duration ago like '15m'
    #[arg(long, default_value = "10m")]
    pub start: String,

    /// Window end, in the same forms as --start
    #[arg(long, default_value = "now")]
    pub end: String,

    /// Overrides aws.region from the config
    #[arg(long)]
    pub region: Option<String>,

    /// Overrides aws.profile from the config
    #[arg(long)]
    pub profile: Option<String>,

    /// Read each stream on its own instead of in interleaved batches
    #[arg(long)]
    pub per_stream: bool,

    /// Print what could be fetched when some batches fail
    #[arg(long)]
    pub best_effort: bool,

    /// Drop repeated events
    #[arg(long)]
    pub dedup: bool,

    /// Print the streams that would be read and exit
    #[arg(long)]
    pub list_streams: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Options that shape what happens after the query parameters are settled.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub mode: FetchMode,
    pub dedup: bool,
    pub list_only: bool,
    pub format: OutputFormat,
}

impl From<&QueryArgs> for RunOptions {
    fn from(args: &QueryArgs) -> Self {
        Self {
            mode: if args.per_stream {
                FetchMode::PerStream
            } else {
                FetchMode::Interleaved
            },
            dedup: args.dedup,
            list_only: args.list_streams,
            format: args.format,
        }
    }
}

pub async fn run(config_path: Option<PathBuf>, args: QueryArgs) -> Result<(), RunError> {
    if let Some(path) = &config_path {
        info!(config_path = %path.display(), "Loading configuration");
    }
    let config = load_or_default(config_path.as_deref())?;

    let mut settings = QuerySettings::from(&config);
    if args.best_effort {
        settings.aggregator.policy = FailurePolicy::BestEffort;
    }

    let window = TimeWindow::resolve(&args.start, &args.end, Utc::now())?;
    let params = QueryParams::new(args.group.clone(), args.prefix.clone(), window.start, window.end)?;
    debug!(
        group = %params.group(),
        prefix = ?params.prefix(),
        start = params.start(),
        end = params.end(),
        "Resolved query"
    );

    let region = args.region.as_deref().or(config.aws.region.as_deref());
    let profile = args.profile.as_deref().or(config.aws.profile.as_deref());
    let service: Arc<dyn LogService> = Arc::new(CloudWatchLogsService::from_env(region, profile).await);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_with_service(service, &params, &settings, RunOptions::from(&args), &mut out).await
}

/// Run one query against `service` and write the result to `out`.
///
/// Under the best-effort policy, failed units are reported on stderr after
/// the events that were fetched.
pub async fn run_with_service<W: Write>(
    service: Arc<dyn LogService>,
    params: &QueryParams,
    settings: &QuerySettings,
    options: RunOptions,
    out: &mut W,
) -> Result<(), RunError> {
    if options.list_only {
        let streams = list_streams(service, params, settings).await?;
        write_streams(out, &streams, options.format)?;
        return Ok(());
    }

    let output = execute(service, params, settings, options.mode).await?;
    let logs = if options.dedup {
        dedup(output.logs)
    } else {
        output.logs
    };

    write_events(out, &logs, options.format)?;

    for failure in &output.failures {
        eprintln!("warning: {}", failure);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{InMemoryLogService, RetryPolicy};

    fn settings() -> QuerySettings {
        QuerySettings {
            retry: RetryPolicy::none(),
            ..Default::default()
        }
    }

    async fn render(service: InMemoryLogService, options: RunOptions) -> Result<String, RunError> {
        let params = QueryParams::new("svc-prod", None, 0, 1000).unwrap();
        let mut buf = Vec::new();
        run_with_service(Arc::new(service), &params, &settings(), options, &mut buf).await?;
        Ok(String::from_utf8(buf).unwrap())
    }

    #[tokio::test]
    async fn test_events_are_printed_in_order() {
        let service = InMemoryLogService::new()
            .with_stream("a", &[(1, "first"), (30, "third")])
            .with_stream("b", &[(20, "second")]);

        let text = render(service, RunOptions::default()).await.unwrap();
        let messages: Vec<&str> = text
            .lines()
            .map(|line| line.rsplit(' ').next().unwrap())
            .collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_list_only_prints_streams() {
        let service = InMemoryLogService::new()
            .with_stream("a", &[(500, "x")])
            .with_stream("b", &[(900, "y")]);
        let options = RunOptions {
            list_only: true,
            ..Default::default()
        };

        let text = render(service, options).await.unwrap();
        let names: Vec<&str> = text.lines().map(|l| l.rsplit(' ').next().unwrap()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_dedup_option_drops_repeats() {
        let service = InMemoryLogService::new().with_stream("a", &[(5, "same"), (5, "same")]);
        let options = RunOptions {
            dedup: true,
            ..Default::default()
        };

        let text = render(service, options).await.unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_query_failure_is_returned() {
        let service = InMemoryLogService::new()
            .with_stream("a", &[(5, "x")])
            .with_failing_stream("a");

        let err = render(service, RunOptions::default()).await.unwrap_err();
        assert!(matches!(err, RunError::Query(QueryError::Fetch { .. })));
    }

    #[test]
    fn test_options_from_args() {
        let args = QueryArgs {
            group: "g".to_string(),
            prefix: None,
            start: "10m".to_string(),
            end: "now".to_string(),
            region: None,
            profile: None,
            per_stream: true,
            best_effort: false,
            dedup: false,
            list_streams: false,
            format: OutputFormat::Json,
        };
        let options = RunOptions::from(&args);
        assert_eq!(options.mode, FetchMode::PerStream);
        assert_eq!(options.format, OutputFormat::Json);
    }
}
