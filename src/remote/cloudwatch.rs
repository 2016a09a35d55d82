//! CloudWatch Logs implementation of [`LogService`].

use crate::query::{LogEvent, Page, StreamDescriptor};
use crate::remote::traits::{
    FilterEventsRequest, GetEventsRequest, ListStreamsRequest, LogService, RemoteError,
};
use async_trait::async_trait;
use aws_sdk_cloudwatchlogs as cloudwatchlogs;
use aws_sdk_cloudwatchlogs::config::Region;
use aws_sdk_cloudwatchlogs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudwatchlogs::types::OrderBy;

/// CloudWatch Logs client wrapper
#[derive(Clone, Debug)]
pub struct CloudWatchLogsService {
    client: cloudwatchlogs::Client,
}

impl CloudWatchLogsService {
    pub fn new(client: cloudwatchlogs::Client) -> Self {
        Self { client }
    }

    /// Build a client from the default credential chain, optionally pinned
    /// to a region and named profile.
    pub async fn from_env(region: Option<&str>, profile: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }

        let config = loader.load().await;
        Self::new(cloudwatchlogs::Client::new(&config))
    }
}

fn map_sdk_error<E, R>(group: &str, err: SdkError<E, R>) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    match err.code() {
        Some("ResourceNotFoundException") => RemoteError::GroupNotFound(group.to_string()),
        Some("InvalidParameterException") | Some("AccessDeniedException") => {
            RemoteError::Rejected(DisplayErrorContext(&err).to_string())
        }
        _ => RemoteError::Service(DisplayErrorContext(&err).to_string()),
    }
}

/// GetLogEvents never omits its token. It signals the end of the stream by
/// handing back the token it was given.
fn stream_continuation(sent: Option<&str>, returned: Option<String>) -> Option<String> {
    returned.filter(|t| sent != Some(t.as_str()))
}

#[async_trait]
impl LogService for CloudWatchLogsService {
    async fn list_streams(
        &self,
        request: &ListStreamsRequest,
    ) -> Result<Page<StreamDescriptor>, RemoteError> {
        let order_by = if request.order_by_last_event {
            OrderBy::LastEventTime
        } else {
            OrderBy::LogStreamName
        };

        let response = self
            .client
            .describe_log_streams()
            .log_group_name(&request.group)
            .order_by(order_by)
            .descending(request.descending)
            .set_log_stream_name_prefix(request.prefix.clone())
            .set_next_token(request.next_token.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(&request.group, e))?;

        let streams = response
            .log_streams
            .unwrap_or_default()
            .into_iter()
            .filter_map(|stream| {
                let name = stream.log_stream_name?;
                Some(StreamDescriptor::new(name, stream.last_event_timestamp))
            })
            .collect();

        Ok(Page::new(streams, response.next_token))
    }

    async fn filter_events(
        &self,
        request: &FilterEventsRequest,
    ) -> Result<Page<LogEvent>, RemoteError> {
        #[allow(deprecated)]
        let response = self
            .client
            .filter_log_events()
            .log_group_name(&request.group)
            .set_log_stream_names(Some(request.streams.clone()))
            .start_time(request.start)
            // The service treats end_time as inclusive; the window is not
            .end_time(request.end.saturating_sub(1))
            .interleaved(request.interleaved)
            .set_next_token(request.next_token.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(&request.group, e))?;

        let events = response
            .events
            .unwrap_or_default()
            .into_iter()
            .map(|event| {
                LogEvent::new(
                    event.log_stream_name.unwrap_or_default(),
                    event.timestamp.unwrap_or(0),
                    event.message.unwrap_or_default(),
                )
                .with_ingestion_time(event.ingestion_time)
            })
            .collect();

        Ok(Page::new(events, response.next_token))
    }

    async fn get_events(&self, request: &GetEventsRequest) -> Result<Page<LogEvent>, RemoteError> {
        let response = self
            .client
            .get_log_events()
            .log_group_name(&request.group)
            .log_stream_name(&request.stream)
            .start_time(request.start)
            .end_time(request.end)
            .start_from_head(request.start_from_head)
            .set_next_token(request.next_token.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(&request.group, e))?;

        let events = response
            .events
            .unwrap_or_default()
            .into_iter()
            .map(|event| {
                LogEvent::new(
                    request.stream.clone(),
                    event.timestamp.unwrap_or(0),
                    event.message.unwrap_or_default(),
                )
                .with_ingestion_time(event.ingestion_time)
            })
            .collect();

        let returned = if request.start_from_head {
            response.next_forward_token
        } else {
            response.next_backward_token
        };

        Ok(Page::new(
            events,
            stream_continuation(request.next_token.as_deref(), returned),
        ))
    }
}
