use crate::query::{LogEvent, Page, StreamDescriptor};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    #[error("log group not found: {0}")]
    GroupNotFound(String),

    #[error("request rejected by service: {0}")]
    Rejected(String),

    #[error("service error: {0}")]
    Service(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl RemoteError {
    /// Whether repeating the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Service(_) | RemoteError::Timeout(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListStreamsRequest {
    pub group: String,
    /// Server-side name prefix. The service refuses a prefix together with
    /// last-event ordering, so ordered listings filter client-side instead.
    pub prefix: Option<String>,
    pub order_by_last_event: bool,
    pub descending: bool,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterEventsRequest {
    pub group: String,
    pub streams: Vec<String>,
    pub start: i64,
    pub end: i64,
    pub interleaved: bool,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetEventsRequest {
    pub group: String,
    pub stream: String,
    pub start: i64,
    pub end: i64,
    pub start_from_head: bool,
    pub next_token: Option<String>,
}

/// The paginated log-storage service the query pipeline reads from.
///
/// Every operation returns one page. Callers keep requesting with the
/// returned token until it is `None`.
#[async_trait]
pub trait LogService: Send + Sync {
    async fn list_streams(
        &self,
        request: &ListStreamsRequest,
    ) -> Result<Page<StreamDescriptor>, RemoteError>;

    async fn filter_events(
        &self,
        request: &FilterEventsRequest,
    ) -> Result<Page<LogEvent>, RemoteError>;

    async fn get_events(&self, request: &GetEventsRequest) -> Result<Page<LogEvent>, RemoteError>;
}
