use crate::query::{LogEvent, LogSequence, Page};
use crate::remote::{FilterEventsRequest, GetEventsRequest, LogService, RemoteError, RetryPolicy};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("remote request failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("cancelled after another fetch failed")]
    Cancelled,

    #[error("query deadline exceeded")]
    DeadlineExceeded,

    #[error("fetch task panicked: {0}")]
    TaskPanicked(String),
}

/// Paginated event retrieval for one batch of streams or one stream.
#[derive(Clone)]
pub struct EventFetcher {
    service: Arc<dyn LogService>,
    retry: RetryPolicy,
}

impl EventFetcher {
    pub fn new(service: Arc<dyn LogService>, retry: RetryPolicy) -> Self {
        Self { service, retry }
    }

    /// Fetch the events of up to 100 streams at once, interleaved in time
    /// order by the service.
    pub async fn fetch_interleaved(
        &self,
        group: &str,
        streams: &[String],
        start: i64,
        end: i64,
    ) -> Result<LogSequence, FetchError> {
        if start >= end {
            return Ok(LogSequence::new());
        }

        let service = &self.service;
        let events = self
            .paginate("FilterLogEvents", |next_token| {
                let request = FilterEventsRequest {
                    group: group.to_string(),
                    streams: streams.to_vec(),
                    start,
                    end,
                    interleaved: true,
                    next_token,
                };
                async move { service.filter_events(&request).await }
            })
            .await?;

        Ok(LogSequence::from_events(events))
    }

    /// Fetch one stream's events reading forward from the start of the
    /// window.
    pub async fn fetch_stream(
        &self,
        group: &str,
        stream: &str,
        start: i64,
        end: i64,
    ) -> Result<LogSequence, FetchError> {
        if start >= end {
            return Ok(LogSequence::new());
        }

        let service = &self.service;
        let events = self
            .paginate("GetLogEvents", |next_token| {
                let request = GetEventsRequest {
                    group: group.to_string(),
                    stream: stream.to_string(),
                    start,
                    end,
                    start_from_head: true,
                    next_token,
                };
                async move { service.get_events(&request).await }
            })
            .await?;

        Ok(LogSequence::from_events(events))
    }

    /// Follow continuation tokens until the service stops returning one.
    ///
    /// Each page request is retried on its own, so a transient failure
    /// halfway through resumes from the same token.
    async fn paginate<F, Fut>(
        &self,
        operation: &str,
        mut request_page: F,
    ) -> Result<Vec<LogEvent>, RemoteError>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<LogEvent>, RemoteError>>,
    {
        let mut events = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .retry
                .run(operation, || request_page(token.clone()))
                .await?;
            pages += 1;
            events.extend(page.items);

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(
            operation = operation,
            pages = pages,
            events = events.len(),
            "Pagination complete"
        );
        Ok(events)
    }
}
