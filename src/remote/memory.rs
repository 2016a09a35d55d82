use crate::query::{LogEvent, Page, StreamDescriptor};
use crate::remote::traits::{
    FilterEventsRequest, GetEventsRequest, ListStreamsRequest, LogService, RemoteError,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// In-memory log service with configurable page sizes, failures and
/// latency. Test double for the rest of the crate and for integration tests.
pub struct InMemoryLogService {
    streams: Vec<StreamDescriptor>,
    events: HashMap<String, Vec<LogEvent>>,
    stream_page_size: usize,
    event_page_size: usize,
    honor_ordering: bool,
    latency: Option<Duration>,
    list_failure: Option<RemoteError>,
    failing_streams: HashSet<String>,
    transient_failures: AtomicU32,
    list_calls: AtomicUsize,
    filter_calls: AtomicUsize,
    get_calls: AtomicUsize,
    fetched_streams: Mutex<Vec<String>>,
    scripted_pages: Option<Vec<Page<LogEvent>>>,
}

impl Default for InMemoryLogService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLogService {
    pub fn new() -> Self {
        Self {
            streams: Vec::new(),
            events: HashMap::new(),
            stream_page_size: 50,
            event_page_size: 1000,
            honor_ordering: true,
            latency: None,
            list_failure: None,
            failing_streams: HashSet::new(),
            transient_failures: AtomicU32::new(0),
            list_calls: AtomicUsize::new(0),
            filter_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            fetched_streams: Mutex::new(Vec::new()),
            scripted_pages: None,
        }
    }

    /// Add a stream. Its last-event time is derived from the events given.
    pub fn with_stream(mut self, name: &str, timestamps_and_messages: &[(i64, &str)]) -> Self {
        let events: Vec<LogEvent> = timestamps_and_messages
            .iter()
            .map(|(ts, msg)| LogEvent::new(name, *ts, *msg))
            .collect();
        let last_event = events.iter().map(LogEvent::timestamp).max();

        self.streams.push(StreamDescriptor::new(name, last_event));
        self.events.insert(name.to_string(), events);
        self
    }

    /// Add a stream whose reported last-event time is set explicitly and
    /// need not agree with its events.
    pub fn with_descriptor(mut self, name: &str, last_event: Option<i64>) -> Self {
        self.streams.push(StreamDescriptor::new(name, last_event));
        self.events.entry(name.to_string()).or_default();
        self
    }

    pub fn with_stream_page_size(mut self, size: usize) -> Self {
        self.stream_page_size = size.max(1);
        self
    }

    pub fn with_event_page_size(mut self, size: usize) -> Self {
        self.event_page_size = size.max(1);
        self
    }

    /// Serve stream listings in insertion order even when last-event
    /// ordering is requested.
    pub fn ignoring_order(mut self) -> Self {
        self.honor_ordering = false;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_list_failure(mut self, error: RemoteError) -> Self {
        self.list_failure = Some(error);
        self
    }

    /// Any event request touching `stream` fails permanently.
    pub fn with_failing_stream(mut self, stream: &str) -> Self {
        self.failing_streams.insert(stream.to_string());
        self
    }

    /// Answer every event request with `pages` instead of stored events.
    ///
    /// The first page answers a request without a token. A request carrying
    /// a token gets the page after the one that handed out that token.
    pub fn with_scripted_pages(mut self, pages: Vec<Page<LogEvent>>) -> Self {
        self.scripted_pages = Some(pages);
        self
    }

    /// The next `count` calls of any kind fail with a retryable error.
    pub fn with_transient_failures(self, count: u32) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn filter_calls(&self) -> usize {
        self.filter_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Every stream name that appeared in an event request, in call order.
    pub async fn fetched_streams(&self) -> Vec<String> {
        self.fetched_streams.lock().await.clone()
    }

    async fn before_call(&self) -> Result<(), RemoteError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let remaining = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if remaining.is_ok() {
            return Err(RemoteError::Service("simulated throttling".to_string()));
        }

        Ok(())
    }

    fn check_group(&self, group: &str) -> Result<(), RemoteError> {
        if group.is_empty() {
            return Err(RemoteError::GroupNotFound(group.to_string()));
        }
        Ok(())
    }

    fn scripted_page(
        pages: &[Page<LogEvent>],
        token: Option<&str>,
    ) -> Result<Page<LogEvent>, RemoteError> {
        let index = match token {
            None => 0,
            Some(t) => pages
                .iter()
                .position(|p| p.next_token.as_deref() == Some(t))
                .map(|i| i + 1)
                .ok_or_else(|| RemoteError::Rejected(format!("invalid next token: {}", t)))?,
        };

        pages
            .get(index)
            .cloned()
            .ok_or_else(|| RemoteError::Rejected(format!("no page after token {:?}", token)))
    }

    fn window<'a>(&'a self, stream: &str, start: i64, end: i64) -> impl Iterator<Item = &'a LogEvent> {
        self.events
            .get(stream)
            .into_iter()
            .flatten()
            .filter(move |e| e.timestamp() >= start && e.timestamp() < end)
    }
}

fn decode_offset(token: Option<&str>) -> Result<usize, RemoteError> {
    match token {
        None => Ok(0),
        Some(t) => t
            .parse()
            .map_err(|_| RemoteError::Rejected(format!("invalid next token: {}", t))),
    }
}

fn paginate<T: Clone>(items: &[T], offset: usize, page_size: usize) -> Page<T> {
    let end = (offset + page_size).min(items.len());
    let page = items.get(offset..end).unwrap_or_default().to_vec();
    let next_token = (end < items.len()).then(|| end.to_string());
    Page::new(page, next_token)
}

#[async_trait]
impl LogService for InMemoryLogService {
    async fn list_streams(
        &self,
        request: &ListStreamsRequest,
    ) -> Result<Page<StreamDescriptor>, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;
        self.check_group(&request.group)?;

        if let Some(error) = &self.list_failure {
            return Err(error.clone());
        }

        let mut listing: Vec<StreamDescriptor> = self
            .streams
            .iter()
            .filter(|s| match &request.prefix {
                Some(prefix) => s.name.starts_with(prefix.as_str()),
                None => true,
            })
            .cloned()
            .collect();

        if request.order_by_last_event {
            if self.honor_ordering {
                // Streams without events sort as oldest
                listing.sort_by_key(|s| s.last_event.unwrap_or(i64::MIN));
                if request.descending {
                    listing.reverse();
                }
            }
        } else {
            listing.sort_by(|a, b| a.name.cmp(&b.name));
            if request.descending {
                listing.reverse();
            }
        }

        let offset = decode_offset(request.next_token.as_deref())?;
        Ok(paginate(&listing, offset, self.stream_page_size))
    }

    async fn filter_events(
        &self,
        request: &FilterEventsRequest,
    ) -> Result<Page<LogEvent>, RemoteError> {
        self.filter_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched_streams
            .lock()
            .await
            .extend(request.streams.iter().cloned());
        self.before_call().await?;
        self.check_group(&request.group)?;

        if request.streams.len() > 100 {
            return Err(RemoteError::Rejected(format!(
                "too many streams in one request: {}",
                request.streams.len()
            )));
        }

        if let Some(failing) = request
            .streams
            .iter()
            .find(|s| self.failing_streams.contains(s.as_str()))
        {
            return Err(RemoteError::Service(format!("stream {} unavailable", failing)));
        }

        if let Some(pages) = &self.scripted_pages {
            return Self::scripted_page(pages, request.next_token.as_deref());
        }

        let mut matched: Vec<LogEvent> = request
            .streams
            .iter()
            .flat_map(|s| self.window(s, request.start, request.end))
            .cloned()
            .collect();
        if request.interleaved {
            matched.sort_by_key(LogEvent::timestamp);
        }

        let offset = decode_offset(request.next_token.as_deref())?;
        Ok(paginate(&matched, offset, self.event_page_size))
    }

    async fn get_events(&self, request: &GetEventsRequest) -> Result<Page<LogEvent>, RemoteError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched_streams.lock().await.push(request.stream.clone());
        self.before_call().await?;
        self.check_group(&request.group)?;

        if self.failing_streams.contains(&request.stream) {
            return Err(RemoteError::Service(format!(
                "stream {} unavailable",
                request.stream
            )));
        }

        if let Some(pages) = &self.scripted_pages {
            return Self::scripted_page(pages, request.next_token.as_deref());
        }

        let mut matched: Vec<LogEvent> = self
            .window(&request.stream, request.start, request.end)
            .cloned()
            .collect();
        matched.sort_by_key(LogEvent::timestamp);
        if !request.start_from_head {
            matched.reverse();
        }

        let offset = decode_offset(request.next_token.as_deref())?;
        Ok(paginate(&matched, offset, self.event_page_size))
    }
}
