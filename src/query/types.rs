use crate::query::window::ParseError;
use serde::{Deserialize, Serialize};

/// Parameters for one bounded query against a log group.
///
/// Timestamps are epoch milliseconds. `start` is inclusive, `end` exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    group: String,
    prefix: Option<String>,
    start: i64,
    end: i64,
}

impl QueryParams {
    pub fn new(
        group: impl Into<String>,
        prefix: Option<String>,
        start: i64,
        end: i64,
    ) -> Result<Self, ParseError> {
        if start > end {
            return Err(ParseError::InvertedWindow { start, end });
        }

        Ok(Self {
            group: group.into(),
            // An empty prefix matches everything, same as no prefix
            prefix: prefix.filter(|p| !p.is_empty()),
            start,
            end,
        })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    /// True when `start == end`, a window no event can fall into.
    pub fn is_empty_window(&self) -> bool {
        self.start == self.end
    }
}

/// A stream as reported by the service's stream listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub name: String,
    /// `None` when the stream has never received an event.
    pub last_event: Option<i64>,
}

impl StreamDescriptor {
    pub fn new(name: impl Into<String>, last_event: Option<i64>) -> Self {
        Self {
            name: name.into(),
            last_event,
        }
    }
}

/// A single log event. Ordering is by `timestamp` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    stream: String,
    timestamp: i64,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ingestion_time: Option<i64>,
}

impl LogEvent {
    pub fn new(stream: impl Into<String>, timestamp: i64, message: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            timestamp,
            message: message.into(),
            ingestion_time: None,
        }
    }

    pub fn with_ingestion_time(mut self, ingestion_time: Option<i64>) -> Self {
        self.ingestion_time = ingestion_time;
        self
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn ingestion_time(&self) -> Option<i64> {
        self.ingestion_time
    }
}

/// Events in ascending timestamp order. Equal timestamps keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LogSequence(Vec<LogEvent>);

impl LogSequence {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a sequence from events in any order.
    ///
    /// The sort is stable, so events sharing a timestamp stay in the order
    /// they were given.
    pub fn from_events(mut events: Vec<LogEvent>) -> Self {
        events.sort_by_key(LogEvent::timestamp);
        Self(events)
    }

    /// Wrap events that are already ascending. Only for callers that built
    /// the vector in order themselves.
    pub(crate) fn from_sorted(events: Vec<LogEvent>) -> Self {
        debug_assert!(events
            .windows(2)
            .all(|w| w[0].timestamp() <= w[1].timestamp()));
        Self(events)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogEvent> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[LogEvent] {
        &self.0
    }

    pub fn into_events(self) -> Vec<LogEvent> {
        self.0
    }
}

impl IntoIterator for LogSequence {
    type Item = LogEvent;
    type IntoIter = std::vec::IntoIter<LogEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a LogSequence {
    type Item = &'a LogEvent;
    type IntoIter = std::slice::Iter<'a, LogEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One page of a paginated remote call.
///
/// `next_token` is the continuation state. Only its absence ends a call
/// chain; an empty page with a token means keep going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_token: Option<String>) -> Self {
        Self {
            items,
            // The service sometimes sends "" instead of omitting the field
            next_token: next_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    pub fn has_more(&self) -> bool {
        self.next_token.is_some()
    }
}
