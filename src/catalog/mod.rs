use crate::query::StreamDescriptor;
use crate::remote::{ListStreamsRequest, LogService, RemoteError, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// How the stream listing is requested and scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// List by last-event time, newest first, and stop at the first stream
    /// that went quiet before the window opened.
    #[default]
    LastEventDescending,
    /// Let the service filter by prefix, make no ordering assumption and
    /// check every stream.
    FullScan,
}

/// Discovers the streams of a group that may hold events in a window.
pub struct StreamCatalog {
    service: Arc<dyn LogService>,
    scan_mode: ScanMode,
    retry: RetryPolicy,
}

impl StreamCatalog {
    pub fn new(service: Arc<dyn LogService>, scan_mode: ScanMode, retry: RetryPolicy) -> Self {
        Self {
            service,
            scan_mode,
            retry,
        }
    }

    /// List the streams of `group` whose name starts with `prefix` and whose
    /// last event is not older than `window_start`.
    ///
    /// Streams come back in listing order. Any page failure aborts the whole
    /// discovery; a partial listing is never returned.
    pub async fn discover(
        &self,
        group: &str,
        prefix: Option<&str>,
        window_start: i64,
    ) -> Result<Vec<StreamDescriptor>, RemoteError> {
        let ordered = self.scan_mode == ScanMode::LastEventDescending;
        let mut request = ListStreamsRequest {
            group: group.to_string(),
            prefix: if ordered { None } else { prefix.map(str::to_string) },
            order_by_last_event: ordered,
            descending: ordered,
            next_token: None,
        };

        let mut scan = Scan::new(prefix, window_start, ordered);
        let mut pages = 0usize;

        loop {
            let page = self
                .retry
                .run("ListStreams", || self.service.list_streams(&request))
                .await?;
            pages += 1;

            for stream in page.items {
                if scan.offer(stream) == Step::Stop {
                    debug!(
                        group = %group,
                        pages = pages,
                        kept = scan.kept.len(),
                        "Stopped stream scan at first stream older than window"
                    );
                    return Ok(scan.kept);
                }
            }

            match page.next_token {
                Some(token) => request.next_token = Some(token),
                None => break,
            }
        }

        debug!(group = %group, pages = pages, kept = scan.kept.len(), "Stream scan complete");
        Ok(scan.kept)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Stop,
}

/// Per-stream filtering state across all pages of one listing.
struct Scan<'a> {
    prefix: Option<&'a str>,
    window_start: i64,
    /// Early stop is allowed only while the listing is known to be
    /// descending by last-event time.
    early_stop: bool,
    previous: Option<i64>,
    kept: Vec<StreamDescriptor>,
}

impl<'a> Scan<'a> {
    fn new(prefix: Option<&'a str>, window_start: i64, early_stop: bool) -> Self {
        Self {
            prefix,
            window_start,
            early_stop,
            previous: None,
            kept: Vec::new(),
        }
    }

    fn offer(&mut self, stream: StreamDescriptor) -> Step {
        // Ordering is checked on every stream, matching or not, so a
        // misordered listing is caught before it can cut the scan short.
        if self.early_stop {
            if let (Some(prev), Some(current)) = (self.previous, stream.last_event) {
                if current > prev {
                    warn!(
                        stream = %stream.name,
                        last_event = current,
                        previous = prev,
                        "Stream listing is not ordered by last event, falling back to full scan"
                    );
                    self.early_stop = false;
                }
            }
            if stream.last_event.is_some() {
                self.previous = stream.last_event;
            }
        }

        if let Some(prefix) = self.prefix {
            if !stream.name.starts_with(prefix) {
                return Step::Continue;
            }
        }

        let Some(last_event) = stream.last_event else {
            return Step::Continue;
        };

        if last_event < self.window_start {
            return if self.early_stop {
                Step::Stop
            } else {
                Step::Continue
            };
        }

        self.kept.push(stream);
        Step::Continue
    }
}
