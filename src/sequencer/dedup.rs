use crate::query::{LogEvent, LogSequence};
use std::collections::HashSet;

/// Identity of an event for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey<'a> {
    pub stream: &'a str,
    pub timestamp: i64,
    pub message: &'a str,
}

impl<'a> From<&'a LogEvent> for DedupKey<'a> {
    fn from(event: &'a LogEvent) -> Self {
        Self {
            stream: event.stream(),
            timestamp: event.timestamp(),
            message: event.message(),
        }
    }
}

/// Drop events whose (stream, timestamp, message) already appeared earlier
/// in the sequence. The first occurrence is kept, so order is unchanged.
///
/// Merging never does this on its own; overlapping retrievals legitimately
/// return the same event twice and callers opt in here.
pub fn dedup(sequence: LogSequence) -> LogSequence {
    let events = sequence.into_events();
    let mut keep = Vec::with_capacity(events.len());
    {
        let mut seen: HashSet<DedupKey<'_>> = HashSet::with_capacity(events.len());
        for event in &events {
            keep.push(seen.insert(DedupKey::from(event)));
        }
    }

    let kept: Vec<LogEvent> = events
        .into_iter()
        .zip(keep)
        .filter_map(|(event, keep)| keep.then_some(event))
        .collect();

    LogSequence::from_sorted(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_removes_exact_repeats() {
        let sequence = LogSequence::from_events(vec![
            LogEvent::new("a", 1, "hello"),
            LogEvent::new("a", 1, "hello"),
            LogEvent::new("b", 1, "hello"),
            LogEvent::new("a", 1, "world"),
            LogEvent::new("a", 2, "hello"),
        ]);

        let deduped = dedup(sequence);
        assert_eq!(deduped.len(), 4);
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        let sequence = LogSequence::from_events(vec![
            LogEvent::new("a", 1, "x"),
            LogEvent::new("b", 1, "y"),
            LogEvent::new("a", 1, "x"),
            LogEvent::new("c", 2, "z"),
        ]);

        let deduped = dedup(sequence);
        let streams: Vec<_> = deduped.iter().map(|e| e.stream()).collect();
        assert_eq!(streams, vec!["a", "b", "c"]);
    }
}
