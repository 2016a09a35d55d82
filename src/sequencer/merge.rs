use crate::query::{LogEvent, LogSequence};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Merge two ascending sequences into one.
///
/// Stable: events with equal timestamps keep their order within each input,
/// and events from `a` come before events from `b`. Nothing is dropped or
/// deduplicated.
pub fn merge(a: LogSequence, b: LogSequence) -> LogSequence {
    if a.is_empty() {
        return b;
    }
    if b.is_empty() {
        return a;
    }

    let mut merged = Vec::with_capacity(a.len() + b.len());
    let mut left = a.into_iter().peekable();
    let mut right = b.into_iter().peekable();

    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => l.timestamp() <= r.timestamp(),
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };

        let next = if take_left { left.next() } else { right.next() };
        merged.extend(next);
    }

    LogSequence::from_sorted(merged)
}

#[derive(Debug)]
struct HeapEntry {
    timestamp: i64,
    source: usize,
    event: LogEvent,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap via Reverse wrapper. Each source has at most one entry in
        // the heap, so (timestamp, source) is a total order.
        self.key().cmp(&other.key())
    }
}

impl HeapEntry {
    fn key(&self) -> (i64, usize) {
        (self.timestamp, self.source)
    }
}

/// Merge any number of ascending sequences.
///
/// Gives the same result as folding [`merge`] over `sequences` from left to
/// right: ties go to the earlier input.
pub fn merge_all(sequences: Vec<LogSequence>) -> LogSequence {
    let mut non_empty: Vec<LogSequence> = sequences.into_iter().filter(|s| !s.is_empty()).collect();
    match non_empty.len() {
        0 => return LogSequence::new(),
        1 => return non_empty.remove(0),
        _ => {}
    }

    let total = non_empty.iter().map(LogSequence::len).sum();
    let mut sources: Vec<_> = non_empty.into_iter().map(LogSequence::into_iter).collect();
    let mut heap = BinaryHeap::with_capacity(sources.len());

    for (source, iter) in sources.iter_mut().enumerate() {
        if let Some(event) = iter.next() {
            heap.push(Reverse(HeapEntry {
                timestamp: event.timestamp(),
                source,
                event,
            }));
        }
    }

    let mut merged = Vec::with_capacity(total);
    while let Some(Reverse(entry)) = heap.pop() {
        let source = entry.source;
        merged.push(entry.event);

        if let Some(event) = sources[source].next() {
            heap.push(Reverse(HeapEntry {
                timestamp: event.timestamp(),
                source,
                event,
            }));
        }
    }

    LogSequence::from_sorted(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(events: &[(i64, &str)]) -> LogSequence {
        LogSequence::from_events(
            events
                .iter()
                .map(|(ts, msg)| LogEvent::new("s", *ts, *msg))
                .collect(),
        )
    }

    fn messages(seq: &LogSequence) -> Vec<&str> {
        seq.iter().map(|e| e.message()).collect()
    }

    #[test]
    fn test_merge_tie_first_argument_first() {
        let merged = merge(seq(&[(5, "a")]), seq(&[(5, "b")]));
        assert_eq!(messages(&merged), vec!["a", "b"]);

        let merged = merge(seq(&[(5, "b")]), seq(&[(5, "a")]));
        assert_eq!(messages(&merged), vec!["b", "a"]);
    }

    #[test]
    fn test_merge_interleaves() {
        let merged = merge(
            seq(&[(1, "a1"), (4, "a4"), (6, "a6")]),
            seq(&[(2, "b2"), (3, "b3"), (7, "b7")]),
        );
        assert_eq!(messages(&merged), vec!["a1", "b2", "b3", "a4", "a6", "b7"]);
    }

    #[test]
    fn test_merge_preserves_order_within_input_on_ties() {
        let merged = merge(
            seq(&[(1, "a1"), (1, "a2"), (2, "a3")]),
            seq(&[(1, "b1"), (1, "b2")]),
        );
        assert_eq!(messages(&merged), vec!["a1", "a2", "b1", "b2", "a3"]);
    }

    #[test]
    fn test_merge_keeps_duplicates() {
        let merged = merge(seq(&[(1, "same")]), seq(&[(1, "same")]));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_with_empty() {
        let merged = merge(LogSequence::new(), seq(&[(1, "x")]));
        assert_eq!(messages(&merged), vec!["x"]);
        let merged = merge(seq(&[(1, "x")]), LogSequence::new());
        assert_eq!(messages(&merged), vec!["x"]);
    }

    #[test]
    fn test_merge_length_and_order_over_many_inputs() {
        // Deterministic pseudo-random inputs with plenty of ties
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        for _ in 0..50 {
            let len_a = (next() % 20) as usize;
            let len_b = (next() % 20) as usize;
            let a: Vec<LogEvent> = (0..len_a)
                .map(|i| LogEvent::new("a", (next() % 10) as i64, format!("a{}", i)))
                .collect();
            let b: Vec<LogEvent> = (0..len_b)
                .map(|i| LogEvent::new("b", (next() % 10) as i64, format!("b{}", i)))
                .collect();
            let a = LogSequence::from_events(a);
            let b = LogSequence::from_events(b);

            // A stable sort of the concatenation is the reference answer
            let mut expected: Vec<LogEvent> = a.iter().chain(b.iter()).cloned().collect();
            expected.sort_by_key(LogEvent::timestamp);

            let merged = merge(a, b);
            assert_eq!(merged.len(), len_a + len_b);
            assert_eq!(merged.as_slice(), expected.as_slice());
        }
    }

    #[test]
    fn test_merge_all_matches_left_fold() {
        let inputs = vec![
            seq(&[(1, "a1"), (3, "a3"), (3, "a3b")]),
            LogSequence::new(),
            seq(&[(3, "b3"), (4, "b4")]),
            seq(&[(0, "c0"), (3, "c3")]),
        ];

        let folded = inputs
            .clone()
            .into_iter()
            .fold(LogSequence::new(), merge);
        let merged = merge_all(inputs);

        assert_eq!(merged, folded);
        assert_eq!(
            messages(&merged),
            vec!["c0", "a1", "a3", "a3b", "b3", "c3", "b4"]
        );
    }

    #[test]
    fn test_merge_is_associative() {
        let a = seq(&[(1, "a"), (5, "a5")]);
        let b = seq(&[(1, "b"), (5, "b5")]);
        let c = seq(&[(1, "c"), (2, "c2")]);

        let left = merge(merge(a.clone(), b.clone()), c.clone());
        let right = merge(a, merge(b, c));
        assert_eq!(left, right);
    }

    #[test]
    fn test_merge_all_empty() {
        assert!(merge_all(vec![]).is_empty());
        assert!(merge_all(vec![LogSequence::new(), LogSequence::new()]).is_empty());
    }
}
