use crate::fetch::fetcher::FetchError;
use crate::query::LogSequence;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What happens to the rest of a query when one fetch task fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Cancel the remaining tasks and fail the whole query.
    #[default]
    FailFast,
    /// Let every task finish and return partial results with the failures.
    BestEffort,
}

#[derive(Debug, Clone, Default)]
pub struct AggregatorSettings {
    /// Upper bound on tasks fetching at once. `None` runs every unit at once.
    pub max_concurrency: Option<usize>,
    /// Wall-clock limit for the whole run. Tasks still going when it
    /// expires are cancelled.
    pub deadline: Option<Duration>,
    pub policy: FailurePolicy,
}

/// A unit of work that did not produce events.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub unit: String,
    pub error: FetchError,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.unit, self.error)
    }
}

/// Everything the tasks produced, once all of them have finished.
#[derive(Debug, Default)]
pub struct Aggregate {
    /// One sequence per successful unit, in unit order.
    pub sequences: Vec<LogSequence>,
    pub failures: Vec<FetchFailure>,
}

impl Aggregate {
    pub fn event_count(&self) -> usize {
        self.sequences.iter().map(LogSequence::len).sum()
    }
}

/// Runs one fetch task per unit in parallel and waits for all of them.
pub struct Aggregator {
    settings: AggregatorSettings,
}

impl Aggregator {
    pub fn new(settings: AggregatorSettings) -> Self {
        Self { settings }
    }

    /// Spawn `fetch` once per `(label, unit)` and collect the results.
    ///
    /// Each task keeps its events to itself until it finishes, then appends
    /// them to the shared accumulator under one lock acquisition. This
    /// returns only after every task has completed or been cancelled.
    pub async fn run<U, F, Fut>(&self, units: Vec<(String, U)>, fetch: F) -> Aggregate
    where
        U: Send + 'static,
        F: Fn(U) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<LogSequence, FetchError>> + Send + 'static,
    {
        if units.is_empty() {
            return Aggregate::default();
        }

        info!(
            units = units.len(),
            max_concurrency = ?self.settings.max_concurrency,
            policy = ?self.settings.policy,
            "Starting fetch tasks"
        );

        let accumulated: Arc<Mutex<Vec<(usize, LogSequence)>>> =
            Arc::new(Mutex::new(Vec::with_capacity(units.len())));
        let abort = CancellationToken::new();
        let deadline = CancellationToken::new();
        let limiter = self
            .settings
            .max_concurrency
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        let fail_fast = self.settings.policy == FailurePolicy::FailFast;

        let watchdog = self.settings.deadline.map(|limit| {
            let deadline = deadline.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                warn!(deadline_ms = limit.as_millis() as u64, "Query deadline reached, cancelling fetches");
                deadline.cancel();
            })
        });

        let mut labels = Vec::with_capacity(units.len());
        let mut handles = Vec::with_capacity(units.len());

        for (index, (label, unit)) in units.into_iter().enumerate() {
            let fetch = fetch.clone();
            let accumulated = accumulated.clone();
            let abort = abort.clone();
            let deadline = deadline.clone();
            let limiter = limiter.clone();

            handles.push(tokio::spawn(async move {
                let work = async move {
                    let _permit = match limiter {
                        Some(semaphore) => match semaphore.acquire_owned().await {
                            Ok(permit) => Some(permit),
                            Err(_) => return Err(FetchError::Cancelled),
                        },
                        None => None,
                    };
                    fetch(unit).await
                };

                let result = tokio::select! {
                    result = work => result,
                    _ = abort.cancelled() => Err(FetchError::Cancelled),
                    _ = deadline.cancelled() => Err(FetchError::DeadlineExceeded),
                };

                match result {
                    Ok(sequence) => {
                        accumulated.lock().await.push((index, sequence));
                        Ok(())
                    }
                    Err(e) => {
                        if fail_fast && !matches!(e, FetchError::Cancelled) {
                            abort.cancel();
                        }
                        Err(e)
                    }
                }
            }));
            labels.push(label);
        }

        let results = futures::future::join_all(handles).await;

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        let mut failures = Vec::new();
        for (label, result) in labels.into_iter().zip(results) {
            let error = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(join_error) => FetchError::TaskPanicked(join_error.to_string()),
            };
            warn!(unit = %label, error = %error, "Fetch task failed");
            failures.push(FetchFailure { unit: label, error });
        }

        let mut collected = std::mem::take(&mut *accumulated.lock().await);
        collected.sort_by_key(|(index, _)| *index);
        let sequences: Vec<LogSequence> = collected.into_iter().map(|(_, seq)| seq).collect();

        let aggregate = Aggregate {
            sequences,
            failures,
        };
        debug!(
            succeeded = aggregate.sequences.len(),
            failed = aggregate.failures.len(),
            events = aggregate.event_count(),
            "All fetch tasks finished"
        );
        aggregate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::LogEvent;
    use crate::remote::RemoteError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn seq(stream: &str, timestamps: &[i64]) -> LogSequence {
        LogSequence::from_events(
            timestamps
                .iter()
                .map(|t| LogEvent::new(stream, *t, format!("{}-{}", stream, t)))
                .collect(),
        )
    }

    fn units(n: usize) -> Vec<(String, usize)> {
        (0..n).map(|i| (format!("batch-{}", i), i)).collect()
    }

    #[tokio::test]
    async fn test_collects_every_unit_in_unit_order() {
        let aggregator = Aggregator::new(AggregatorSettings::default());

        let aggregate = aggregator
            .run(units(8), |i| async move {
                // Later units finish first
                tokio::time::sleep(Duration::from_millis((8 - i as u64) * 3)).await;
                Ok(seq(&format!("s{}", i), &[i as i64, i as i64 + 10]))
            })
            .await;

        assert!(aggregate.failures.is_empty());
        assert_eq!(aggregate.sequences.len(), 8);
        assert_eq!(aggregate.event_count(), 16);
        for (i, sequence) in aggregate.sequences.iter().enumerate() {
            assert_eq!(sequence.as_slice()[0].stream(), format!("s{}", i));
        }
    }

    #[tokio::test]
    async fn test_fetch_closure_need_not_be_sync() {
        // Cell is Send and Clone but not Sync
        let offset = std::cell::Cell::new(100i64);
        let aggregator = Aggregator::new(AggregatorSettings {
            max_concurrency: Some(2),
            ..Default::default()
        });

        let aggregate = aggregator
            .run(units(3), move |i| {
                let ts = offset.get() + i as i64;
                async move { Ok(seq("s", &[ts])) }
            })
            .await;

        assert_eq!(aggregate.event_count(), 3);
        assert_eq!(aggregate.sequences[2].as_slice()[0].timestamp(), 102);
    }

    #[tokio::test]
    async fn test_empty_units() {
        let aggregator = Aggregator::new(AggregatorSettings::default());
        let aggregate = aggregator
            .run(Vec::<(String, usize)>::new(), |_| async { Ok(LogSequence::new()) })
            .await;
        assert!(aggregate.sequences.is_empty());
        assert!(aggregate.failures.is_empty());
    }

    #[tokio::test]
    async fn test_best_effort_keeps_partial_results() {
        let aggregator = Aggregator::new(AggregatorSettings {
            policy: FailurePolicy::BestEffort,
            ..Default::default()
        });

        let aggregate = aggregator
            .run(units(4), |i| async move {
                if i == 2 {
                    Err(FetchError::Remote(RemoteError::Service("down".to_string())))
                } else {
                    Ok(seq("s", &[i as i64]))
                }
            })
            .await;

        assert_eq!(aggregate.sequences.len(), 3);
        assert_eq!(aggregate.failures.len(), 1);
        assert_eq!(aggregate.failures[0].unit, "batch-2");
    }

    #[tokio::test]
    async fn test_fail_fast_cancels_siblings() {
        let aggregator = Aggregator::new(AggregatorSettings {
            policy: FailurePolicy::FailFast,
            ..Default::default()
        });

        let aggregate = aggregator
            .run(units(3), |i| async move {
                if i == 0 {
                    Err(FetchError::Remote(RemoteError::Service("down".to_string())))
                } else {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(seq("s", &[1]))
                }
            })
            .await;

        assert!(aggregate.sequences.is_empty());
        assert_eq!(aggregate.failures.len(), 3);
        assert!(matches!(aggregate.failures[0].error, FetchError::Remote(_)));
        assert!(aggregate.failures[1..]
            .iter()
            .all(|f| matches!(f.error, FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_deadline_cancels_hung_tasks() {
        let aggregator = Aggregator::new(AggregatorSettings {
            deadline: Some(Duration::from_millis(50)),
            policy: FailurePolicy::BestEffort,
            ..Default::default()
        });

        let aggregate = aggregator
            .run(units(2), |i| async move {
                if i == 1 {
                    std::future::pending::<()>().await;
                }
                Ok(seq("s", &[1]))
            })
            .await;

        assert_eq!(aggregate.sequences.len(), 1);
        assert_eq!(aggregate.failures.len(), 1);
        assert!(matches!(
            aggregate.failures[0].error,
            FetchError::DeadlineExceeded
        ));
    }

    #[tokio::test]
    async fn test_max_concurrency_is_respected() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let aggregator = Aggregator::new(AggregatorSettings {
            max_concurrency: Some(2),
            ..Default::default()
        });

        let (r, p) = (running.clone(), peak.clone());
        let aggregate = aggregator
            .run(units(6), move |_| {
                let running = r.clone();
                let peak = p.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(LogSequence::new())
                }
            })
            .await;

        assert_eq!(aggregate.sequences.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported() {
        let aggregator = Aggregator::new(AggregatorSettings {
            policy: FailurePolicy::BestEffort,
            ..Default::default()
        });

        let aggregate = aggregator
            .run(units(2), |i| async move {
                if i == 1 {
                    panic!("fetch blew up");
                }
                Ok(seq("s", &[1]))
            })
            .await;

        assert_eq!(aggregate.sequences.len(), 1);
        assert!(matches!(
            aggregate.failures[0].error,
            FetchError::TaskPanicked(_)
        ));
    }
}
