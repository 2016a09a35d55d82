pub mod aggregator;
pub mod fetcher;
pub mod partition;

pub use aggregator::{Aggregate, Aggregator, AggregatorSettings, FailurePolicy, FetchFailure};
pub use fetcher::{EventFetcher, FetchError};
pub use partition::{partition, MAX_STREAMS_PER_REQUEST};
