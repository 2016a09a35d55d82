pub mod cloudwatch;
pub mod memory;
pub mod retry;
pub mod traits;

pub use cloudwatch::CloudWatchLogsService;
pub use memory::InMemoryLogService;
pub use retry::RetryPolicy;
pub use traits::{
    FilterEventsRequest, GetEventsRequest, ListStreamsRequest, LogService, RemoteError,
};
