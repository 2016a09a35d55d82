pub mod types;
pub mod window;

pub use types::{LogEvent, LogSequence, Page, QueryParams, StreamDescriptor};
pub use window::{parse_instant, parse_relative_duration, ParseError, TimeWindow};
