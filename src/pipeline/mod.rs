pub mod runner;

pub use runner::{
    execute, list_streams, run_per_stream_query, run_query, FetchMode, QueryError, QueryOutput,
    QuerySettings,
};
