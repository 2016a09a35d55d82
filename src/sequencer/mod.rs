pub mod dedup;
pub mod merge;

pub use dedup::dedup;
pub use merge::{merge, merge_all};
