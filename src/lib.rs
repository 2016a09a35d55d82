pub mod catalog;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod pipeline;
pub mod query;
pub mod remote;
pub mod sequencer;
