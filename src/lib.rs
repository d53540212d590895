//! Gist Task Tracker Library
//!
//! A task list whose records live in a single remote JSON document, with
//! optional AI enrichment of task names. Exported for the binary and tests.

pub mod cli;
pub mod codec;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod logging;
pub mod remote;
pub mod server;
pub mod store;
pub mod types;
