#![forbid(unsafe_code)]

//! Bridge between a chat panel and a long-lived worker process.
//!
//! The worker speaks a line protocol: text commands on stdin, one JSON event
//! per line on stdout. The bridge supervises the process, frames and decodes
//! its output, routes events to the panel, the conversation log and the
//! editor, and routes panel requests back to the worker.

pub mod config;
pub mod conversation;
pub mod errors;
pub mod host;
pub mod insertion;
pub mod persistence;
pub mod router;
pub mod supervisor;
pub mod worker;

pub use config::BridgeConfig;
pub use errors::{AppError, Result};
