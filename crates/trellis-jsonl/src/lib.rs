//! Resilient JSONL (JSON Lines) streaming.
//!
//! This library reads line-delimited JSON one record at a time, turning lines
//! that fail to parse into [`Warning`]s instead of aborting, and writes JSONL
//! either incrementally or atomically.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod atomic;
pub mod error;
pub mod reader;
pub mod warning;
pub mod writer;

pub use atomic::{write_jsonl_atomic, write_jsonl_atomic_iter};
pub use error::{Error, Result};
pub use reader::{JsonlReader, read_jsonl_resilient};
pub use warning::{Warning, WarningCollector};
pub use writer::JsonlWriter;
