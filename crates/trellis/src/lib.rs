//! Trellis - idempotent import of external issue-tracker exports.
//!
//! Reads a line-delimited JSON export of external issues and writes it into a
//! tenant's three-level hierarchy of epics, features and tasks. Records are
//! matched by external id, so re-running an import only creates what is new.
//!
//! The crate provides both the `trellis` CLI and a library: build a
//! [`pipeline::Pipeline`] over any [`storage::RecordStore`] and feed it an
//! async byte stream.

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod cancel;
pub mod config;
pub mod domain;
pub mod error;
pub mod hierarchy;
pub mod id_generation;
pub mod identity;
pub mod pipeline;
pub mod report;
pub mod storage;
pub mod vocabulary;

// Public CLI module (needed by binary)
pub mod app;
pub mod cli;

// Command implementations
pub mod commands;

pub mod output;
