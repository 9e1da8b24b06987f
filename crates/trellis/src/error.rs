//! Error types for trellis operations.
//!
//! Only errors that stop a run live here. Problems with a single input record
//! are [`SkipReason`](crate::report::SkipReason) values carried in the run
//! report instead.

use crate::domain::{EntityKind, TenantId};
use crate::pipeline::PipelineStage;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The error type for trellis operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from the JSONL layer.
    #[error("JSONL error: {0}")]
    Jsonl(#[from] trellis_jsonl::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The input file could not be opened.
    #[error("Cannot read input {path}: {source}")]
    Input {
        /// Path that was being opened
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// A required seed entity is absent. Aborts the run before any write.
    #[error("{kind} '{id}' not found for tenant '{tenant}'")]
    SeedMissing {
        /// Which seed lookup failed
        kind: SeedKind,
        /// The id that was looked up
        id: String,
        /// Tenant the lookup was scoped to
        tenant: TenantId,
    },

    /// A record with this external id already exists for the tenant and kind.
    #[error("{kind} with external id '{external_id}' already exists")]
    DuplicateExternalId {
        /// Table the insert targeted
        kind: EntityKind,
        /// The conflicting external id
        external_id: String,
    },

    /// The parent reference of a new record does not point at a record of the
    /// expected kind.
    #[error("Invalid parent for {kind}: {reason}")]
    InvalidParent {
        /// Kind of the record being inserted
        kind: EntityKind,
        /// What was wrong with the reference
        reason: String,
    },

    /// Field-level validation failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// No free internal id could be generated.
    #[error("ID generation failed: {0}")]
    IdGeneration(#[from] crate::id_generation::IdGenerationError),

    /// The pipeline was asked to move to a stage that does not follow the
    /// current one.
    #[error("Invalid stage transition from {from} to {to}")]
    StageOrder {
        /// Current stage
        from: PipelineStage,
        /// Requested stage
        to: PipelineStage,
    },

    /// The run was cancelled by the operator.
    #[error("Import cancelled")]
    Cancelled,
}

/// The two seed lookups that must succeed before an import writes anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedKind {
    /// The product records are attached to
    Product,
    /// The user records are created by
    User,
}

impl fmt::Display for SeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedKind::Product => f.write_str("Product"),
            SeedKind::User => f.write_str("User"),
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `init` found an existing `.trellis/` directory.
    #[error("Trellis is already initialized in {0}")]
    AlreadyInitialized(PathBuf),

    /// The config file could not be parsed or written.
    #[error("Invalid config file {path}: {message}")]
    Parse {
        /// Path of the config file
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// A required setting has no value after merging flags, environment, and
    /// config file.
    #[error("Missing {name}: pass --{name}, set {env}, or add '{name}' to the config file")]
    Missing {
        /// Setting name
        name: &'static str,
        /// Environment variable that can supply it
        env: &'static str,
    },

    /// A setting has an unusable value.
    #[error("Invalid {name}: {reason}")]
    Invalid {
        /// Setting name
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// A specialized Result type for trellis operations.
pub type Result<T> = std::result::Result<T, Error>;
