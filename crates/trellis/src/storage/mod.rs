//! Record store abstraction.
//!
//! The import pipeline only needs a narrow interface: look a record up by its
//! external id, insert a record, list a tenant's records, and read the two
//! seed entities. [`RecordStore`] is that interface. Two implementations ship
//! with the crate:
//!
//! - **In-memory**: ephemeral, used by tests and as the core of the file store
//! - **JSONL**: the in-memory store loaded from a JSONL file, appending every
//!   insert to the file as it happens
//!
//! # Example
//!
//! ```no_run
//! use trellis::storage::{create_store, StoreBackend};
//! use trellis::domain::{EntityKind, TenantId};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let store = create_store(StoreBackend::InMemory).await?;
//!     let epics = store.list_by_tenant(&TenantId::new("acme"), EntityKind::Epic).await?;
//!     assert!(epics.is_empty());
//!     Ok(())
//! }
//! ```

use crate::domain::{EntityKind, NewRecord, Product, Record, TenantId, User};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

pub mod in_memory;
pub mod jsonl;

pub use jsonl::{JsonlBackedStore, StoreEntry};

/// Tenant-scoped storage for epics, features, tasks, and their seed context.
///
/// Implementations must be `Send + Sync`; the trait is object-safe so callers
/// can hold a `Box<dyn RecordStore>`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Find the record of `kind` imported from `external_id` for `tenant`.
    async fn find_by_external_id(
        &self,
        tenant: &TenantId,
        kind: EntityKind,
        external_id: &str,
    ) -> Result<Option<Record>>;

    /// Insert a new record and return it with its generated id.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if field constraints fail
    /// - `Error::DuplicateExternalId` if (tenant, kind, external id) exists
    /// - `Error::InvalidParent` if the parent is missing or of the wrong kind
    /// - `Error::SeedMissing` if the product or creating user do not exist
    async fn insert(&mut self, record: NewRecord) -> Result<Record>;

    /// All records of `kind` belonging to `tenant`, in insertion order.
    async fn list_by_tenant(&self, tenant: &TenantId, kind: EntityKind) -> Result<Vec<Record>>;

    /// Look up a product.
    async fn find_product(&self, tenant: &TenantId, id: &str) -> Result<Option<Product>>;

    /// Look up a user.
    async fn find_user(&self, tenant: &TenantId, id: &str) -> Result<Option<User>>;

    /// Create or replace a product.
    async fn insert_product(&mut self, product: Product) -> Result<()>;

    /// Create or replace a user.
    async fn insert_user(&mut self, user: User) -> Result<()>;

    /// Flush state to persistent storage.
    ///
    /// No-op for the in-memory store. The JSONL store rewrites its file
    /// atomically, dropping any lines it skipped on load.
    async fn save(&self) -> Result<()>;
}

/// Storage backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-memory storage (ephemeral)
    InMemory,

    /// JSONL file storage (persistent)
    Jsonl(PathBuf),
}

/// A non-fatal problem found while loading a store file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// A line that could not be parsed as a store entry.
    MalformedLine {
        /// 1-based line number in the store file
        line_number: usize,
        /// Parser message
        error: String,
    },

    /// A parsed record that violates a store constraint and was dropped.
    InvalidRecord {
        /// Internal id of the dropped record
        id: String,
        /// The violated constraint
        error: String,
    },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::MalformedLine { line_number, error } => {
                write!(f, "line {line_number}: {error}")
            }
            LoadWarning::InvalidRecord { id, error } => write!(f, "record {id}: {error}"),
        }
    }
}

/// Create a store for the given backend.
///
/// A JSONL path that does not exist yet yields an empty store; the file is
/// created by the first write.
///
/// # Errors
///
/// - `Error::Jsonl` if an existing store file cannot be read
pub async fn create_store(backend: StoreBackend) -> Result<Box<dyn RecordStore>> {
    match backend {
        StoreBackend::InMemory => Ok(in_memory::new_in_memory_store()),
        StoreBackend::Jsonl(path) => {
            let (store, warnings) = JsonlBackedStore::open(path).await?;
            for warning in &warnings {
                tracing::warn!(path = %store.path().display(), %warning, "Store load warning");
            }
            Ok(Box::new(store))
        }
    }
}
