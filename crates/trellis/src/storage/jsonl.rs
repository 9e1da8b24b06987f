//! JSONL file persistence for the record store.
//!
//! The file holds one [`StoreEntry`] per line. Loading replays the entries
//! into an in-memory store; lines that fail to parse or violate a constraint
//! become [`LoadWarning`]s. Every successful insert is appended to the file
//! before it returns, so a run that dies halfway keeps what it wrote.
//! [`RecordStore::save`] compacts the file with an atomic rewrite.

use crate::domain::{EntityKind, NewRecord, Product, Record, TenantId, User};
use crate::error::Result;
use crate::storage::in_memory::{InMemoryStore, new_store};
use crate::storage::{LoadWarning, RecordStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use trellis_jsonl::{JsonlWriter, Warning, read_jsonl_resilient, write_jsonl_atomic_iter};

/// One line of the store file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "lowercase")]
pub enum StoreEntry {
    /// A seed product
    Product(Product),
    /// A seed user
    User(User),
    /// An epic, feature, or task
    Record(Record),
}

/// In-memory store that mirrors every write to a JSONL file.
#[derive(Debug)]
pub struct JsonlBackedStore {
    inner: InMemoryStore,
    path: PathBuf,
}

impl JsonlBackedStore {
    /// Open the store at `path`, loading it if the file exists.
    ///
    /// # Errors
    ///
    /// Returns `Error::Jsonl` if the file exists but cannot be read.
    pub async fn open(path: impl Into<PathBuf>) -> Result<(Self, Vec<LoadWarning>)> {
        let path = path.into();
        let inner = new_store();
        let mut warnings = Vec::new();

        if fs::try_exists(&path).await? {
            let (entries, line_warnings) = read_jsonl_resilient::<StoreEntry, _>(&path).await?;
            warnings.extend(line_warnings.into_iter().map(|w| match w {
                Warning::MalformedJson { line_number, error } => {
                    LoadWarning::MalformedLine { line_number, error }
                }
                Warning::SkippedLine {
                    line_number,
                    reason,
                } => LoadWarning::MalformedLine {
                    line_number,
                    error: reason,
                },
            }));

            let mut guard = inner.lock().await;
            for entry in entries {
                match entry {
                    StoreEntry::Product(product) => guard.put_product(product),
                    StoreEntry::User(user) => guard.put_user(user),
                    StoreEntry::Record(record) => {
                        let id = record.id.to_string();
                        if let Err(e) = guard.restore(record) {
                            warnings.push(LoadWarning::InvalidRecord {
                                id,
                                error: e.to_string(),
                            });
                        }
                    }
                }
            }
            drop(guard);

            tracing::debug!(path = %path.display(), warnings = warnings.len(), "Loaded store");
        }

        Ok((Self { inner, path }, warnings))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry to the backing file.
    ///
    /// The file is reopened per call because [`RecordStore::save`] replaces it.
    async fn append(&self, entry: &StoreEntry) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut writer = JsonlWriter::new(file);
        writer.write(entry).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonlBackedStore {
    async fn find_by_external_id(
        &self,
        tenant: &TenantId,
        kind: EntityKind,
        external_id: &str,
    ) -> Result<Option<Record>> {
        self.inner
            .find_by_external_id(tenant, kind, external_id)
            .await
    }

    async fn insert(&mut self, record: NewRecord) -> Result<Record> {
        let record = self.inner.insert(record).await?;
        if let Err(e) = self.append(&StoreEntry::Record(record.clone())).await {
            tracing::warn!(id = %record.id, error = %e, "Append failed, rolling back insert");
            self.inner.lock().await.remove(&record.id);
            return Err(e);
        }
        Ok(record)
    }

    async fn list_by_tenant(&self, tenant: &TenantId, kind: EntityKind) -> Result<Vec<Record>> {
        self.inner.list_by_tenant(tenant, kind).await
    }

    async fn find_product(&self, tenant: &TenantId, id: &str) -> Result<Option<Product>> {
        self.inner.find_product(tenant, id).await
    }

    async fn find_user(&self, tenant: &TenantId, id: &str) -> Result<Option<User>> {
        self.inner.find_user(tenant, id).await
    }

    async fn insert_product(&mut self, product: Product) -> Result<()> {
        self.append(&StoreEntry::Product(product.clone())).await?;
        self.inner.insert_product(product).await
    }

    async fn insert_user(&mut self, user: User) -> Result<()> {
        self.append(&StoreEntry::User(user.clone())).await?;
        self.inner.insert_user(user).await
    }

    async fn save(&self) -> Result<()> {
        let entries = self.inner.lock().await.entries();
        write_jsonl_atomic_iter(&self.path, entries).await?;
        Ok(())
    }
}
