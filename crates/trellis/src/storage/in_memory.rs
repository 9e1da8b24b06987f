//! In-memory record store.
//!
//! Records are kept in insertion order with hash indexes on internal id and on
//! the (tenant, kind, external id) key. The store enforces every constraint a
//! relational backend would: external id uniqueness, parent kind, and the
//! existence of the seed product and user.

use crate::domain::{EntityKind, NewRecord, Product, Record, RecordId, TenantId, User};
use crate::error::{Error, Result, SeedKind};
use crate::id_generation::IdGenerator;
use crate::storage::{RecordStore, StoreEntry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type ExternalKey = (TenantId, EntityKind, String);
type SeedKey = (TenantId, String);

/// Store state. Not thread-safe; wrapped in [`InMemoryStore`].
#[derive(Debug, Default)]
pub struct InMemoryStoreInner {
    /// Records in insertion order
    records: Vec<Record>,

    /// Position of each record in `records`
    by_id: HashMap<RecordId, usize>,

    /// Uniqueness index
    by_external: HashMap<ExternalKey, RecordId>,

    products: HashMap<SeedKey, Product>,
    users: HashMap<SeedKey, User>,

    id_generator: IdGenerator,
}

impl InMemoryStoreInner {
    fn new() -> Self {
        Self::default()
    }

    fn external_key(tenant: &TenantId, kind: EntityKind, external_id: &str) -> ExternalKey {
        (tenant.clone(), kind, external_id.to_string())
    }

    fn get(&self, id: &RecordId) -> Option<&Record> {
        self.by_id.get(id).map(|&index| &self.records[index])
    }

    /// Check that `parent_id` is an acceptable parent for a `kind` record of
    /// `tenant`.
    fn check_parent(
        &self,
        tenant: &TenantId,
        kind: EntityKind,
        parent_id: Option<&RecordId>,
    ) -> Result<()> {
        let invalid = |reason: String| Error::InvalidParent { kind, reason };

        match (kind.parent_kind(), parent_id) {
            (None, Some(_)) => Err(invalid("epics cannot have a parent".to_string())),
            (Some(EntityKind::Epic), None) => {
                Err(invalid("features must belong to an epic".to_string()))
            }
            (_, None) => Ok(()),
            (Some(expected), Some(parent_id)) => {
                let parent = self
                    .get(parent_id)
                    .ok_or_else(|| invalid(format!("parent {parent_id} does not exist")))?;
                if parent.kind != expected {
                    return Err(invalid(format!(
                        "parent {parent_id} is a {}, expected a {expected}",
                        parent.kind
                    )));
                }
                if &parent.tenant_id != tenant {
                    return Err(invalid(format!(
                        "parent {parent_id} belongs to another tenant"
                    )));
                }
                Ok(())
            }
        }
    }

    fn check_seed(&self, record: &NewRecord) -> Result<()> {
        let product_key = (record.tenant_id.clone(), record.product_id.clone());
        if !self.products.contains_key(&product_key) {
            return Err(Error::SeedMissing {
                kind: SeedKind::Product,
                id: record.product_id.clone(),
                tenant: record.tenant_id.clone(),
            });
        }
        let user_key = (record.tenant_id.clone(), record.created_by.clone());
        if !self.users.contains_key(&user_key) {
            return Err(Error::SeedMissing {
                kind: SeedKind::User,
                id: record.created_by.clone(),
                tenant: record.tenant_id.clone(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, new_record: NewRecord) -> Result<Record> {
        // === Phase 1: All validations (no mutations) ===
        new_record.validate().map_err(Error::Validation)?;
        self.check_seed(&new_record)?;

        let key = Self::external_key(
            &new_record.tenant_id,
            new_record.kind,
            &new_record.external_id,
        );
        if self.by_external.contains_key(&key) {
            return Err(Error::DuplicateExternalId {
                kind: new_record.kind,
                external_id: new_record.external_id,
            });
        }
        self.check_parent(
            &new_record.tenant_id,
            new_record.kind,
            new_record.parent_id.as_ref(),
        )?;

        // === Phase 2: Mutations ===
        let id = self.id_generator.generate(
            &new_record.tenant_id,
            new_record.kind,
            &new_record.external_id,
        )?;
        let record = new_record.into_record(RecordId::new(id));
        self.push(key, record.clone());
        Ok(record)
    }

    fn push(&mut self, key: ExternalKey, record: Record) {
        self.by_external.insert(key, record.id.clone());
        self.by_id.insert(record.id.clone(), self.records.len());
        self.records.push(record);
    }

    /// Add a record loaded from persistent storage, keeping its id.
    ///
    /// Seed existence is not rechecked; uniqueness and parent integrity are.
    pub(crate) fn restore(&mut self, record: Record) -> Result<()> {
        record.validate().map_err(Error::Validation)?;
        if self.by_id.contains_key(&record.id) {
            return Err(Error::Storage(format!("duplicate record id {}", record.id)));
        }
        let key = Self::external_key(&record.tenant_id, record.kind, &record.external_id);
        if self.by_external.contains_key(&key) {
            return Err(Error::DuplicateExternalId {
                kind: record.kind,
                external_id: record.external_id,
            });
        }
        self.check_parent(&record.tenant_id, record.kind, record.parent_id.as_ref())?;

        self.id_generator.register_id(record.id.as_str());
        self.push(key, record);
        Ok(())
    }

    /// Remove a record, undoing an insert that could not be persisted.
    pub(crate) fn remove(&mut self, id: &RecordId) -> Option<Record> {
        let index = self.by_id.remove(id)?;
        let record = self.records.remove(index);
        for later in &self.records[index..] {
            if let Some(position) = self.by_id.get_mut(&later.id) {
                *position -= 1;
            }
        }
        self.by_external.remove(&Self::external_key(
            &record.tenant_id,
            record.kind,
            &record.external_id,
        ));
        self.id_generator.release_id(record.id.as_str());
        Some(record)
    }

    pub(crate) fn put_product(&mut self, product: Product) {
        let key = (product.tenant_id.clone(), product.id.clone());
        self.products.insert(key, product);
    }

    pub(crate) fn put_user(&mut self, user: User) {
        let key = (user.tenant_id.clone(), user.id.clone());
        self.users.insert(key, user);
    }

    /// Everything in the store, seeds first, as file entries.
    ///
    /// Seeds are sorted by key and records keep insertion order, so parents
    /// always precede their children.
    pub(crate) fn entries(&self) -> Vec<StoreEntry> {
        let mut products: Vec<&Product> = self.products.values().collect();
        products.sort_by(|a, b| (&a.tenant_id, &a.id).cmp(&(&b.tenant_id, &b.id)));
        let mut users: Vec<&User> = self.users.values().collect();
        users.sort_by(|a, b| (&a.tenant_id, &a.id).cmp(&(&b.tenant_id, &b.id)));

        products
            .into_iter()
            .cloned()
            .map(StoreEntry::Product)
            .chain(users.into_iter().cloned().map(StoreEntry::User))
            .chain(self.records.iter().cloned().map(StoreEntry::Record))
            .collect()
    }
}

/// Thread-safe in-memory store.
pub type InMemoryStore = Arc<Mutex<InMemoryStoreInner>>;

/// Create an empty in-memory store.
pub(crate) fn new_store() -> InMemoryStore {
    Arc::new(Mutex::new(InMemoryStoreInner::new()))
}

/// Create an empty in-memory store behind the [`RecordStore`] trait.
///
/// ```
/// use trellis::storage::in_memory::new_in_memory_store;
///
/// let store = new_in_memory_store();
/// # drop(store);
/// ```
pub fn new_in_memory_store() -> Box<dyn RecordStore> {
    Box::new(new_store())
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn find_by_external_id(
        &self,
        tenant: &TenantId,
        kind: EntityKind,
        external_id: &str,
    ) -> Result<Option<Record>> {
        let inner = self.lock().await;
        let key = InMemoryStoreInner::external_key(tenant, kind, external_id);
        Ok(inner
            .by_external
            .get(&key)
            .and_then(|id| inner.get(id))
            .cloned())
    }

    async fn insert(&mut self, record: NewRecord) -> Result<Record> {
        self.lock().await.insert(record)
    }

    async fn list_by_tenant(&self, tenant: &TenantId, kind: EntityKind) -> Result<Vec<Record>> {
        let inner = self.lock().await;
        Ok(inner
            .records
            .iter()
            .filter(|r| r.kind == kind && &r.tenant_id == tenant)
            .cloned()
            .collect())
    }

    async fn find_product(&self, tenant: &TenantId, id: &str) -> Result<Option<Product>> {
        let inner = self.lock().await;
        Ok(inner
            .products
            .get(&(tenant.clone(), id.to_string()))
            .cloned())
    }

    async fn find_user(&self, tenant: &TenantId, id: &str) -> Result<Option<User>> {
        let inner = self.lock().await;
        Ok(inner.users.get(&(tenant.clone(), id.to_string())).cloned())
    }

    async fn insert_product(&mut self, product: Product) -> Result<()> {
        self.lock().await.put_product(product);
        Ok(())
    }

    async fn insert_user(&mut self, user: User) -> Result<()> {
        self.lock().await.put_user(user);
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        Ok(())
    }
}
