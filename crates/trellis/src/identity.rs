//! Cross-system identity.
//!
//! The external id is the idempotency key: a record is created the first time
//! its external id is seen for a (tenant, kind) pair and reused on every later
//! run. The run-scoped [`IdentityMaps`] remember every id resolved so far,
//! created or reused, so the hierarchy resolver can find parents.

use crate::domain::{EntityKind, RecordId, TenantId};
use crate::error::Result;
use crate::storage::RecordStore;
use std::collections::HashMap;

/// Outcome of looking an external id up in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A record already exists; reuse it.
    Existing(RecordId),
    /// No record yet; the caller creates one.
    Missing,
}

/// Look up the record imported from `external_id`.
///
/// # Errors
///
/// Propagates store lookup errors.
pub async fn resolve(
    store: &dyn RecordStore,
    tenant: &TenantId,
    kind: EntityKind,
    external_id: &str,
) -> Result<Resolution> {
    let existing = store.find_by_external_id(tenant, kind, external_id).await?;
    Ok(match existing {
        Some(record) => Resolution::Existing(record.id),
        None => Resolution::Missing,
    })
}

/// External id to internal id for one record kind, in first-registration
/// order.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    ids: HashMap<String, RecordId>,
    order: Vec<String>,
}

impl IdentityMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that `external_id` resolved to `internal_id`.
    ///
    /// The first registration of an external id wins; later ones are ignored.
    pub fn register(&mut self, external_id: &str, internal_id: RecordId) {
        if self.ids.contains_key(external_id) {
            return;
        }
        self.ids.insert(external_id.to_string(), internal_id);
        self.order.push(external_id.to_string());
    }

    /// Internal id for `external_id`, if registered this run.
    pub fn get(&self, external_id: &str) -> Option<&RecordId> {
        self.ids.get(external_id)
    }

    /// The earliest registered entry.
    pub fn first(&self) -> Option<(&str, &RecordId)> {
        let external_id = self.order.first()?;
        self.ids
            .get(external_id)
            .map(|id| (external_id.as_str(), id))
    }

    /// Number of distinct external ids registered.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// One identity map per record kind.
#[derive(Debug, Clone, Default)]
pub struct IdentityMaps {
    epics: IdentityMap,
    features: IdentityMap,
    tasks: IdentityMap,
}

impl IdentityMaps {
    /// Create empty maps.
    pub fn new() -> Self {
        Self::default()
    }

    /// The map for `kind`.
    pub fn get(&self, kind: EntityKind) -> &IdentityMap {
        match kind {
            EntityKind::Epic => &self.epics,
            EntityKind::Feature => &self.features,
            EntityKind::Task => &self.tasks,
        }
    }

    /// The map for `kind`, mutably.
    pub fn get_mut(&mut self, kind: EntityKind) -> &mut IdentityMap {
        match kind {
            EntityKind::Epic => &mut self.epics,
            EntityKind::Feature => &mut self.features,
            EntityKind::Task => &mut self.tasks,
        }
    }

    /// Distinct internal ids tracked for `kind`.
    pub fn distinct_internal_ids(&self, kind: EntityKind) -> usize {
        let map = self.get(kind);
        let mut ids: Vec<&RecordId> = map.ids.values().collect();
        ids.sort();
        ids.dedup();
        ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_registration_wins() {
        let mut map = IdentityMap::new();
        map.register("bd-1", RecordId::new("epic-aaaaaa"));
        map.register("bd-1", RecordId::new("epic-bbbbbb"));

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("bd-1"), Some(&RecordId::new("epic-aaaaaa")));
    }

    #[test]
    fn first_follows_registration_order() {
        let mut map = IdentityMap::new();
        assert!(map.first().is_none());

        map.register("bd-9", RecordId::new("epic-zzzzzz"));
        map.register("bd-1", RecordId::new("epic-aaaaaa"));

        let (external_id, id) = map.first().unwrap();
        assert_eq!(external_id, "bd-9");
        assert_eq!(id.as_str(), "epic-zzzzzz");
    }

    #[test]
    fn maps_are_separate_per_kind() {
        let mut maps = IdentityMaps::new();
        maps.get_mut(EntityKind::Epic)
            .register("bd-1", RecordId::new("epic-aaaaaa"));

        assert!(maps.get(EntityKind::Feature).get("bd-1").is_none());
        assert_eq!(maps.distinct_internal_ids(EntityKind::Epic), 1);
        assert_eq!(maps.distinct_internal_ids(EntityKind::Task), 0);
    }
}
