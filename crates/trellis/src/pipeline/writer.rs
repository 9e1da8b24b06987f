//! Record creation.
//!
//! Turns a resolved external issue into a [`NewRecord`] and inserts it. A
//! store error is logged against the external id and returned as a
//! [`SkipReason::WriteFailure`] so the batch can carry on.

use crate::domain::external::ExternalIssue;
use crate::domain::{EntityKind, InternalStatus, NewRecord, RecordId, SeedContext};
use crate::hierarchy::ParentSource;
use crate::report::{Disposition, Imported, SkipReason};
use crate::storage::RecordStore;
use chrono::{DateTime, Utc};

/// An external issue with every mapping decision made.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRecord<'a> {
    /// Target kind
    pub kind: EntityKind,
    /// Source issue
    pub issue: &'a ExternalIssue,
    /// Chosen parent, with how it was chosen
    pub parent: Option<(&'a RecordId, ParentSource)>,
    /// Mapped status
    pub status: InternalStatus,
    /// Mapped priority
    pub priority: u8,
}

impl ResolvedRecord<'_> {
    /// Build the insert request, filling defaults from the seed and the run's
    /// import timestamp.
    pub fn to_new_record(&self, seed: &SeedContext, imported_at: DateTime<Utc>) -> NewRecord {
        let issue = self.issue;
        let closed_at = issue
            .closed_at
            .or_else(|| self.status.is_terminal().then_some(imported_at));

        NewRecord {
            kind: self.kind,
            external_id: issue.id.clone(),
            parent_id: self.parent.map(|(id, _)| id.clone()),
            tenant_id: seed.tenant_id.clone(),
            product_id: seed.product.id.clone(),
            created_by: seed.user.id.clone(),
            title: issue.title.clone(),
            description: issue.description.clone().unwrap_or_default(),
            status: self.status,
            priority: self.priority,
            labels: issue.labels.iter().flatten().cloned().collect(),
            created_at: issue.created_at.unwrap_or(imported_at),
            updated_at: issue.updated_at.unwrap_or(imported_at),
            closed_at,
        }
    }
}

/// Insert `resolved` into `store`.
///
/// # Errors
///
/// Returns [`SkipReason::WriteFailure`] when the store rejects the insert.
pub async fn create(
    store: &mut dyn RecordStore,
    seed: &SeedContext,
    imported_at: DateTime<Utc>,
    resolved: ResolvedRecord<'_>,
) -> Result<Imported, SkipReason> {
    let new_record = resolved.to_new_record(seed, imported_at);

    match store.insert(new_record).await {
        Ok(record) => {
            tracing::info!(
                kind = %resolved.kind,
                external_id = %resolved.issue.id,
                id = %record.id,
                parent = record.parent_id.as_ref().map(RecordId::as_str),
                "Created"
            );
            Ok(Imported {
                internal_id: record.id,
                disposition: Disposition::Created,
                parent: record.parent_id,
                parent_source: resolved.parent.map(|(_, source)| source),
            })
        }
        Err(e) => {
            tracing::warn!(
                kind = %resolved.kind,
                external_id = %resolved.issue.id,
                error = %e,
                "Failed to create record"
            );
            Err(SkipReason::WriteFailure {
                message: e.to_string(),
            })
        }
    }
}
