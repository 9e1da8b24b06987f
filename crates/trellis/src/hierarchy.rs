//! Parent resolution for features and tasks.
//!
//! The external tracker records hierarchy as `parent-child` dependency edges,
//! in no particular order and sometimes not at all. A parent is taken from the
//! first edge whose target has already been resolved this run. Without one,
//! a feature falls back to the first epic of the run (or is skipped when there
//! is none) and a task falls back to the first feature (or goes parentless).

use crate::domain::external::ExternalIssue;
use crate::domain::{EntityKind, RecordId};
use crate::identity::IdentityMaps;
use serde::Serialize;

/// How a parent was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentSource {
    /// From a `parent-child` edge on the record
    Explicit,
    /// From the fallback policy
    Fallback,
}

/// Where a record goes in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentDecision {
    /// Attach under `id`.
    Parent {
        /// Internal id of the parent
        id: RecordId,
        /// How it was chosen
        source: ParentSource,
    },
    /// Import with no parent.
    Root,
    /// Do not import; no acceptable parent exists.
    Skip,
}

/// Decide the parent of `issue`, imported as `kind`.
///
/// Epics are always [`ParentDecision::Root`].
pub fn resolve_parent(
    issue: &ExternalIssue,
    kind: EntityKind,
    identities: &IdentityMaps,
) -> ParentDecision {
    let Some(parent_kind) = kind.parent_kind() else {
        return ParentDecision::Root;
    };
    let parents = identities.get(parent_kind);

    let explicit = issue
        .dependencies()
        .iter()
        .filter(|edge| edge.is_parent_edge_of(&issue.id))
        .find_map(|edge| parents.get(&edge.depends_on_id));
    if let Some(id) = explicit {
        return ParentDecision::Parent {
            id: id.clone(),
            source: ParentSource::Explicit,
        };
    }

    match (kind, parents.first()) {
        (_, Some((external_id, id))) => {
            tracing::debug!(
                external_id = %issue.id,
                kind = %kind,
                parent = external_id,
                "No resolvable parent edge, using fallback parent"
            );
            ParentDecision::Parent {
                id: id.clone(),
                source: ParentSource::Fallback,
            }
        }
        (EntityKind::Feature, None) => ParentDecision::Skip,
        (_, None) => ParentDecision::Root,
    }
}
