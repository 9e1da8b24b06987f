//! Domain types for the import pipeline.
//!
//! The internal side of the model: tenants, seed entities, and the three
//! record kinds (epics, features, tasks) that imported issues become. The
//! external side lives in [`external`].

pub mod external;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Minimum valid priority (most urgent).
pub const MIN_PRIORITY: u8 = 0;

/// Maximum valid priority (least urgent).
pub const MAX_PRIORITY: u8 = 4;

/// Identifier of the tenant that owns records and seed entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    /// Create a new tenant ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// System-generated identifier of an internal record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Create a new record ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The three record kinds of the hierarchy.
///
/// Declaration order is import order: a kind's parent kind always comes
/// before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Top-level grouping; never has a parent.
    Epic,
    /// Child of an epic.
    Feature,
    /// Child of a feature, or parentless.
    Task,
}

impl EntityKind {
    /// All kinds, in import order.
    pub const ALL: [EntityKind; 3] = [EntityKind::Epic, EntityKind::Feature, EntityKind::Task];

    /// The kind a record of this kind may point at as its parent.
    pub fn parent_kind(self) -> Option<EntityKind> {
        match self {
            EntityKind::Epic => None,
            EntityKind::Feature => Some(EntityKind::Epic),
            EntityKind::Task => Some(EntityKind::Feature),
        }
    }

    /// Lowercase name, as used in the store and in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Epic => "epic",
            EntityKind::Feature => "feature",
            EntityKind::Task => "task",
        }
    }

    /// Plural name for summaries.
    pub fn plural(self) -> &'static str {
        match self {
            EntityKind::Epic => "epics",
            EntityKind::Feature => "features",
            EntityKind::Task => "tasks",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal status vocabulary. Closed: every external status maps to one of
/// these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InternalStatus {
    /// Not started
    Backlog,
    /// Being worked on
    InProgress,
    /// Done
    Completed,
    /// Abandoned
    Cancelled,
}

impl InternalStatus {
    /// Returns true for statuses that end a record's lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, InternalStatus::Completed | InternalStatus::Cancelled)
    }
}

impl fmt::Display for InternalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InternalStatus::Backlog => "backlog",
            InternalStatus::InProgress => "in_progress",
            InternalStatus::Completed => "completed",
            InternalStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A product that imported records are attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier, unique per tenant
    pub id: String,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Display name
    pub name: String,
}

/// A user recorded as the creator of imported records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier, unique per tenant
    pub id: String,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Display name
    pub name: String,
}

/// The pre-existing context every imported record is written into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedContext {
    /// Tenant scoping every read and write of the run
    pub tenant_id: TenantId,
    /// Product the records belong to
    pub product: Product,
    /// User the records are created by
    pub user: User,
}

/// An epic, feature, or task stored in this system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Internal identifier, assigned once at creation
    pub id: RecordId,

    /// Which of the three tables the record lives in
    pub kind: EntityKind,

    /// Identifier in the external tracker; unique per (tenant, kind)
    pub external_id: String,

    /// Parent record (epic for features, feature for tasks)
    pub parent_id: Option<RecordId>,

    /// Owning tenant
    pub tenant_id: TenantId,

    /// Product from the seed context
    pub product_id: String,

    /// Creating user from the seed context
    pub created_by: String,

    /// Record title
    pub title: String,

    /// Record description
    pub description: String,

    /// Current status
    pub status: InternalStatus,

    /// Priority level (0 = highest, 4 = lowest)
    pub priority: u8,

    /// Labels
    pub labels: BTreeSet<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Closed timestamp
    pub closed_at: Option<DateTime<Utc>>,
}

/// Data for creating a new record. The store assigns the ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    /// Target table
    pub kind: EntityKind,
    /// Identifier in the external tracker
    pub external_id: String,
    /// Parent record
    pub parent_id: Option<RecordId>,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Product from the seed context
    pub product_id: String,
    /// Creating user from the seed context
    pub created_by: String,
    /// Record title
    pub title: String,
    /// Record description
    pub description: String,
    /// Status
    pub status: InternalStatus,
    /// Priority level (0-4)
    pub priority: u8,
    /// Labels
    pub labels: BTreeSet<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Closed timestamp
    pub closed_at: Option<DateTime<Utc>>,
}

impl NewRecord {
    /// Validate the field-level constraints of a record.
    ///
    /// Referential constraints (parent kind, seed existence, uniqueness) need
    /// the store and are checked there.
    pub fn validate(&self) -> Result<(), String> {
        validate_fields(
            self.kind,
            &self.external_id,
            &self.title,
            self.priority,
            self.parent_id.is_some(),
        )
    }

    /// Turn the request into a stored record under `id`.
    pub fn into_record(self, id: RecordId) -> Record {
        Record {
            id,
            kind: self.kind,
            external_id: self.external_id,
            parent_id: self.parent_id,
            tenant_id: self.tenant_id,
            product_id: self.product_id,
            created_by: self.created_by,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            labels: self.labels,
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
        }
    }
}

impl Record {
    /// Validate the field-level constraints of a stored record.
    pub fn validate(&self) -> Result<(), String> {
        validate_fields(
            self.kind,
            &self.external_id,
            &self.title,
            self.priority,
            self.parent_id.is_some(),
        )
    }
}

fn validate_fields(
    kind: EntityKind,
    external_id: &str,
    title: &str,
    priority: u8,
    has_parent: bool,
) -> Result<(), String> {
    if external_id.trim().is_empty() {
        return Err("external id cannot be empty".to_string());
    }
    if title.trim().is_empty() {
        return Err("title cannot be empty".to_string());
    }
    if priority > MAX_PRIORITY {
        return Err(format!(
            "priority must be between {MIN_PRIORITY} and {MAX_PRIORITY}, got {priority}"
        ));
    }
    if kind == EntityKind::Epic && has_parent {
        return Err("epics cannot have a parent".to_string());
    }
    Ok(())
}
