//! Records as they arrive from the external tracker.
//!
//! One [`ExternalIssue`] per input line. Fields the pipeline has no use for
//! (assignee, notes, design, ...) are ignored by serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::EntityKind;

/// Dependency type that carries hierarchy information.
pub const PARENT_CHILD: &str = "parent-child";

/// An issue exported by the external tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalIssue {
    /// Identifier in the external system
    pub id: String,

    /// Issue title
    pub title: String,

    /// Issue description
    #[serde(default)]
    pub description: Option<String>,

    /// Status in the external vocabulary
    pub status: String,

    /// Priority, numeric or `P<digit>`
    pub priority: ExternalPriority,

    /// Type of the issue in the external tracker
    pub issue_type: ExternalIssueType,

    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Last update timestamp
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Closed timestamp
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,

    /// Dependency edges, in source order
    #[serde(default)]
    pub dependencies: Option<Vec<ExternalDependency>>,

    /// Labels
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

impl ExternalIssue {
    /// The internal kind this issue is imported as, if any.
    pub fn kind(&self) -> Option<EntityKind> {
        self.issue_type.kind()
    }

    /// Dependency edges, empty when the field was absent.
    pub fn dependencies(&self) -> &[ExternalDependency] {
        self.dependencies.as_deref().unwrap_or_default()
    }
}

/// Priority as the external tracker writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalPriority {
    /// A bare integer, e.g. `2`
    Number(i64),
    /// A string, expected to look like `P2`
    Text(String),
}

impl fmt::Display for ExternalPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalPriority::Number(n) => write!(f, "{n}"),
            ExternalPriority::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// External issue types. Anything other than the three supported types
/// deserializes to [`ExternalIssueType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalIssueType {
    /// Imported as an epic
    Epic,
    /// Imported as a feature
    Feature,
    /// Imported as a task
    Task,
    /// Bugs, chores and anything else; parsed but not imported
    #[serde(other)]
    Other,
}

impl ExternalIssueType {
    /// The internal kind for this type, or `None` for unsupported types.
    pub fn kind(self) -> Option<EntityKind> {
        match self {
            ExternalIssueType::Epic => Some(EntityKind::Epic),
            ExternalIssueType::Feature => Some(EntityKind::Feature),
            ExternalIssueType::Task => Some(EntityKind::Task),
            ExternalIssueType::Other => None,
        }
    }
}

/// A dependency edge attached to an external issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalDependency {
    /// The issue the edge starts from. Usually the owning issue.
    #[serde(default)]
    pub issue_id: Option<String>,

    /// The issue depended on; the parent for `parent-child` edges
    pub depends_on_id: String,

    /// Edge type, e.g. `parent-child` or `blocks`
    #[serde(rename = "type")]
    pub dep_type: String,
}

impl ExternalDependency {
    /// Returns true if this edge is a parent-child edge owned by `owner_id`.
    ///
    /// Edges without an `issue_id` are treated as owned by the issue they are
    /// attached to.
    pub fn is_parent_edge_of(&self, owner_id: &str) -> bool {
        self.dep_type == PARENT_CHILD
            && self.issue_id.as_deref().is_none_or(|id| id == owner_id)
    }
}
