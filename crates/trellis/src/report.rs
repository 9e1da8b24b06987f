//! Per-record outcomes and the end-of-run report.
//!
//! Every record the pipeline touches produces a `Result<Imported, SkipReason>`.
//! Summary counts are a fold over those results, and the reconciliation step
//! checks them against what the store actually holds afterwards.

use crate::domain::{EntityKind, RecordId, TenantId};
use crate::error::Result;
use crate::hierarchy::ParentSource;
use crate::identity::IdentityMaps;
use crate::storage::RecordStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use trellis_jsonl::Warning;

/// Whether a record was written this run or already existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Inserted by this run
    Created,
    /// Found by external id and left untouched
    Reused,
}

/// A record that made it into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Imported {
    /// Internal id of the record
    pub internal_id: RecordId,
    /// Created or reused
    pub disposition: Disposition,
    /// Parent assigned at creation; `None` for reused records and roots
    pub parent: Option<RecordId>,
    /// How the parent was chosen
    pub parent_source: Option<ParentSource>,
}

impl Imported {
    /// A record that already existed.
    pub fn reused(internal_id: RecordId) -> Self {
        Self {
            internal_id,
            disposition: Disposition::Reused,
            parent: None,
            parent_source: None,
        }
    }
}

/// Why a record was not imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Priority was neither an in-range integer nor `P<digit>`.
    UnresolvedPriority {
        /// The value from the input
        value: String,
    },
    /// A feature with no parent edge and no epic to fall back to.
    UnresolvedParent,
    /// The issue carries a value no internal record can hold.
    InvalidRecord {
        /// What is wrong with the issue
        reason: String,
    },
    /// The store rejected the insert.
    WriteFailure {
        /// Store error message
        message: String,
    },
    /// The identity lookup failed.
    LookupFailure {
        /// Store error message
        message: String,
    },
}

impl SkipReason {
    /// Storage failures count as `failed`; data problems count as `skipped`.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SkipReason::WriteFailure { .. } | SkipReason::LookupFailure { .. }
        )
    }

    /// Short machine-readable name.
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::UnresolvedPriority { .. } => "unresolved_priority",
            SkipReason::UnresolvedParent => "unresolved_parent",
            SkipReason::InvalidRecord { .. } => "invalid_record",
            SkipReason::WriteFailure { .. } => "write_failure",
            SkipReason::LookupFailure { .. } => "lookup_failure",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnresolvedPriority { value } => write!(f, "unresolved priority {value}"),
            SkipReason::UnresolvedParent => f.write_str("no epic to attach to"),
            SkipReason::InvalidRecord { reason } => write!(f, "invalid record: {reason}"),
            SkipReason::WriteFailure { message } => write!(f, "write failed: {message}"),
            SkipReason::LookupFailure { message } => write!(f, "lookup failed: {message}"),
        }
    }
}

/// Outcome for one external issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// External id of the issue
    pub external_id: String,
    /// What happened to it
    pub result: std::result::Result<Imported, SkipReason>,
}

/// Counts for one record kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindSummary {
    /// Records inserted
    pub created: usize,
    /// Records that already existed
    pub reused: usize,
    /// Records not imported because of their data
    pub skipped: usize,
    /// Records not imported because the store failed
    pub failed: usize,
}

/// All outcomes for one record kind, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindReport {
    /// Record kind
    pub kind: EntityKind,
    /// Outcomes in processing order
    pub outcomes: Vec<RecordOutcome>,
}

impl KindReport {
    /// Empty report for `kind`.
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            outcomes: Vec::new(),
        }
    }

    /// Record an outcome.
    pub fn push(&mut self, external_id: &str, result: std::result::Result<Imported, SkipReason>) {
        self.outcomes.push(RecordOutcome {
            external_id: external_id.to_string(),
            result,
        });
    }

    /// Fold the outcomes into counts.
    pub fn summary(&self) -> KindSummary {
        self.outcomes
            .iter()
            .fold(KindSummary::default(), |mut acc, outcome| {
                match &outcome.result {
                    Ok(imported) => match imported.disposition {
                        Disposition::Created => acc.created += 1,
                        Disposition::Reused => acc.reused += 1,
                    },
                    Err(reason) if reason.is_failure() => acc.failed += 1,
                    Err(_) => acc.skipped += 1,
                }
                acc
            })
    }
}

/// Store count versus run-local count for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Record kind
    pub kind: EntityKind,
    /// Distinct internal ids the run created or reused
    pub tracked: usize,
    /// Records of this kind the store holds for the tenant
    pub stored: usize,
}

impl Reconciliation {
    /// `stored - tracked`. Positive when the store holds records this run did
    /// not see.
    pub fn drift(&self) -> i64 {
        let stored = i64::try_from(self.stored).unwrap_or(i64::MAX);
        let tracked = i64::try_from(self.tracked).unwrap_or(i64::MAX);
        stored - tracked
    }

    /// Returns true if the counts agree.
    pub fn is_consistent(&self) -> bool {
        self.stored == self.tracked
    }
}

/// Re-read the store and compare each kind's count to the identity maps.
///
/// A mismatch is logged and returned, never raised.
///
/// # Errors
///
/// Propagates store read errors.
pub async fn reconcile(
    store: &dyn RecordStore,
    tenant: &TenantId,
    identities: &IdentityMaps,
) -> Result<Vec<Reconciliation>> {
    let mut checks = Vec::with_capacity(EntityKind::ALL.len());
    for kind in EntityKind::ALL {
        let stored = store.list_by_tenant(tenant, kind).await?.len();
        let check = Reconciliation {
            kind,
            tracked: identities.distinct_internal_ids(kind),
            stored,
        };
        if check.is_consistent() {
            tracing::debug!(kind = %kind, count = stored, "Reconciliation ok");
        } else {
            tracing::warn!(
                kind = %kind,
                tracked = check.tracked,
                stored = check.stored,
                drift = check.drift(),
                "Store count does not match records tracked by this run"
            );
        }
        checks.push(check);
    }
    Ok(checks)
}

/// A malformed input line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedLine {
    /// 1-based line number
    pub line_number: usize,
    /// What was wrong with it
    pub error: String,
}

impl From<Warning> for MalformedLine {
    fn from(warning: Warning) -> Self {
        let line_number = warning.line_number();
        let error = match warning {
            Warning::MalformedJson { error, .. } => error,
            Warning::SkippedLine { reason, .. } => reason,
        };
        Self { line_number, error }
    }
}

/// Everything that happened during one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Tenant the run wrote to
    pub tenant: TenantId,
    /// Timestamp used for defaulted record timestamps
    pub imported_at: DateTime<Utc>,
    /// Input lines that could not be parsed
    pub malformed_lines: Vec<MalformedLine>,
    /// External ids of issues with an unsupported type
    pub unsupported: Vec<String>,
    /// Outcomes per kind, in import order
    pub kinds: Vec<KindReport>,
    /// Post-run count checks
    pub reconciliation: Vec<Reconciliation>,
    /// Whether the operator stopped the run early
    pub cancelled: bool,
}

impl RunReport {
    /// Outcomes for `kind`, if that pass ran.
    pub fn kind(&self, kind: EntityKind) -> Option<&KindReport> {
        self.kinds.iter().find(|k| k.kind == kind)
    }

    /// Counts for `kind`; all zero if the pass did not run.
    pub fn kind_summary(&self, kind: EntityKind) -> KindSummary {
        self.kind(kind)
            .map(KindReport::summary)
            .unwrap_or_default()
    }

    /// Records created across all kinds.
    pub fn total_created(&self) -> usize {
        EntityKind::ALL
            .iter()
            .map(|&kind| self.kind_summary(kind).created)
            .sum()
    }

    /// Returns true if any kind's store count disagrees with the run.
    pub fn has_drift(&self) -> bool {
        self.reconciliation.iter().any(|r| !r.is_consistent())
    }

    /// Serializable view of the report.
    pub fn summary(&self) -> RunSummary {
        let kinds = EntityKind::ALL
            .iter()
            .map(|&kind| KindTotals {
                kind,
                counts: self.kind_summary(kind),
            })
            .collect();

        let skipped = self
            .kinds
            .iter()
            .flat_map(|report| {
                report.outcomes.iter().filter_map(move |outcome| {
                    outcome.result.as_ref().err().map(|reason| SkippedRecord {
                        kind: report.kind,
                        external_id: outcome.external_id.clone(),
                        reason: reason.code(),
                        detail: reason.to_string(),
                    })
                })
            })
            .collect();

        RunSummary {
            tenant: self.tenant.clone(),
            imported_at: self.imported_at,
            cancelled: self.cancelled,
            kinds,
            skipped,
            malformed_lines: self.malformed_lines.clone(),
            unsupported: self.unsupported.clone(),
            reconciliation: self.reconciliation.clone(),
        }
    }
}

/// Counts for one kind, tagged with the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindTotals {
    /// Record kind
    pub kind: EntityKind,
    /// Counts
    #[serde(flatten)]
    pub counts: KindSummary,
}

/// A record that was not imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    /// Record kind
    pub kind: EntityKind,
    /// External id
    pub external_id: String,
    /// Machine-readable reason
    pub reason: &'static str,
    /// Human-readable reason
    pub detail: String,
}

/// The report in the shape printed by `--json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Tenant the run wrote to
    pub tenant: TenantId,
    /// Import timestamp
    pub imported_at: DateTime<Utc>,
    /// Whether the run was cancelled
    pub cancelled: bool,
    /// Counts per kind
    pub kinds: Vec<KindTotals>,
    /// Records not imported
    pub skipped: Vec<SkippedRecord>,
    /// Malformed input lines
    pub malformed_lines: Vec<MalformedLine>,
    /// External ids with unsupported issue types
    pub unsupported: Vec<String>,
    /// Post-run count checks
    pub reconciliation: Vec<Reconciliation>,
}
