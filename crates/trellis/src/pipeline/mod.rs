//! The import pipeline.
//!
//! A run loads the seed context, reads and classifies the whole input, then
//! imports epics, features and tasks in three strictly ordered passes so that
//! every parent a record can point at has been resolved before the record is
//! seen. It finishes by reconciling the store against what it tracked.
//!
//! ```no_run
//! use trellis::pipeline::{ImportRequest, Pipeline};
//! use trellis::storage::{create_store, StoreBackend};
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let mut store = create_store(StoreBackend::Jsonl(".trellis/store.jsonl".into())).await?;
//!     let request = ImportRequest::new("acme", "PROD-1", "USER-1");
//!     let report = Pipeline::new(store.as_mut(), request)
//!         .run_path(Path::new("issues.jsonl"))
//!         .await?;
//!     println!("created {}", report.total_created());
//!     Ok(())
//! }
//! ```

mod stage;
pub mod writer;

pub use stage::{PipelineStage, StageTracker};

use crate::cancel::CancelToken;
use crate::domain::external::ExternalIssue;
use crate::domain::{EntityKind, SeedContext, TenantId};
use crate::error::{Error, Result, SeedKind};
use crate::hierarchy::{ParentDecision, resolve_parent};
use crate::identity::{self, IdentityMaps, Resolution};
use crate::report::{self, Imported, KindReport, MalformedLine, RunReport, SkipReason};
use crate::storage::RecordStore;
use crate::vocabulary::{map_priority, map_status};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use std::path::Path;
use tokio::io::AsyncRead;
use trellis_jsonl::JsonlReader;
use writer::ResolvedRecord;

/// Who and what an import writes as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    /// Tenant scoping every read and write
    pub tenant: TenantId,
    /// Product that must exist before anything is written
    pub product_id: String,
    /// User that must exist before anything is written
    pub user_id: String,
}

impl ImportRequest {
    /// Build a request.
    pub fn new(
        tenant: impl Into<String>,
        product_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant: TenantId::new(tenant),
            product_id: product_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// Input issues grouped by kind, input order preserved within each group.
#[derive(Debug, Default)]
struct Classified {
    epics: Vec<ExternalIssue>,
    features: Vec<ExternalIssue>,
    tasks: Vec<ExternalIssue>,
    unsupported: Vec<String>,
    malformed: Vec<MalformedLine>,
}

impl Classified {
    fn push(&mut self, issue: ExternalIssue) {
        match issue.kind() {
            Some(EntityKind::Epic) => self.epics.push(issue),
            Some(EntityKind::Feature) => self.features.push(issue),
            Some(EntityKind::Task) => self.tasks.push(issue),
            None => {
                tracing::info!(external_id = %issue.id, "Skipping unsupported issue type");
                self.unsupported.push(issue.id);
            }
        }
    }

    fn take(&mut self, kind: EntityKind) -> Vec<ExternalIssue> {
        std::mem::take(match kind {
            EntityKind::Epic => &mut self.epics,
            EntityKind::Feature => &mut self.features,
            EntityKind::Task => &mut self.tasks,
        })
    }
}

/// One import run against a store.
pub struct Pipeline<'a> {
    store: &'a mut dyn RecordStore,
    request: ImportRequest,
    cancel: CancelToken,
    imported_at: DateTime<Utc>,
    stage: StageTracker,
    identities: IdentityMaps,
}

impl std::fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("request", &self.request)
            .field("stage", &self.stage.current())
            .field("imported_at", &self.imported_at)
            .field("store", &"<dyn RecordStore>")
            .finish_non_exhaustive()
    }
}

impl<'a> Pipeline<'a> {
    /// Prepare a run. Nothing is read or written until [`run`](Self::run).
    pub fn new(store: &'a mut dyn RecordStore, request: ImportRequest) -> Self {
        Self {
            store,
            request,
            cancel: CancelToken::new(),
            imported_at: Utc::now(),
            stage: StageTracker::new(),
            identities: IdentityMaps::new(),
        }
    }

    /// Use `token` to stop the run between records.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Fix the timestamp used for defaulted record timestamps.
    #[must_use]
    pub fn with_import_time(mut self, imported_at: DateTime<Utc>) -> Self {
        self.imported_at = imported_at;
        self
    }

    /// Import the JSONL file at `path`.
    ///
    /// # Errors
    ///
    /// `Error::Input` if the file cannot be opened, plus everything
    /// [`run`](Self::run) returns.
    pub async fn run_path(self, path: &Path) -> Result<RunReport> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| Error::Input {
                path: path.to_path_buf(),
                source,
            })?;
        self.run(file).await
    }

    /// Import every issue read from `input`.
    ///
    /// Per-record problems end up in the returned report. A cancelled run
    /// still returns a report, with `cancelled` set.
    ///
    /// # Errors
    ///
    /// - `Error::SeedMissing` if the product or user is absent; nothing is
    ///   written
    /// - `Error::Jsonl` if the input cannot be read
    /// - store errors from the seed lookups or reconciliation
    pub async fn run<R>(mut self, input: R) -> Result<RunReport>
    where
        R: AsyncRead + Unpin,
    {
        let seed = self.load_seed().await?;
        self.stage.advance(PipelineStage::SeedLoaded)?;

        let mut classified = self.read_input(input).await?;

        let mut kinds = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            if !self.cancel.is_cancelled() {
                let issues = classified.take(kind);
                kinds.push(self.import_pass(&seed, kind, &issues).await);
            }
            self.stage.advance(PipelineStage::after_pass(kind))?;
        }

        let reconciliation =
            report::reconcile(&*self.store, &self.request.tenant, &self.identities).await?;
        self.stage.advance(PipelineStage::Reported)?;

        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            tracing::warn!("Import cancelled before completion");
        }
        self.stage.advance(PipelineStage::Done)?;

        Ok(RunReport {
            tenant: self.request.tenant,
            imported_at: self.imported_at,
            malformed_lines: classified.malformed,
            unsupported: classified.unsupported,
            kinds,
            reconciliation,
            cancelled,
        })
    }

    async fn load_seed(&self) -> Result<SeedContext> {
        let tenant = &self.request.tenant;

        let product = self
            .store
            .find_product(tenant, &self.request.product_id)
            .await?
            .ok_or_else(|| Error::SeedMissing {
                kind: SeedKind::Product,
                id: self.request.product_id.clone(),
                tenant: tenant.clone(),
            })?;
        let user = self
            .store
            .find_user(tenant, &self.request.user_id)
            .await?
            .ok_or_else(|| Error::SeedMissing {
                kind: SeedKind::User,
                id: self.request.user_id.clone(),
                tenant: tenant.clone(),
            })?;

        tracing::debug!(%tenant, product = %product.id, user = %user.id, "Seed context loaded");
        Ok(SeedContext {
            tenant_id: tenant.clone(),
            product,
            user,
        })
    }

    /// Read the whole input and group it by kind.
    async fn read_input<R>(&self, input: R) -> Result<Classified>
    where
        R: AsyncRead + Unpin,
    {
        let (stream, warnings) = JsonlReader::new(input).stream_resilient::<ExternalIssue>();
        let mut stream = std::pin::pin!(stream);
        let mut classified = Classified::default();

        while let Some(issue) = stream.try_next().await? {
            classified.push(issue);
            if self.cancel.is_cancelled() {
                break;
            }
        }

        classified.malformed = warnings
            .into_warnings()
            .into_iter()
            .map(MalformedLine::from)
            .collect();

        tracing::info!(
            epics = classified.epics.len(),
            features = classified.features.len(),
            tasks = classified.tasks.len(),
            unsupported = classified.unsupported.len(),
            malformed = classified.malformed.len(),
            "Input read"
        );
        Ok(classified)
    }

    async fn import_pass(
        &mut self,
        seed: &SeedContext,
        kind: EntityKind,
        issues: &[ExternalIssue],
    ) -> KindReport {
        let mut report = KindReport::new(kind);

        for issue in issues {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    kind = %kind,
                    remaining = issues.len() - report.outcomes.len(),
                    "Stopping pass"
                );
                break;
            }
            let result = self.import_one(seed, kind, issue).await;
            if let Err(reason) = &result {
                if !reason.is_failure() {
                    tracing::warn!(kind = %kind, external_id = %issue.id, %reason, "Skipped");
                }
            }
            report.push(&issue.id, result);
        }

        let summary = report.summary();
        tracing::info!(
            kind = %kind,
            created = summary.created,
            reused = summary.reused,
            skipped = summary.skipped,
            failed = summary.failed,
            "Pass complete"
        );
        report
    }

    async fn import_one(
        &mut self,
        seed: &SeedContext,
        kind: EntityKind,
        issue: &ExternalIssue,
    ) -> std::result::Result<Imported, SkipReason> {
        let resolution = identity::resolve(&*self.store, &seed.tenant_id, kind, &issue.id)
            .await
            .map_err(|e| {
                tracing::warn!(kind = %kind, external_id = %issue.id, error = %e, "Lookup failed");
                SkipReason::LookupFailure {
                    message: e.to_string(),
                }
            })?;

        if let Resolution::Existing(id) = resolution {
            tracing::info!(kind = %kind, external_id = %issue.id, %id, "Reused");
            self.identities.get_mut(kind).register(&issue.id, id.clone());
            return Ok(Imported::reused(id));
        }

        if issue.title.trim().is_empty() {
            return Err(SkipReason::InvalidRecord {
                reason: "title is blank".to_string(),
            });
        }
        let priority = map_priority(&issue.priority)
            .map_err(|e| SkipReason::UnresolvedPriority { value: e.value })?;
        let status = map_status(&issue.status, kind);

        let decision = resolve_parent(issue, kind, &self.identities);
        let parent = match &decision {
            ParentDecision::Parent { id, source } => Some((id, *source)),
            ParentDecision::Root => None,
            ParentDecision::Skip => return Err(SkipReason::UnresolvedParent),
        };

        let resolved = ResolvedRecord {
            kind,
            issue,
            parent,
            status,
            priority,
        };
        let imported = writer::create(&mut *self.store, seed, self.imported_at, resolved).await?;
        self.identities
            .get_mut(kind)
            .register(&issue.id, imported.internal_id.clone());
        Ok(imported)
    }
}
