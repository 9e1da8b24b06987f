//! End-to-end tests of the import pipeline against the in-memory store.

use async_trait::async_trait;
use rstest::rstest;
use serde_json::json;
use trellis::cancel::CancelToken;
use trellis::domain::{EntityKind, InternalStatus, NewRecord, Product, Record, TenantId, User};
use trellis::error::{Error, Result, SeedKind};
use trellis::hierarchy::ParentSource;
use trellis::pipeline::Pipeline;
use trellis::report::{Disposition, Imported, RunReport, SkipReason};
use trellis::storage::{RecordStore, StoreBackend, create_store};

mod common;
use common::{child, issue, jsonl, request, seeded_store, tenant};

async fn run(store: &mut dyn RecordStore, input: &str) -> RunReport {
    Pipeline::new(store, request())
        .run(input.as_bytes())
        .await
        .unwrap()
}

async fn stored(store: &dyn RecordStore, kind: EntityKind) -> Vec<Record> {
    store.list_by_tenant(&tenant(), kind).await.unwrap()
}

fn imported<'a>(report: &'a RunReport, kind: EntityKind, external_id: &str) -> &'a Imported {
    report
        .kind(kind)
        .unwrap()
        .outcomes
        .iter()
        .find(|o| o.external_id == external_id)
        .unwrap()
        .result
        .as_ref()
        .unwrap()
}

fn skip_reason<'a>(report: &'a RunReport, kind: EntityKind, external_id: &str) -> &'a SkipReason {
    report
        .kind(kind)
        .unwrap()
        .outcomes
        .iter()
        .find(|o| o.external_id == external_id)
        .unwrap()
        .result
        .as_ref()
        .unwrap_err()
}

fn hierarchy_input() -> String {
    jsonl(&[
        child("bd-3", "task", "bd-2"),
        child("bd-2", "feature", "bd-1"),
        issue("bd-1", "epic"),
    ])
}

#[tokio::test]
async fn explicit_edges_build_the_hierarchy_regardless_of_input_order() {
    let mut store = seeded_store().await;

    let report = run(store.as_mut(), &hierarchy_input()).await;

    let epic = imported(&report, EntityKind::Epic, "bd-1");
    let feature = imported(&report, EntityKind::Feature, "bd-2");
    let task = imported(&report, EntityKind::Task, "bd-3");
    assert_eq!(feature.parent.as_ref(), Some(&epic.internal_id));
    assert_eq!(feature.parent_source, Some(ParentSource::Explicit));
    assert_eq!(task.parent.as_ref(), Some(&feature.internal_id));

    let features = stored(store.as_ref(), EntityKind::Feature).await;
    assert_eq!(features.len(), 1);
    assert_eq!(features[0].parent_id.as_ref(), Some(&epic.internal_id));
    assert_eq!(features[0].product_id, common::PRODUCT);
    assert_eq!(features[0].created_by, common::USER);
    assert!(!report.has_drift());
}

#[tokio::test]
async fn second_run_reuses_everything() {
    let mut store = seeded_store().await;
    let input = hierarchy_input();

    let first = run(store.as_mut(), &input).await;
    let second = run(store.as_mut(), &input).await;

    assert_eq!(first.total_created(), 3);
    assert_eq!(second.total_created(), 0);
    for kind in EntityKind::ALL {
        assert_eq!(second.kind_summary(kind).reused, 1);
        assert_eq!(stored(store.as_ref(), kind).await.len(), 1);
    }
    assert_eq!(
        imported(&second, EntityKind::Epic, "bd-1").internal_id,
        imported(&first, EntityKind::Epic, "bd-1").internal_id
    );
    assert_eq!(
        imported(&second, EntityKind::Task, "bd-3").disposition,
        Disposition::Reused
    );
    assert!(!second.has_drift());
}

#[tokio::test]
async fn feature_falls_back_to_first_epic_in_input_order() {
    let mut store = seeded_store().await;
    let input = jsonl(&[
        issue("bd-10", "epic"),
        issue("bd-11", "epic"),
        child("bd-20", "feature", "bd-999"),
        issue("bd-21", "feature"),
    ]);

    let report = run(store.as_mut(), &input).await;

    let first_epic = &imported(&report, EntityKind::Epic, "bd-10").internal_id;
    for external_id in ["bd-20", "bd-21"] {
        let feature = imported(&report, EntityKind::Feature, external_id);
        assert_eq!(feature.parent.as_ref(), Some(first_epic));
        assert_eq!(feature.parent_source, Some(ParentSource::Fallback));
    }
}

#[tokio::test]
async fn feature_without_any_epic_is_skipped() {
    let mut store = seeded_store().await;
    let input = jsonl(&[issue("bd-1", "feature"), child("bd-2", "task", "bd-1")]);

    let report = run(store.as_mut(), &input).await;

    assert_eq!(
        skip_reason(&report, EntityKind::Feature, "bd-1"),
        &SkipReason::UnresolvedParent
    );
    assert_eq!(report.kind_summary(EntityKind::Feature).skipped, 1);
    assert!(stored(store.as_ref(), EntityKind::Feature).await.is_empty());

    // The task's parent was never imported, and there is no feature to fall
    // back to.
    let task = imported(&report, EntityKind::Task, "bd-2");
    assert!(task.parent.is_none());
}

#[tokio::test]
async fn task_without_features_has_no_parent() {
    let mut store = seeded_store().await;
    let input = jsonl(&[issue("bd-1", "epic"), issue("bd-2", "task")]);

    let report = run(store.as_mut(), &input).await;

    let task = imported(&report, EntityKind::Task, "bd-2");
    assert!(task.parent.is_none());
    assert!(task.parent_source.is_none());
    let tasks = stored(store.as_ref(), EntityKind::Task).await;
    assert!(tasks[0].parent_id.is_none());
}

#[tokio::test]
async fn task_falls_back_to_first_feature() {
    let mut store = seeded_store().await;
    let input = jsonl(&[
        issue("bd-1", "epic"),
        issue("bd-2", "feature"),
        issue("bd-3", "feature"),
        issue("bd-4", "task"),
    ]);

    let report = run(store.as_mut(), &input).await;

    let feature = imported(&report, EntityKind::Feature, "bd-2");
    let task = imported(&report, EntityKind::Task, "bd-4");
    assert_eq!(task.parent.as_ref(), Some(&feature.internal_id));
    assert_eq!(task.parent_source, Some(ParentSource::Fallback));
}

#[tokio::test]
async fn malformed_line_is_skipped_and_counted() {
    let mut store = seeded_store().await;
    let input = format!(
        "{}{{not json\n\n{}",
        jsonl(&[issue("bd-1", "epic")]),
        jsonl(&[issue("bd-2", "task")])
    );

    let report = run(store.as_mut(), &input).await;

    assert_eq!(report.malformed_lines.len(), 1);
    assert_eq!(report.malformed_lines[0].line_number, 2);
    assert_eq!(report.total_created(), 2);
}

#[tokio::test]
async fn unsupported_types_are_listed_not_imported() {
    let mut store = seeded_store().await;
    let input = jsonl(&[issue("bd-1", "bug"), issue("bd-2", "chore"), issue("bd-3", "epic")]);

    let report = run(store.as_mut(), &input).await;

    assert_eq!(report.unsupported, vec!["bd-1".to_string(), "bd-2".to_string()]);
    assert_eq!(report.total_created(), 1);
}

#[rstest]
#[case::number(json!(7))]
#[case::bare_digit_string(json!("2"))]
#[case::word(json!("high"))]
#[tokio::test]
async fn unresolved_priority_skips_the_record(#[case] priority: serde_json::Value) {
    let mut store = seeded_store().await;
    let mut bad = issue("bd-2", "epic");
    bad["priority"] = priority;
    let input = jsonl(&[issue("bd-1", "epic"), bad]);

    let report = run(store.as_mut(), &input).await;

    assert!(matches!(
        skip_reason(&report, EntityKind::Epic, "bd-2"),
        SkipReason::UnresolvedPriority { .. }
    ));
    assert_eq!(stored(store.as_ref(), EntityKind::Epic).await.len(), 1);
}

#[tokio::test]
async fn vocabulary_is_applied_on_create() {
    let mut store = seeded_store().await;
    let mut epic = issue("bd-1", "epic");
    epic["status"] = json!("Resolved");
    epic["priority"] = json!("p1");
    epic["labels"] = json!(["backend", "backend", "checkout"]);
    let mut task = issue("bd-2", "task");
    task["status"] = json!("some_unknown_value");

    run(store.as_mut(), &jsonl(&[epic, task])).await;

    let epics = stored(store.as_ref(), EntityKind::Epic).await;
    assert_eq!(epics[0].status, InternalStatus::Completed);
    assert_eq!(epics[0].priority, 1);
    assert!(epics[0].closed_at.is_some());
    assert_eq!(epics[0].labels.len(), 2);
    let tasks = stored(store.as_ref(), EntityKind::Task).await;
    assert_eq!(tasks[0].status, InternalStatus::Backlog);
    assert!(tasks[0].closed_at.is_none());
}

#[tokio::test]
async fn write_failure_does_not_abort_the_batch() {
    let mut store = ScriptedStore::new(seeded_store().await);
    store.reject = Some("bd-2");
    let input = jsonl(&[
        issue("bd-1", "epic"),
        issue("bd-2", "epic"),
        issue("bd-3", "epic"),
    ]);

    let report = run(&mut store, &input).await;

    assert!(matches!(
        skip_reason(&report, EntityKind::Epic, "bd-2"),
        SkipReason::WriteFailure { .. }
    ));
    let summary = report.kind_summary(EntityKind::Epic);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.failed, 1);
    assert!(!report.has_drift());
}

#[tokio::test]
async fn long_titles_are_imported_as_is() {
    let mut store = seeded_store().await;
    let title = "Checkout ".repeat(200);
    let mut epic = issue("bd-1", "epic");
    epic["title"] = json!(title);
    let mut feature = child("bd-2", "feature", "bd-1");
    feature["title"] = json!(title);

    let report = run(store.as_mut(), &jsonl(&[epic, feature])).await;

    assert_eq!(report.kind_summary(EntityKind::Epic).created, 1);
    let feature = imported(&report, EntityKind::Feature, "bd-2");
    assert_eq!(feature.parent_source, Some(ParentSource::Explicit));
    let epics = stored(store.as_ref(), EntityKind::Epic).await;
    assert_eq!(epics[0].title, title);
}

#[rstest]
#[case::empty("")]
#[case::whitespace("  \t ")]
#[tokio::test]
async fn blank_title_is_skipped_not_failed(#[case] title: &str) {
    let mut store = seeded_store().await;
    let mut task = issue("bd-2", "task");
    task["title"] = json!(title);
    let input = jsonl(&[issue("bd-1", "task"), task, issue("bd-3", "task")]);

    let report = run(store.as_mut(), &input).await;

    assert!(matches!(
        skip_reason(&report, EntityKind::Task, "bd-2"),
        SkipReason::InvalidRecord { .. }
    ));
    let summary = report.kind_summary(EntityKind::Task);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(report.summary().skipped[0].reason, "invalid_record");
    assert_eq!(stored(store.as_ref(), EntityKind::Task).await.len(), 2);
}

#[rstest]
#[case::product(SeedKind::Product)]
#[case::user(SeedKind::User)]
#[tokio::test]
async fn missing_seed_aborts_before_any_write(#[case] missing: SeedKind) {
    let mut store = create_store(StoreBackend::InMemory).await.unwrap();
    if missing != SeedKind::Product {
        store
            .insert_product(Product {
                id: common::PRODUCT.to_string(),
                tenant_id: tenant(),
                name: "Storefront".to_string(),
            })
            .await
            .unwrap();
    }
    if missing != SeedKind::User {
        store
            .insert_user(User {
                id: common::USER.to_string(),
                tenant_id: tenant(),
                name: "Importer".to_string(),
            })
            .await
            .unwrap();
    }

    let err = Pipeline::new(store.as_mut(), request())
        .run(hierarchy_input().as_bytes())
        .await
        .unwrap_err();

    match err {
        Error::SeedMissing { kind, tenant, .. } => {
            assert_eq!(kind, missing);
            assert_eq!(tenant.as_str(), common::TENANT);
        }
        other => panic!("expected SeedMissing, got {other:?}"),
    }
    for kind in EntityKind::ALL {
        assert!(stored(store.as_ref(), kind).await.is_empty());
    }
}

#[tokio::test]
async fn seed_of_another_tenant_does_not_count() {
    let mut store = seeded_store().await;

    let err = Pipeline::new(
        store.as_mut(),
        trellis::pipeline::ImportRequest::new("globex", common::PRODUCT, common::USER),
    )
    .run(hierarchy_input().as_bytes())
    .await
    .unwrap_err();

    assert!(matches!(err, Error::SeedMissing { kind: SeedKind::Product, .. }));
}

#[tokio::test]
async fn records_outside_the_run_show_up_as_drift() {
    let mut store = seeded_store().await;
    run(store.as_mut(), &jsonl(&[issue("bd-1", "epic")])).await;

    let report = run(store.as_mut(), &jsonl(&[issue("bd-2", "epic")])).await;

    let epics = report
        .reconciliation
        .iter()
        .find(|r| r.kind == EntityKind::Epic)
        .unwrap();
    assert_eq!(epics.tracked, 1);
    assert_eq!(epics.stored, 2);
    assert_eq!(epics.drift(), 1);
    assert!(report.has_drift());
}

#[tokio::test]
async fn duplicate_external_id_in_input_is_reused() {
    let mut store = seeded_store().await;
    let input = jsonl(&[issue("bd-1", "epic"), issue("bd-1", "epic")]);

    let report = run(store.as_mut(), &input).await;

    let summary = report.kind_summary(EntityKind::Epic);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.reused, 1);
    assert!(!report.has_drift());
}

/// Delegates to an inner store, optionally rejecting one external id and
/// cancelling a token after a number of successful inserts.
struct ScriptedStore {
    inner: Box<dyn RecordStore>,
    token: Option<CancelToken>,
    cancel_after: usize,
    reject: Option<&'static str>,
}

impl ScriptedStore {
    fn new(inner: Box<dyn RecordStore>) -> Self {
        Self {
            inner,
            token: None,
            cancel_after: 0,
            reject: None,
        }
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    async fn find_by_external_id(
        &self,
        tenant: &TenantId,
        kind: EntityKind,
        external_id: &str,
    ) -> Result<Option<Record>> {
        self.inner.find_by_external_id(tenant, kind, external_id).await
    }

    async fn insert(&mut self, record: NewRecord) -> Result<Record> {
        if self.reject == Some(record.external_id.as_str()) {
            return Err(Error::Storage("disk full".to_string()));
        }
        let record = self.inner.insert(record).await?;
        if let Some(token) = &self.token {
            self.cancel_after = self.cancel_after.saturating_sub(1);
            if self.cancel_after == 0 {
                token.cancel();
            }
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
        self.inner.insert_product(product).await
    }

    async fn insert_user(&mut self, user: User) -> Result<()> {
        self.inner.insert_user(user).await
    }

    async fn save(&self) -> Result<()> {
        self.inner.save().await
    }
}

#[tokio::test]
async fn cancellation_stops_between_records() {
    let token = CancelToken::new();
    let mut store = ScriptedStore::new(seeded_store().await);
    store.token = Some(token.clone());
    store.cancel_after = 2;
    let input = jsonl(&[
        issue("bd-1", "epic"),
        issue("bd-2", "epic"),
        issue("bd-3", "epic"),
        issue("bd-4", "feature"),
        issue("bd-5", "task"),
    ]);

    let report = Pipeline::new(&mut store, request())
        .with_cancel_token(token)
        .run(input.as_bytes())
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.kind_summary(EntityKind::Epic).created, 2);
    assert!(report.kind(EntityKind::Feature).is_none());
    assert_eq!(stored(&store, EntityKind::Epic).await.len(), 2);
    assert!(stored(&store, EntityKind::Feature).await.is_empty());
    assert!(!report.has_drift());
}

#[tokio::test]
async fn cancelled_before_start_writes_nothing() {
    let mut store = seeded_store().await;
    let token = CancelToken::new();
    token.cancel();

    let report = Pipeline::new(store.as_mut(), request())
        .with_cancel_token(token)
        .run(hierarchy_input().as_bytes())
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.total_created(), 0);
    for kind in EntityKind::ALL {
        assert!(stored(store.as_ref(), kind).await.is_empty());
    }
}
