//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use serde_json::{Value, json};
use std::path::Path;
use std::process::{Command, Output};
use trellis::domain::{Product, TenantId, User};
use trellis::pipeline::ImportRequest;
use trellis::storage::{RecordStore, StoreBackend, create_store};

pub const TENANT: &str = "acme";
pub const PRODUCT: &str = "PROD-1";
pub const USER: &str = "USER-1";

/// Run the trellis binary in `dir` with `TRELLIS_*` variables cleared.
pub fn run_trellis_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_trellis"))
        .args(args)
        .current_dir(dir)
        .env_remove("TRELLIS_TENANT")
        .env_remove("TRELLIS_PRODUCT")
        .env_remove("TRELLIS_USER")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute trellis binary")
}

/// Import request for the seeded tenant.
pub fn request() -> ImportRequest {
    ImportRequest::new(TENANT, PRODUCT, USER)
}

pub fn tenant() -> TenantId {
    TenantId::new(TENANT)
}

/// Insert the product and user an import needs.
pub async fn seed(store: &mut dyn RecordStore) {
    store
        .insert_product(Product {
            id: PRODUCT.to_string(),
            tenant_id: tenant(),
            name: "Storefront".to_string(),
        })
        .await
        .unwrap();
    store
        .insert_user(User {
            id: USER.to_string(),
            tenant_id: tenant(),
            name: "Importer".to_string(),
        })
        .await
        .unwrap();
}

/// An in-memory store with the seed context in place.
pub async fn seeded_store() -> Box<dyn RecordStore> {
    let mut store = create_store(StoreBackend::InMemory).await.unwrap();
    seed(store.as_mut()).await;
    store
}

/// One external issue as a JSON value.
pub fn issue(id: &str, issue_type: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Issue {id}"),
        "status": "open",
        "priority": 2,
        "issue_type": issue_type,
    })
}

/// `issue` with a parent-child edge to `parent`.
pub fn child(id: &str, issue_type: &str, parent: &str) -> Value {
    let mut value = issue(id, issue_type);
    value["dependencies"] = json!([
        { "issue_id": id, "depends_on_id": parent, "type": "parent-child" }
    ]);
    value
}

/// Render values as JSONL input.
pub fn jsonl(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| format!("{v}\n"))
        .collect::<String>()
}
