//! Implementation of the `init` command.
//!
//! Creates `.trellis/config.yaml` and a store file holding the seed product
//! and user that imports will be written against.

use crate::config::{
    CONFIG_FILE_NAME, TRELLIS_DIR_NAME, TrellisConfig, default_store_path, validate_id,
};
use crate::domain::{Product, TenantId, User};
use crate::error::{ConfigError, Result};
use crate::storage::{JsonlBackedStore, RecordStore};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Name of the gitignore file within .trellis
pub const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// What to seed a new trellis directory with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOptions {
    /// Tenant id
    pub tenant: String,
    /// Product id
    pub product_id: String,
    /// Product display name; defaults to the id
    pub product_name: Option<String>,
    /// User id
    pub user_id: String,
    /// User display name; defaults to the id
    pub user_name: Option<String>,
    /// Store file relative to `base_dir`; defaults to `.trellis/store.jsonl`
    pub store: Option<PathBuf>,
}

/// Result of the init command
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created trellis directory
    pub trellis_dir: PathBuf,
    /// Path to the created config file
    pub config_file: PathBuf,
    /// Path to the seeded store file
    pub store_file: PathBuf,
    /// The seeded tenant
    pub tenant: TenantId,
}

/// Initialize trellis in `base_dir`.
///
/// # Errors
///
/// - `ConfigError::AlreadyInitialized` if `.trellis/` already exists
/// - `ConfigError::Invalid` if an id is malformed
/// - IO errors from creating the files
pub async fn init(base_dir: &Path, options: InitOptions) -> Result<InitResult> {
    let tenant = TenantId::new(validate_id("tenant", &options.tenant)?);
    let product_id = validate_id("product", &options.product_id)?;
    let user_id = validate_id("user", &options.user_id)?;

    let trellis_dir = base_dir.join(TRELLIS_DIR_NAME);
    if fs::try_exists(&trellis_dir).await? {
        return Err(ConfigError::AlreadyInitialized(base_dir.to_path_buf()).into());
    }
    fs::create_dir_all(&trellis_dir).await?;

    let config_file = trellis_dir.join(CONFIG_FILE_NAME);
    let config = TrellisConfig {
        tenant: Some(tenant.to_string()),
        product: Some(product_id.clone()),
        user: Some(user_id.clone()),
        store: options.store.clone(),
    };
    config.save(&config_file).await?;

    fs::write(
        trellis_dir.join(GITIGNORE_FILE_NAME),
        "# Temporary files left by interrupted store compaction\n*.tmp\n",
    )
    .await?;

    let store_file = options
        .store
        .map_or_else(|| default_store_path(base_dir), |path| base_dir.join(path));
    let (mut store, _) = JsonlBackedStore::open(&store_file).await?;
    store
        .insert_product(Product {
            name: options.product_name.unwrap_or_else(|| product_id.clone()),
            id: product_id,
            tenant_id: tenant.clone(),
        })
        .await?;
    store
        .insert_user(User {
            name: options.user_name.unwrap_or_else(|| user_id.clone()),
            id: user_id,
            tenant_id: tenant.clone(),
        })
        .await?;

    tracing::debug!(path = %store_file.display(), "Seeded store");

    Ok(InitResult {
        trellis_dir,
        config_file,
        store_file,
        tenant,
    })
}
