//! Configuration for trellis.
//!
//! Settings come from three layers, highest precedence first: command-line
//! flags, `TRELLIS_*` environment variables (both handled by clap), and the
//! YAML file at `.trellis/config.yaml`. The file is found by walking up from
//! the working directory.
//!
//! ```yaml
//! tenant: acme
//! product: PROD-1
//! user: USER-1
//! store: .trellis/store.jsonl
//! ```

use crate::error::{ConfigError, Result};
use crate::pipeline::ImportRequest;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Name of the trellis directory
pub const TRELLIS_DIR_NAME: &str = ".trellis";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Name of the store file
pub const STORE_FILE_NAME: &str = "store.jsonl";

/// Maximum length of a tenant, product, or user id
pub const MAX_ID_LENGTH: usize = 64;

/// Maximum directory depth to traverse when searching for the trellis root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Contents of `.trellis/config.yaml`. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrellisConfig {
    /// Tenant to import into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,

    /// Seed product id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,

    /// Seed user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Store file, relative to the directory containing `.trellis/`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<PathBuf>,
}

impl TrellisConfig {
    /// Load configuration from a file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Save configuration to a file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, content).await?;
        Ok(())
    }
}

/// Settings given on the command line (or through the environment).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingOverrides {
    /// `--tenant` / `TRELLIS_TENANT`
    pub tenant: Option<String>,
    /// `--product` / `TRELLIS_PRODUCT`
    pub product: Option<String>,
    /// `--user` / `TRELLIS_USER`
    pub user: Option<String>,
    /// `--store`
    pub store: Option<PathBuf>,
    /// `--config`
    pub config: Option<PathBuf>,
}

/// Fully resolved settings for an import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    /// Tenant, product, and user
    pub request: ImportRequest,
    /// Store file
    pub store_path: PathBuf,
}

impl ImportSettings {
    /// Merge `overrides` over the config file found from `working_dir`.
    ///
    /// Relative paths given on the command line resolve against
    /// `working_dir`; relative store paths in the config file resolve against
    /// the directory that contains `.trellis/`.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Parse` if the config file is invalid
    /// - `ConfigError::Missing` if tenant, product, or user has no value
    /// - `ConfigError::Invalid` if one of them is not a valid id
    pub async fn resolve(overrides: SettingOverrides, working_dir: &Path) -> Result<Self> {
        let (config, root) = match &overrides.config {
            Some(path) => {
                let path = working_dir.join(path);
                let config = TrellisConfig::load(&path).await?;
                (config, Some(config_root(&path)))
            }
            None => match find_trellis_root(working_dir) {
                Some(root) => {
                    let path = root.join(TRELLIS_DIR_NAME).join(CONFIG_FILE_NAME);
                    let config = if fs::try_exists(&path).await? {
                        TrellisConfig::load(&path).await?
                    } else {
                        TrellisConfig::default()
                    };
                    (config, Some(root))
                }
                None => (TrellisConfig::default(), None),
            },
        };

        let tenant = required("tenant", "TRELLIS_TENANT", overrides.tenant, config.tenant)?;
        let product = required("product", "TRELLIS_PRODUCT", overrides.product, config.product)?;
        let user = required("user", "TRELLIS_USER", overrides.user, config.user)?;

        let base = root.as_deref().unwrap_or(working_dir);
        let store_path = match (overrides.store, config.store) {
            (Some(path), _) => working_dir.join(path),
            (None, Some(path)) => base.join(path),
            (None, None) => default_store_path(base),
        };

        Ok(Self {
            request: ImportRequest::new(tenant, product, user),
            store_path,
        })
    }
}

fn required(
    name: &'static str,
    env: &'static str,
    flag: Option<String>,
    file: Option<String>,
) -> Result<String> {
    let value = flag.or(file).ok_or(ConfigError::Missing { name, env })?;
    validate_id(name, &value)
}

/// Check a tenant, product, or user id and return it trimmed.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` if the id is empty, too long, or contains
/// whitespace or control characters.
pub fn validate_id(name: &'static str, value: &str) -> Result<String> {
    let value = value.trim();
    let reason = if value.is_empty() {
        Some("cannot be empty".to_string())
    } else if value.chars().count() > MAX_ID_LENGTH {
        Some(format!("cannot exceed {MAX_ID_LENGTH} characters"))
    } else if value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        Some("cannot contain whitespace".to_string())
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigError::Invalid { name, reason }.into()),
        None => Ok(value.to_string()),
    }
}

/// Default store location under `root`.
pub fn default_store_path(root: &Path) -> PathBuf {
    root.join(TRELLIS_DIR_NAME).join(STORE_FILE_NAME)
}

/// The directory a config file's relative paths resolve against.
fn config_root(config_path: &Path) -> PathBuf {
    let dir = config_path.parent().unwrap_or(Path::new(""));
    if dir.file_name().is_some_and(|name| name == TRELLIS_DIR_NAME) {
        dir.parent().unwrap_or(dir).to_path_buf()
    } else {
        dir.to_path_buf()
    }
}

/// Find the trellis root directory by searching up the directory tree.
///
/// Returns the directory containing `.trellis/`, or `None` if none is found
/// within [`MAX_TRAVERSAL_DEPTH`] levels.
pub fn find_trellis_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(TRELLIS_DIR_NAME).is_dir() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}
