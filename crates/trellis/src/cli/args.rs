//! CLI argument structs for all commands.
//!
//! Each command has its own argument struct with clap derive attributes
//! for parsing and validation.

use clap::Parser;
use std::path::PathBuf;

use super::validators::{validate_name, validate_product, validate_tenant, validate_user};
use crate::config::SettingOverrides;

/// Arguments for the `init` command
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Tenant that imports will be scoped to
    #[arg(long, value_parser = validate_tenant)]
    pub tenant: String,

    /// Product id to seed
    #[arg(long, value_parser = validate_product)]
    pub product: String,

    /// Product display name (defaults to the id)
    #[arg(long, value_parser = validate_name)]
    pub product_name: Option<String>,

    /// User id to seed; imported records are created by this user
    #[arg(long, value_parser = validate_user)]
    pub user: String,

    /// User display name (defaults to the id)
    #[arg(long, value_parser = validate_name)]
    pub user_name: Option<String>,

    /// Store file, relative to the current directory
    ///
    /// Defaults to `.trellis/store.jsonl`.
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Suppress output messages
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `import` command
#[derive(Parser, Debug, Clone)]
pub struct ImportArgs {
    /// JSONL file with one external issue per line
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Tenant to import into
    #[arg(long, env = "TRELLIS_TENANT", value_parser = validate_tenant)]
    pub tenant: Option<String>,

    /// Product the imported records belong to
    #[arg(long, env = "TRELLIS_PRODUCT", value_parser = validate_product)]
    pub product: Option<String>,

    /// User the imported records are created by
    #[arg(long, env = "TRELLIS_USER", value_parser = validate_user)]
    pub user: Option<String>,

    /// Store file (overrides the config file)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Config file to use instead of searching for `.trellis/config.yaml`
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ImportArgs {
    /// The settings given on the command line or through the environment.
    pub fn overrides(&self) -> SettingOverrides {
        SettingOverrides {
            tenant: self.tenant.clone(),
            product: self.product.clone(),
            user: self.user.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}
