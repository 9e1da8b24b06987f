//! Command execution logic.
//!
//! This module contains the implementation of all CLI commands.

use anyhow::Result;

use super::args::{ImportArgs, InitArgs};
use crate::app::App;
use crate::cancel::{CancelToken, cancel_on_ctrl_c};
use crate::error::Error;
use crate::output::{self, OutputMode};

/// Execute the init command
pub async fn execute_init(args: &InitArgs, output_mode: OutputMode) -> Result<()> {
    use crate::commands::init::{self, InitOptions};

    let current_dir = std::env::current_dir()?;

    let options = InitOptions {
        tenant: args.tenant.clone(),
        product_id: args.product.clone(),
        product_name: args.product_name.clone(),
        user_id: args.user.clone(),
        user_name: args.user_name.clone(),
        store: args.store.clone(),
    };
    let result = init::init(&current_dir, options).await?;

    match output_mode {
        OutputMode::Json => {
            output::print_json(&serde_json::json!({
                "trellis_dir": result.trellis_dir,
                "config_file": result.config_file,
                "store_file": result.store_file,
                "tenant": result.tenant,
                "product": args.product,
                "user": args.user,
            }))?;
        }
        OutputMode::Text if !args.quiet => {
            println!("Initialized trellis in {}", result.trellis_dir.display());
            println!("  Config: {}", result.config_file.display());
            println!("  Store: {}", result.store_file.display());
            println!("  Tenant: {}", result.tenant);
            println!("  Product: {}", args.product);
            println!("  User: {}", args.user);
        }
        OutputMode::Text => {}
    }

    Ok(())
}

/// Execute the import command
///
/// Prints the report even when the run was cancelled, then fails so the
/// process exits non-zero.
pub async fn execute_import(args: &ImportArgs, output_mode: OutputMode) -> Result<()> {
    use crate::commands::import;

    let current_dir = std::env::current_dir()?;
    let mut app = App::from_overrides(args.overrides(), &current_dir).await?;

    let cancel = CancelToken::new();
    let signal = cancel_on_ctrl_c(cancel.clone());

    let result = import::import(&mut app, &current_dir.join(&args.file), cancel).await;
    signal.abort();
    let report = result?;

    output::print_report(&report, output_mode)?;

    if report.cancelled {
        return Err(Error::Cancelled.into());
    }
    Ok(())
}
