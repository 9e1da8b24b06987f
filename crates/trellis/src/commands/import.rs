//! Implementation of the `import` command.

use crate::app::App;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::report::RunReport;
use std::path::Path;

/// Import the JSONL file at `input` into the app's store.
///
/// The store is compacted after the run, including a cancelled one, so lines
/// the loader skipped are dropped from the file.
///
/// # Errors
///
/// Everything [`Pipeline::run_path`] returns, plus IO errors from compacting
/// the store.
pub async fn import(app: &mut App, input: &Path, cancel: CancelToken) -> Result<RunReport> {
    let request = app.settings().request.clone();
    tracing::info!(
        input = %input.display(),
        tenant = %request.tenant,
        "Starting import"
    );

    let report = Pipeline::new(app.store_mut(), request)
        .with_cancel_token(cancel)
        .run_path(input)
        .await?;

    app.save().await?;
    Ok(report)
}
