//! Application context for CLI command execution.
//!
//! [`App`] owns the resolved settings and the opened store for the lifetime
//! of one command.
//!
//! # Example
//!
//! ```no_run
//! use trellis::app::App;
//! use trellis::config::SettingOverrides;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::from_overrides(SettingOverrides::default(), Path::new(".")).await?;
//!     println!("importing into {}", app.settings().request.tenant);
//!     Ok(())
//! }
//! ```

use crate::config::{ImportSettings, SettingOverrides};
use crate::error::Result;
use crate::storage::{RecordStore, StoreBackend, create_store};
use std::path::Path;

/// Application context for CLI operations.
pub struct App {
    store: Box<dyn RecordStore>,
    settings: ImportSettings,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("settings", &self.settings)
            .field("store", &"<dyn RecordStore>")
            .finish()
    }
}

impl App {
    /// Resolve settings from `overrides` and the config file found from
    /// `working_dir`, then open the store they point at.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings cannot be resolved (see [`ImportSettings::resolve`])
    /// - The store file exists but cannot be read
    pub async fn from_overrides(overrides: SettingOverrides, working_dir: &Path) -> Result<Self> {
        let settings = ImportSettings::resolve(overrides, working_dir).await?;
        Self::from_settings(settings).await
    }

    /// Open the JSONL store named by `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store file exists but cannot be read.
    pub async fn from_settings(settings: ImportSettings) -> Result<Self> {
        tracing::debug!(store = %settings.store_path.display(), "Opening store");
        let store = create_store(StoreBackend::Jsonl(settings.store_path.clone())).await?;
        Ok(Self { store, settings })
    }

    /// Get a mutable reference to the store.
    pub fn store_mut(&mut self) -> &mut dyn RecordStore {
        self.store.as_mut()
    }

    /// Get an immutable reference to the store.
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// The resolved settings.
    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Compact the store file.
    pub async fn save(&self) -> Result<()> {
        self.store.save().await
    }
}
