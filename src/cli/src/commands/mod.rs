//! Subcommands. Everything except `catalog` and `snapshot` runs against a
//! directory snapshot file loaded into an in-memory directory.

pub mod catalog;
pub mod check;
pub mod module;
pub mod profile;
pub mod snapshot;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use schoolgate_core::config::Config;
use schoolgate_core::directory::{Directory, DirectorySnapshot, InMemoryDirectory};
use schoolgate_core::rbac::{ModuleId, ModuleRecord};
use schoolgate_core::Gatekeeper;

/// A loaded snapshot with the access layer on top of it.
pub struct Session {
    pub directory: Arc<InMemoryDirectory>,
    pub gate: Gatekeeper,
    pub path: PathBuf,
}

impl Session {
    pub fn open(path: &Path, config: &Config) -> Result<Self> {
        let snapshot = DirectorySnapshot::load(path).with_context(|| {
            format!(
                "Failed to load snapshot {} (create one with `schoolgate snapshot init`)",
                path.display()
            )
        })?;
        debug!(
            path = %path.display(),
            users = snapshot.users.len(),
            modules = snapshot.modules.len(),
            "Loaded directory snapshot"
        );
        let directory = Arc::new(InMemoryDirectory::from_snapshot(snapshot));
        let gate = Gatekeeper::new(directory.clone(), config)?;
        Ok(Self {
            directory,
            gate,
            path: path.to_path_buf(),
        })
    }

    /// Write the directory back to the snapshot file.
    pub fn save(&self) -> Result<()> {
        self.directory
            .to_snapshot()
            .save(&self.path)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// Resolve a module given either its row id or its key.
    pub async fn resolve_module(&self, id_or_key: &str) -> Result<ModuleRecord> {
        if let Some(module) = self.directory.get_module_by_id(&ModuleId::new(id_or_key)).await? {
            return Ok(module);
        }
        self.directory
            .get_module_by_key(id_or_key)
            .await?
            .with_context(|| format!("Unknown module: {}", id_or_key))
    }
}
