//! One project root on disk: a single durable database file plus an
//! `assets/` directory of content-addressed, immutable files.

use std::fs;
use std::path::PathBuf;

use crate::assets::AssetStore;
use crate::db::{Database, StoreConfig};
use crate::error::Result;

pub const DB_FILE: &str = "project.db";
pub const ASSETS_DIR: &str = "assets";

/// Handles to everything stored under one project root. Components receive
/// their database handle explicitly at construction; there are no ambient
/// singletons.
pub struct Workspace {
    pub root: PathBuf,
    pub db: Database,
    pub assets: AssetStore,
}

impl Workspace {
    /// Open (creating if missing) the workspace at `root`, with
    /// environment-driven engine configuration.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with(root, StoreConfig::from_env())
    }

    pub fn open_with(root: impl Into<PathBuf>, config: StoreConfig) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let db = Database::open(root.join(DB_FILE), config)?;
        let assets = AssetStore::new(&root, db.clone())?;
        tracing::info!(root = %root.display(), "workspace opened");
        Ok(Self { root, db, assets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("movie");
        let _ws = Workspace::open_with(&root, StoreConfig::default()).unwrap();
        assert!(root.join(DB_FILE).exists());
        assert!(root.join(ASSETS_DIR).is_dir());
    }
}
