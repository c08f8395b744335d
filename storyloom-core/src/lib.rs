//! Core library for Storyloom.
//!
//! This crate provides the persistent content model for a guided
//! creative-writing workspace, independent of any UI layer: a versioned
//! block store with an append-only history trail, a typed dependency graph
//! with one-hop staleness invalidation, and a content-addressed binary
//! asset store with hash deduplication and streaming ingest.
//!
//! # Usage
//!
//! ```no_run
//! use storyloom_core::Workspace;
//! use storyloom_core::models::{BlockKind, CreateBlockInput};
//!
//! let ws = Workspace::open("./my_movie")?;
//! let project = ws.db.create_project("My Movie", "./my_movie")?;
//! let tab = ws.db.create_tab(project.id, "Story", 0)?;
//!
//! let block = ws.db.create_block(
//!     tab.id,
//!     CreateBlockInput {
//!         kind: BlockKind::Logline,
//!         content: "Detective on a train".into(),
//!         ..Default::default()
//!     },
//! )?;
//! assert_eq!(block.version, 1);
//! # Ok::<(), storyloom_core::StoreError>(())
//! ```

pub mod assets;
pub mod db;
pub mod error;
pub mod models;
pub mod workspace;

// Re-export commonly used types at crate root
pub use assets::AssetStore;
pub use db::{Database, StoreConfig};
pub use error::{Result, StoreError};
pub use workspace::Workspace;
