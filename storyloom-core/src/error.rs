use std::time::Duration;

use uuid::Uuid;

/// Errors surfaced by the storage core.
///
/// Hash-uniqueness conflicts during concurrent asset ingest are resolved
/// inside [`crate::AssetStore`] and never reach callers.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A referenced project, tab, block or asset does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// `update_block` was called with neither new content nor new tags.
    #[error("update requires new content or new tags")]
    NothingToUpdate,

    /// Disk read/write failure for asset bytes. The operation aborts
    /// before any row is committed.
    #[error("asset i/o: {0}")]
    Io(#[from] std::io::Error),

    /// The session pool stayed exhausted past the acquisition timeout.
    /// The in-flight call is lost; retrying is the caller's decision.
    #[error("no storage session became available within {0:?}")]
    Unavailable(Duration),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("payload encoding: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
