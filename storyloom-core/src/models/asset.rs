use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content-addressed binary file, immutable once written.
///
/// `hash` is the lowercase hex SHA-256 of the file bytes and is globally
/// unique: byte-identical uploads collapse to one row and one file.
/// `path` is relative to the workspace root (`assets/<hash><ext>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub project_id: Uuid,
    pub hash: String,
    pub path: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
    /// Free-form metadata; `meta["tags"]` (array of strings) drives
    /// tag search.
    pub meta: serde_json::Value,
}

/// An asset attached to a block, with the role it plays there
/// (e.g. "preview", "full_clip", "reference").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedAsset {
    #[serde(flatten)]
    pub asset: Asset,
    pub role: String,
}
