use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Typed directed relation between two blocks, denoting provenance
/// ("dst was generated from src"). Unique per (src, dst); re-adding an
/// edge replaces its kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyEdge {
    pub src_block_id: Uuid,
    pub dst_block_id: Uuid,
    pub kind: String,
}
