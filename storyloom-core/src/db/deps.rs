use rusqlite::{params, Row};
use uuid::Uuid;

use super::{uuid_col, Database};
use crate::error::{Result, StoreError};
use crate::models::{DependencyEdge, UpdateBlockInput, STALE_TAG};

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<DependencyEdge> {
    Ok(DependencyEdge {
        src_block_id: uuid_col(row, 0)?,
        dst_block_id: uuid_col(row, 1)?,
        kind: row.get(2)?,
    })
}

impl Database {
    /// Record that `dst` was generated from `src`. Idempotent upsert on
    /// (src, dst); re-adding replaces the kind rather than stacking edges.
    pub fn add_dependency(&self, src: Uuid, dst: Uuid, kind: &str) -> Result<()> {
        let session = self.session()?;
        session.execute(
            "INSERT INTO dependencies (src_block_id, dst_block_id, kind) VALUES (?1, ?2, ?3)
             ON CONFLICT (src_block_id, dst_block_id) DO UPDATE SET kind = excluded.kind",
            params![src.to_string(), dst.to_string(), kind],
        )?;
        Ok(())
    }

    /// Outbound edges of `src`. Flat list, no transitive closure.
    pub fn get_dependencies(&self, src: Uuid) -> Result<Vec<DependencyEdge>> {
        let session = self.session()?;
        let mut stmt = session.prepare(
            "SELECT src_block_id, dst_block_id, kind FROM dependencies WHERE src_block_id = ?1",
        )?;
        let edges = stmt
            .query_map(params![src.to_string()], edge_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// Inbound edges of `dst`.
    pub fn get_reverse_dependencies(&self, dst: Uuid) -> Result<Vec<DependencyEdge>> {
        let session = self.session()?;
        let mut stmt = session.prepare(
            "SELECT src_block_id, dst_block_id, kind FROM dependencies WHERE dst_block_id = ?1",
        )?;
        let edges = stmt
            .query_map(params![dst.to_string()], edge_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// Mark direct dependents of `src` stale by appending [`STALE_TAG`] to
    /// their tag sets. One hop only: staleness does not cascade through
    /// edge chains (the graph is not guaranteed acyclic), callers re-invoke
    /// per hop if they need more.
    ///
    /// Each destination is an ordinary tag mutation through the standard
    /// update path, independently transactional, so the sweep is idempotent
    /// and safely re-runnable if interrupted. Returns the number of blocks
    /// newly marked.
    pub fn invalidate_downstream(&self, src: Uuid) -> Result<usize> {
        let mut marked = 0;
        for edge in self.get_dependencies(src)? {
            let Some(block) = self.get_block(edge.dst_block_id)? else {
                continue;
            };
            if block.tags.contains(STALE_TAG) {
                continue;
            }
            let mut tags = block.tags;
            tags.insert(STALE_TAG.to_string());
            match self.update_block(
                edge.dst_block_id,
                UpdateBlockInput {
                    content: None,
                    tags: Some(tags),
                },
            ) {
                Ok(_) => marked += 1,
                // Destination deleted between the read and the update.
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        tracing::debug!(src = %src, marked, "invalidation sweep finished");
        Ok(marked)
    }
}
