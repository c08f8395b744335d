use rusqlite::{params, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

use super::{fmt_ts, opt_uuid_col, tags_col, ts_col, uuid_col, Database};
use crate::error::{Result, StoreError};
use crate::models::{Block, BlockKind, CreateBlockInput, HistoryPayload, UpdateBlockInput};

const BLOCK_COLS: &str = "id, tab_id, parent_id, kind, content, tags, version, created_at, updated_at";

pub(super) fn block_from_row(row: &Row<'_>) -> rusqlite::Result<Block> {
    Ok(Block {
        id: uuid_col(row, 0)?,
        tab_id: uuid_col(row, 1)?,
        parent_id: opt_uuid_col(row, 2)?,
        kind: BlockKind::parse(&row.get::<_, String>(3)?),
        content: row.get(4)?,
        tags: tags_col(row, 5)?,
        version: row.get(6)?,
        created_at: ts_col(row, 7)?,
        updated_at: ts_col(row, 8)?,
    })
}

/// Append one history row inside the caller's transaction. The block
/// mutation and its history entry commit together or not at all.
pub(super) fn record_history(
    tx: &Transaction<'_>,
    block_id: Uuid,
    payload: &HistoryPayload,
    now: &str,
) -> Result<()> {
    tx.execute(
        "INSERT INTO history (id, block_id, action, payload, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            Uuid::new_v4().to_string(),
            block_id.to_string(),
            payload.action().as_str(),
            serde_json::to_string(payload)?,
            now,
        ],
    )?;
    Ok(())
}

impl Database {
    /// Create a block at version 1 and write its "create" history entry in
    /// the same transaction.
    pub fn create_block(&self, tab_id: Uuid, input: CreateBlockInput) -> Result<Block> {
        let mut session = self.session()?;
        let tx = session.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let tab_exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM tabs WHERE id = ?1",
                params![tab_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if tab_exists.is_none() {
            return Err(StoreError::not_found("tab", tab_id));
        }

        let now = chrono::Utc::now();
        let block = Block {
            id: Uuid::new_v4(),
            tab_id,
            parent_id: input.parent_id,
            kind: input.kind,
            content: input.content,
            tags: input.tags,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let now_s = fmt_ts(&now);
        tx.execute(
            "INSERT INTO blocks (id, tab_id, parent_id, kind, content, tags, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)",
            params![
                block.id.to_string(),
                block.tab_id.to_string(),
                block.parent_id.map(|id| id.to_string()),
                block.kind.as_str(),
                block.content,
                serde_json::to_string(&block.tags)?,
                now_s,
            ],
        )?;
        record_history(
            &tx,
            block.id,
            &HistoryPayload::Create {
                content: block.content.clone(),
                tags: block.tags.clone(),
            },
            &now_s,
        )?;
        tx.commit()?;

        tracing::debug!(block = %block.id, kind = %block.kind, "block created");
        Ok(block)
    }

    pub fn get_block(&self, id: Uuid) -> Result<Option<Block>> {
        let session = self.session()?;
        let block = session
            .query_row(
                &format!("SELECT {BLOCK_COLS} FROM blocks WHERE id = ?1"),
                params![id.to_string()],
                block_from_row,
            )
            .optional()?;
        Ok(block)
    }

    /// Blocks of a tab in stable creation order (never re-sorted by edit
    /// time).
    pub fn list_blocks(&self, tab_id: Uuid) -> Result<Vec<Block>> {
        let session = self.session()?;
        let mut stmt = session.prepare(&format!(
            "SELECT {BLOCK_COLS} FROM blocks WHERE tab_id = ?1 ORDER BY created_at, rowid"
        ))?;
        let blocks = stmt
            .query_map(params![tab_id.to_string()], block_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(blocks)
    }

    /// Apply a content and/or tag change: version += 1 plus an "edit"
    /// history entry, atomically.
    ///
    /// Concurrent updates to the same block serialize through the engine;
    /// last committer wins on content.
    pub fn update_block(&self, id: Uuid, input: UpdateBlockInput) -> Result<Block> {
        if input.content.is_none() && input.tags.is_none() {
            return Err(StoreError::NothingToUpdate);
        }

        let mut session = self.session()?;
        // Immediate so the write lock is taken at BEGIN: a deferred
        // read-to-write upgrade racing another committer fails with
        // SQLITE_BUSY instead of waiting on the busy handler.
        let tx = session.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let old = tx
            .query_row(
                &format!("SELECT {BLOCK_COLS} FROM blocks WHERE id = ?1"),
                params![id.to_string()],
                block_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("block", id))?;

        let now = chrono::Utc::now();
        let now_s = fmt_ts(&now);
        let new_content = input.content.clone().unwrap_or_else(|| old.content.clone());
        let new_tags = input.tags.clone().unwrap_or_else(|| old.tags.clone());
        tx.execute(
            "UPDATE blocks SET content = ?1, tags = ?2, version = version + 1, updated_at = ?3 WHERE id = ?4",
            params![
                new_content,
                serde_json::to_string(&new_tags)?,
                now_s,
                id.to_string(),
            ],
        )?;
        record_history(
            &tx,
            id,
            &HistoryPayload::Edit {
                old_content: old.content,
                new_content: input.content,
                old_tags: old.tags,
                new_tags: input.tags,
            },
            &now_s,
        )?;
        tx.commit()?;

        tracing::debug!(block = %id, version = old.version + 1, "block updated");
        Ok(Block {
            id: old.id,
            tab_id: old.tab_id,
            parent_id: old.parent_id,
            kind: old.kind,
            content: new_content,
            tags: new_tags,
            version: old.version + 1,
            created_at: old.created_at,
            updated_at: now,
        })
    }

    /// Hard-delete a block. The "delete" history entry is written before
    /// the row goes away; incident dependency edges and asset links
    /// cascade at the engine level. History rows stay behind.
    ///
    /// Returns `false` when the block is already absent.
    pub fn delete_block(&self, id: Uuid) -> Result<bool> {
        let mut session = self.session()?;
        let tx = session.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let content: Option<String> = tx
            .query_row(
                "SELECT content FROM blocks WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(content) = content else {
            return Ok(false);
        };

        record_history(
            &tx,
            id,
            &HistoryPayload::Delete { content },
            &super::now_str(),
        )?;
        tx.execute("DELETE FROM blocks WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;

        tracing::debug!(block = %id, "block deleted");
        Ok(true)
    }
}
