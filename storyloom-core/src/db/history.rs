use rusqlite::{params, Row};
use uuid::Uuid;

use super::{ts_col, uuid_col, Database};
use crate::error::Result;
use crate::models::{HistoryAction, HistoryEntry, HistoryPayload};

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let action_s: String = row.get(2)?;
    let action = HistoryAction::from_str(&action_s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown history action {action_s:?}").into(),
        )
    })?;
    let payload_s: String = row.get(3)?;
    let payload: HistoryPayload = serde_json::from_str(&payload_s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(HistoryEntry {
        id: uuid_col(row, 0)?,
        block_id: uuid_col(row, 1)?,
        action,
        payload,
        timestamp: ts_col(row, 4)?,
    })
}

impl Database {
    /// Full mutation trail for a block, newest first.
    ///
    /// The trail survives deletion of the block itself, so this also works
    /// for ids that no longer resolve through [`Database::get_block`].
    pub fn get_history(&self, block_id: Uuid) -> Result<Vec<HistoryEntry>> {
        let session = self.session()?;
        let mut stmt = session.prepare(
            "SELECT id, block_id, action, payload, timestamp FROM history
             WHERE block_id = ?1 ORDER BY timestamp DESC, rowid DESC",
        )?;
        let entries = stmt
            .query_map(params![block_id.to_string()], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_util::open_test_db;
    use crate::models::{
        prior_contents, BlockKind, CreateBlockInput, HistoryAction, UpdateBlockInput,
    };

    #[test]
    fn history_survives_hard_delete() {
        let (_dir, db) = open_test_db();
        let project = db.create_project("Test", "/tmp/test").unwrap();
        let tab = db.create_tab(project.id, "Story", 0).unwrap();
        let block = db
            .create_block(
                tab.id,
                CreateBlockInput {
                    kind: BlockKind::Scene,
                    content: "INT. TRAIN - NIGHT".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        db.update_block(
            block.id,
            UpdateBlockInput {
                content: Some("EXT. TRAIN - NIGHT".into()),
                tags: None,
            },
        )
        .unwrap();
        assert!(db.delete_block(block.id).unwrap());

        let history = db.get_history(block.id).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].action, HistoryAction::Delete);
        assert_eq!(history[1].action, HistoryAction::Edit);
        assert_eq!(history[2].action, HistoryAction::Create);
    }

    #[test]
    fn backward_walk_reconstructs_prior_versions() {
        let (_dir, db) = open_test_db();
        let project = db.create_project("Test", "/tmp/test").unwrap();
        let tab = db.create_tab(project.id, "Story", 0).unwrap();
        let block = db
            .create_block(
                tab.id,
                CreateBlockInput {
                    kind: BlockKind::Concept,
                    content: "A".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        for content in ["B", "C"] {
            db.update_block(
                block.id,
                UpdateBlockInput {
                    content: Some(content.into()),
                    tags: None,
                },
            )
            .unwrap();
        }

        assert_eq!(db.get_block(block.id).unwrap().unwrap().content, "C");
        let history = db.get_history(block.id).unwrap();
        assert_eq!(prior_contents(&history), vec!["B".to_string(), "A".to_string()]);
    }
}
