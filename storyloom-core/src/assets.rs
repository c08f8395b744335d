//! Content-addressed binary asset store.
//!
//! Files live under `<root>/assets/` named `<hex-sha256><original-ext>`
//! and are immutable once written. Ingest streams input in bounded chunks
//! through the digest into a temp file, so large media never sits fully in
//! memory before its hash is known. Byte-identical uploads collapse to one
//! file and one row regardless of filename or time.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use rusqlite::{params, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Result, StoreError};
use crate::models::{Asset, LinkedAsset};

const INGEST_CHUNK: usize = 8 * 1024;

const ASSET_COLS: &str = "id, project_id, hash, path, mime_type, size_bytes, created_at, meta";

#[derive(Clone)]
pub struct AssetStore {
    root: PathBuf,
    assets_dir: PathBuf,
    db: Database,
}

fn asset_from_row(row: &Row<'_>) -> rusqlite::Result<Asset> {
    let meta_s: Option<String> = row.get(7)?;
    let meta = meta_s
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?
        .unwrap_or_else(|| serde_json::json!({}));
    Ok(Asset {
        id: crate::db::uuid_col(row, 0)?,
        project_id: crate::db::uuid_col(row, 1)?,
        hash: row.get(2)?,
        path: row.get(3)?,
        mime_type: row.get(4)?,
        size_bytes: row.get(5)?,
        created_at: crate::db::ts_col(row, 6)?,
        meta,
    })
}

/// Original extension including the dot, or ".bin" when there is none.
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_else(|| ".bin".to_string())
}

fn mime_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl AssetStore {
    /// Attach to the `assets/` directory under `root`, creating it if
    /// missing. The database handle is injected; the store keeps no
    /// ambient state.
    pub fn new(root: impl Into<PathBuf>, db: Database) -> Result<Self> {
        let root = root.into();
        let assets_dir = root.join(crate::workspace::ASSETS_DIR);
        fs::create_dir_all(&assets_dir)?;
        Ok(Self {
            root,
            assets_dir,
            db,
        })
    }

    pub fn store_bytes(
        &self,
        data: &[u8],
        filename: &str,
        project_id: Uuid,
        meta: Option<serde_json::Value>,
    ) -> Result<Asset> {
        self.store_stream(data, filename, project_id, meta)
    }

    /// Ingest from a reader with hash-based deduplication.
    ///
    /// The bytes are spooled to a temp file in the assets directory while
    /// the SHA-256 accumulates, then renamed into place; the binary write
    /// strictly precedes the row insert, so a failed write leaves no row.
    /// Two concurrent uploads of identical content both succeed and return
    /// the same asset: the loser of the UNIQUE(hash) race discards its
    /// work and adopts the winner's row.
    pub fn store_stream<R: Read>(
        &self,
        mut reader: R,
        filename: &str,
        project_id: Uuid,
        meta: Option<serde_json::Value>,
    ) -> Result<Asset> {
        let mut hasher = Sha256::new();
        let mut spool = tempfile::Builder::new()
            .prefix(".ingest-")
            .tempfile_in(&self.assets_dir)?;
        let mut size: u64 = 0;
        let mut buf = [0u8; INGEST_CHUNK];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            spool.write_all(&buf[..n])?;
            size += n as u64;
        }
        spool.flush()?;
        let hash = format!("{:x}", hasher.finalize());

        if let Some(existing) = self.get_by_hash(&hash)? {
            tracing::debug!(asset = %existing.id, %hash, "deduplicated upload");
            return Ok(existing);
        }

        let rel_path = format!("{}/{hash}{}", crate::workspace::ASSETS_DIR, extension_of(filename));
        let dest = self.root.join(&rel_path);
        if !dest.exists() {
            spool.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
        }
        // When dest already exists a racing ingest of the same bytes won
        // the rename; the spool drops and cleans itself up.

        let asset = Asset {
            id: Uuid::new_v4(),
            project_id,
            hash: hash.clone(),
            path: rel_path,
            mime_type: mime_for(filename).to_string(),
            size_bytes: size as i64,
            created_at: chrono::Utc::now(),
            meta: meta.unwrap_or_else(|| serde_json::json!({})),
        };
        match self.insert_row(&asset) {
            Ok(()) => {
                tracing::debug!(asset = %asset.id, %hash, size, "asset stored");
                Ok(asset)
            }
            Err(StoreError::Sqlite(e)) if is_unique_violation(&e) => {
                // Lost the insert race; the winner's row is authoritative.
                self.adopt_winner(&hash, &dest, &asset.path, e)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve a lost UNIQUE(hash) race by returning the committed row.
    /// When the losing ingest persisted its spool under a different
    /// extension, that file is unlinked so nothing on disk is left
    /// unreferenced by a row.
    fn adopt_winner(
        &self,
        hash: &str,
        dest: &Path,
        rel_path: &str,
        err: rusqlite::Error,
    ) -> Result<Asset> {
        let winner = self.get_by_hash(hash)?.ok_or(StoreError::Sqlite(err))?;
        if winner.path != rel_path {
            if let Err(e) = fs::remove_file(dest) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(%hash, path = %dest.display(), error = %e, "discarding raced upload failed");
                }
            }
        }
        tracing::debug!(asset = %winner.id, %hash, "adopted concurrently stored asset");
        Ok(winner)
    }

    fn insert_row(&self, asset: &Asset) -> Result<()> {
        let session = self.db.session()?;
        session.execute(
            "INSERT INTO assets (id, project_id, hash, path, mime_type, size_bytes, created_at, meta)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                asset.id.to_string(),
                asset.project_id.to_string(),
                asset.hash,
                asset.path,
                asset.mime_type,
                asset.size_bytes,
                crate::db::fmt_ts(&asset.created_at),
                serde_json::to_string(&asset.meta)?,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Asset>> {
        let session = self.db.session()?;
        let asset = session
            .query_row(
                &format!("SELECT {ASSET_COLS} FROM assets WHERE id = ?1"),
                params![id.to_string()],
                asset_from_row,
            )
            .optional()?;
        Ok(asset)
    }

    pub fn get_by_hash(&self, hash: &str) -> Result<Option<Asset>> {
        let session = self.db.session()?;
        let asset = session
            .query_row(
                &format!("SELECT {ASSET_COLS} FROM assets WHERE hash = ?1"),
                params![hash],
                asset_from_row,
            )
            .optional()?;
        Ok(asset)
    }

    /// All assets of a project, newest first.
    pub fn list(&self, project_id: Uuid) -> Result<Vec<Asset>> {
        let session = self.db.session()?;
        let mut stmt = session.prepare(&format!(
            "SELECT {ASSET_COLS} FROM assets WHERE project_id = ?1 ORDER BY created_at DESC, rowid DESC"
        ))?;
        let assets = stmt
            .query_map(params![project_id.to_string()], asset_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(assets)
    }

    /// Assets whose metadata `tags` array contains `tag`.
    pub fn search_by_tag(&self, project_id: Uuid, tag: &str) -> Result<Vec<Asset>> {
        let session = self.db.session()?;
        let mut stmt = session.prepare(&format!(
            "SELECT {ASSET_COLS} FROM assets
             WHERE project_id = ?1
               AND EXISTS (SELECT 1 FROM json_each(assets.meta, '$.tags') WHERE value = ?2)
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let assets = stmt
            .query_map(params![project_id.to_string(), tag], asset_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(assets)
    }

    /// Remove an asset: the row first (block links cascade), then a
    /// best-effort file unlink where a missing file is not an error. A
    /// failed unlink can strand a file, never a row without its file.
    /// Returns `false` when the asset is already absent.
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let Some(asset) = self.get(id)? else {
            return Ok(false);
        };
        {
            let session = self.db.session()?;
            session.execute("DELETE FROM assets WHERE id = ?1", params![id.to_string()])?;
        }
        let full = self.root.join(&asset.path);
        if let Err(e) = fs::remove_file(&full) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(asset = %id, path = %full.display(), error = %e, "asset file removal failed");
            }
        }
        tracing::debug!(asset = %id, "asset deleted");
        Ok(true)
    }

    /// Attach an asset to a block under a role; re-linking the same pair
    /// replaces the role.
    pub fn link_block(&self, block_id: Uuid, asset_id: Uuid, role: &str) -> Result<()> {
        let session = self.db.session()?;
        session.execute(
            "INSERT OR REPLACE INTO block_assets (block_id, asset_id, role) VALUES (?1, ?2, ?3)",
            params![block_id.to_string(), asset_id.to_string(), role],
        )?;
        Ok(())
    }

    pub fn assets_for_block(&self, block_id: Uuid) -> Result<Vec<LinkedAsset>> {
        let session = self.db.session()?;
        let mut stmt = session.prepare(&format!(
            "SELECT {ASSET_COLS}, ba.role FROM assets
             JOIN block_assets ba ON assets.id = ba.asset_id
             WHERE ba.block_id = ?1"
        ))?;
        let linked = stmt
            .query_map(params![block_id.to_string()], |row| {
                Ok(LinkedAsset {
                    asset: asset_from_row(row)?,
                    role: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(linked)
    }

    /// Absolute on-disk location of an asset's file.
    pub fn absolute_path(&self, asset: &Asset) -> PathBuf {
        self.root.join(&asset.path)
    }
}
