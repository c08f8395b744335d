pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    root_path TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tabs (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    position INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS blocks (
    id TEXT PRIMARY KEY,
    tab_id TEXT NOT NULL REFERENCES tabs(id) ON DELETE CASCADE,
    parent_id TEXT REFERENCES blocks(id) ON DELETE SET NULL,
    kind TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    tags TEXT,
    version INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- No foreign key on block_id: history outlives hard-deleted blocks.
CREATE TABLE IF NOT EXISTS history (
    id TEXT PRIMARY KEY,
    block_id TEXT NOT NULL,
    action TEXT NOT NULL CHECK (action IN ('create', 'edit', 'delete')),
    payload TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dependencies (
    src_block_id TEXT NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
    dst_block_id TEXT NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    PRIMARY KEY (src_block_id, dst_block_id)
);

CREATE TABLE IF NOT EXISTS assets (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    hash TEXT NOT NULL UNIQUE,
    path TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    meta TEXT
);

CREATE TABLE IF NOT EXISTS block_assets (
    block_id TEXT NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
    asset_id TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
    role TEXT NOT NULL DEFAULT 'preview',
    PRIMARY KEY (block_id, asset_id)
);

CREATE INDEX IF NOT EXISTS idx_tabs_project ON tabs(project_id);
CREATE INDEX IF NOT EXISTS idx_blocks_tab ON blocks(tab_id);
CREATE INDEX IF NOT EXISTS idx_history_block ON history(block_id);
CREATE INDEX IF NOT EXISTS idx_deps_dst ON dependencies(dst_block_id);
CREATE INDEX IF NOT EXISTS idx_assets_project ON assets(project_id);
"#;
