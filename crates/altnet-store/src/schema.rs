/// SQL DDL for the altnet record and lineage database.
/// WAL mode + foreign keys enabled at connection time.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS page_records (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    preview_text TEXT NOT NULL DEFAULT '',
    packed_content TEXT NOT NULL DEFAULT '',
    author_name TEXT NOT NULL DEFAULT 'Anonymous',
    model_id TEXT NOT NULL DEFAULT '',
    timestamp INTEGER NOT NULL,
    exploration_id TEXT,
    screenshot_ref TEXT
);

CREATE TABLE IF NOT EXISTS explorations (
    id TEXT PRIMARY KEY,
    root_url TEXT NOT NULL,
    author_id TEXT,
    author_name TEXT NOT NULL DEFAULT 'Anonymous',
    created_at INTEGER NOT NULL,
    tonal_modifier TEXT
);

CREATE TABLE IF NOT EXISTS exploration_nodes (
    exploration_id TEXT NOT NULL REFERENCES explorations(id),
    id TEXT NOT NULL,
    url TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    parent_node_id TEXT,
    record_id TEXT,
    timestamp INTEGER NOT NULL,
    diff_size INTEGER NOT NULL DEFAULT 0,
    concepts TEXT NOT NULL DEFAULT '[]',
    screenshot_ref TEXT,
    tonal_modifier TEXT,
    PRIMARY KEY (exploration_id, id)
);

CREATE TABLE IF NOT EXISTS visits (
    id TEXT PRIMARY KEY,
    address TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    packed_content TEXT NOT NULL DEFAULT '',
    model_id TEXT NOT NULL DEFAULT '',
    timestamp INTEGER NOT NULL,
    record_id TEXT,
    exploration_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_records_timestamp ON page_records(timestamp);
CREATE INDEX IF NOT EXISTS idx_records_url ON page_records(url);
CREATE INDEX IF NOT EXISTS idx_records_exploration ON page_records(exploration_id);
CREATE INDEX IF NOT EXISTS idx_nodes_exploration ON exploration_nodes(exploration_id);
CREATE INDEX IF NOT EXISTS idx_visits_timestamp ON visits(timestamp);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
