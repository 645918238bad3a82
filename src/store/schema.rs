//! Catalog schema.

/// DDL for the trope catalog. Every statement is idempotent.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tropes (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    description TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    description TEXT
);

CREATE TABLE IF NOT EXISTS trope_categories (
    trope_id TEXT NOT NULL REFERENCES tropes(id) ON DELETE CASCADE,
    category_id TEXT NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
    PRIMARY KEY (trope_id, category_id)
);

CREATE TABLE IF NOT EXISTS works (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    type TEXT,
    year INTEGER,
    author TEXT,
    description TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS examples (
    id TEXT PRIMARY KEY,
    trope_id TEXT NOT NULL REFERENCES tropes(id) ON DELETE CASCADE,
    work_id TEXT NOT NULL REFERENCES works(id) ON DELETE CASCADE,
    description TEXT
);

CREATE INDEX IF NOT EXISTS idx_examples_work ON examples(work_id);
CREATE INDEX IF NOT EXISTS idx_examples_trope ON examples(trope_id);
";

/// Tables the catalog consists of, in dependency order.
pub const TABLES: &[&str] = &["tropes", "categories", "trope_categories", "works", "examples"];
