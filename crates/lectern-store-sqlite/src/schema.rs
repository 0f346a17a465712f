//! SQL schema for the lectern SQLite store.
//!
//! Executed once at connection startup. The layout is versioned with
//! `PRAGMA user_version`; future migrations will be gated on that number.

/// Current schema version, written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Foreign keys carry no `ON DELETE` action. The core deletes children before
/// parents, so an out-of-order delete fails instead of cascading silently.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    id     INTEGER PRIMARY KEY AUTOINCREMENT,
    title  TEXT NOT NULL,
    slug   TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS courses (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id    INTEGER NOT NULL,
    title       TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    overview    TEXT NOT NULL,
    created_at  TEXT NOT NULL    -- RFC 3339 UTC
);

-- \"order\" is not unique: explicit values may collide and deletes leave gaps.
CREATE TABLE IF NOT EXISTS modules (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id    INTEGER NOT NULL REFERENCES courses(id),
    title        TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT '',
    \"order\"      INTEGER NOT NULL CHECK (\"order\" >= 0)
);

-- item_id points into the table named by kind; not enforceable as a foreign key.
CREATE TABLE IF NOT EXISTS contents (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id  INTEGER NOT NULL REFERENCES modules(id),
    kind       TEXT NOT NULL CHECK (kind IN ('text', 'video', 'image', 'file')),
    item_id    INTEGER NOT NULL,
    \"order\"    INTEGER NOT NULL CHECK (\"order\" >= 0)
);

CREATE TABLE IF NOT EXISTS texts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id    INTEGER NOT NULL,
    title       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    content     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS videos (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id    INTEGER NOT NULL,
    title       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    url         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS images (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id    INTEGER NOT NULL,
    title       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    file        TEXT NOT NULL    -- blob reference
);

CREATE TABLE IF NOT EXISTS files (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id    INTEGER NOT NULL,
    title       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    file        TEXT NOT NULL    -- blob reference
);

CREATE INDEX IF NOT EXISTS courses_owner_idx   ON courses(owner_id);
CREATE INDEX IF NOT EXISTS courses_created_idx ON courses(created_at);
CREATE INDEX IF NOT EXISTS modules_course_idx  ON modules(course_id, \"order\");
CREATE INDEX IF NOT EXISTS contents_module_idx ON contents(module_id, \"order\");
CREATE INDEX IF NOT EXISTS contents_item_idx   ON contents(kind, item_id);

PRAGMA user_version = 1;
";
