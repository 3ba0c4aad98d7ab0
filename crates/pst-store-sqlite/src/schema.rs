//! SQL schema for the statement store.
//!
//! Executed once when the pool is built. Per-connection settings live in
//! [`CONNECTION_PRAGMAS`], which every pooled connection runs on checkout.

/// Settings SQLite keeps per connection rather than per database file.
pub const CONNECTION_PRAGMAS: &str = "
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
";

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Snaks are content-addressed only when the writer asks for it; the bulk
-- import path inserts duplicates freely.
CREATE TABLE IF NOT EXISTS snak (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    property    TEXT NOT NULL,
    svalue      TEXT,              -- item qid or string content
    dvalue      TEXT,              -- canonical decimal
    tvalue      TEXT,              -- 'YYYY-MM-DD HH:MM:SS'
    lat         REAL,
    lng         REAL,
    \"precision\" INTEGER,
    lang        TEXT,
    vtype       TEXT NOT NULL
                CHECK (vtype IN ('item', 'string', 'quantity', 'time', 'location'))
);

CREATE TABLE IF NOT EXISTS statement (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    subject   TEXT    NOT NULL,
    mainsnak  INTEGER NOT NULL REFERENCES snak(id),
    dataset   TEXT    NOT NULL DEFAULT '',
    upload    INTEGER NOT NULL DEFAULT 0,
    state     INTEGER NOT NULL DEFAULT 0   -- 0 unapproved .. 6 blacklisted
);

CREATE TABLE IF NOT EXISTS qualifier (
    stmt  INTEGER NOT NULL REFERENCES statement(id) ON DELETE CASCADE,
    snak  INTEGER NOT NULL REFERENCES snak(id)
);

CREATE TABLE IF NOT EXISTS source (
    stmt  INTEGER NOT NULL REFERENCES statement(id) ON DELETE CASCADE,
    snak  INTEGER NOT NULL REFERENCES snak(id)
);

-- Append-only. No foreign key: entries survive deletion of their statement.
CREATE TABLE IF NOT EXISTS userlog (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    user     TEXT    NOT NULL,
    stmt     INTEGER NOT NULL,
    state    INTEGER NOT NULL,
    changed  TEXT    NOT NULL    -- RFC 3339 UTC, fixed width
);

CREATE INDEX IF NOT EXISTS statement_subject_idx ON statement(subject);
CREATE INDEX IF NOT EXISTS statement_state_idx   ON statement(state);
CREATE INDEX IF NOT EXISTS statement_dataset_idx ON statement(dataset);
CREATE INDEX IF NOT EXISTS snak_value_idx        ON snak(property, svalue);
CREATE INDEX IF NOT EXISTS qualifier_stmt_idx    ON qualifier(stmt);
CREATE INDEX IF NOT EXISTS source_stmt_idx       ON source(stmt);
CREATE INDEX IF NOT EXISTS userlog_stmt_idx      ON userlog(stmt);
CREATE INDEX IF NOT EXISTS userlog_changed_idx   ON userlog(changed);

PRAGMA user_version = 1;
";
