//! SQL schema for the Trail SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per tracked root entity: the rollup pointer for its history.
CREATE TABLE IF NOT EXISTS root_logs (
    log_id          TEXT PRIMARY KEY,
    entity_type     TEXT NOT NULL,
    entity_id       TEXT NOT NULL,
    display_label   TEXT NOT NULL,   -- snapshot at creation; not kept live
    last_event      TEXT NOT NULL,   -- 'created' | 'updated' | 'deleted'
    last_batch      INTEGER NOT NULL CHECK (last_batch >= 1),
    last_actor      TEXT,            -- NULL means system-initiated
    last_changed_at TEXT NOT NULL,   -- RFC 3339 UTC
    seen_all        INTEGER NOT NULL DEFAULT 0,
    UNIQUE (entity_type, entity_id)
);

-- Details are strictly append-only.
-- No UPDATE is ever issued against this table; rows leave only by
-- cascading from their root_logs row.
CREATE TABLE IF NOT EXISTS details (
    detail_id   TEXT PRIMARY KEY,
    log_id      TEXT NOT NULL REFERENCES root_logs(log_id) ON DELETE CASCADE,
    batch       INTEGER NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id   TEXT NOT NULL,
    event       TEXT NOT NULL,
    old_json    TEXT NOT NULL DEFAULT '{}',
    new_json    TEXT NOT NULL DEFAULT '{}',
    actor_id    TEXT,
    occurred_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS details_log_idx       ON details(log_id);
CREATE INDEX IF NOT EXISTS details_log_batch_idx ON details(log_id, batch);
CREATE INDEX IF NOT EXISTS root_logs_changed_idx ON root_logs(last_changed_at);

PRAGMA user_version = 1;
";
