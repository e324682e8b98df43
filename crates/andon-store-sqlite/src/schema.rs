//! SQL schema for the Andon SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS nodes (
    node_id     TEXT PRIMARY KEY,
    kind        TEXT NOT NULL,        -- 'site' | 'area' | 'process' | 'station'
                                      -- | 'device' | 'event' | 'root_cause'
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    parent_id   TEXT,                 -- NULL for site and root_cause
    detail_json TEXT NOT NULL DEFAULT 'null',  -- per-kind payload, inner data only
    version     INTEGER NOT NULL,
    created_at  TEXT NOT NULL,        -- ISO 8601 UTC
    updated_at  TEXT NOT NULL
);

-- Sibling names are unique per kind and parent. Parentless kinds share one
-- pseudo-parent via ifnull so the uniqueness still applies to them. This is
-- the conditional-write backstop behind the resolver's duplicate pre-check.
CREATE UNIQUE INDEX IF NOT EXISTS nodes_sibling_name_uidx
    ON nodes(kind, ifnull(parent_id, ''), name);

CREATE INDEX IF NOT EXISTS nodes_kind_name_idx   ON nodes(kind, name);
CREATE INDEX IF NOT EXISTS nodes_kind_parent_idx ON nodes(kind, parent_id);

CREATE TABLE IF NOT EXISTS permissions (
    user_id     TEXT PRIMARY KEY,
    grants_json TEXT NOT NULL,        -- {sites, areas, processes, stations, devices}
    version     INTEGER NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Issues are insert-then-update only; no DELETE is ever issued against this
-- table. The denormalized *_name columns are creation-time copies and are
-- never rewritten when the hierarchy changes.
CREATE TABLE IF NOT EXISTS issues (
    issue_id           TEXT PRIMARY KEY,   -- caller-generated v4 UUID
    event_id           TEXT NOT NULL,
    event_description  TEXT NOT NULL,
    issue_type         TEXT NOT NULL,
    priority           TEXT NOT NULL,      -- 'low' | 'medium' | 'high' | 'critical'
    site_name          TEXT NOT NULL,
    area_name          TEXT NOT NULL,
    process_name       TEXT NOT NULL,
    station_name       TEXT NOT NULL,
    device_name        TEXT NOT NULL,
    created            TEXT NOT NULL,
    created_at         TEXT NOT NULL,
    created_date_utc   TEXT NOT NULL,      -- YYYY-MM-DD of created, for stats
    status             TEXT NOT NULL,      -- 'open' | 'acknowledged' | 'closed' | 'rejected'
    acknowledged       TEXT,
    acknowledged_time  INTEGER,            -- whole seconds from created
    closed             TEXT,
    resolution_time    INTEGER,            -- whole seconds from created
    root_cause         TEXT,
    comment            TEXT,
    additional_details TEXT,
    created_by         TEXT,
    acknowledged_by    TEXT,
    closed_by          TEXT,
    rejected_by        TEXT,
    version            INTEGER NOT NULL
);

-- The four secondary query shapes, as real multi-column indexes rather than
-- concatenated sort-key strings.
CREATE INDEX IF NOT EXISTS issues_by_device_idx ON issues(
    site_name, area_name, status, process_name, station_name, device_name,
    created);
CREATE INDEX IF NOT EXISTS issues_by_report_idx ON issues(
    site_name, area_name, status, process_name, event_description,
    station_name, device_name, created);
CREATE INDEX IF NOT EXISTS issues_device_event_idx
    ON issues(device_name, event_id, status);
CREATE INDEX IF NOT EXISTS issues_created_date_idx
    ON issues(created_date_utc, created_at);

PRAGMA user_version = 1;
";
