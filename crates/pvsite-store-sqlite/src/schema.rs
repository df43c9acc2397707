//! SQL schema for the PV site SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Timestamps are fixed-width RFC 3339 strings (nanoseconds, `Z` suffix) so
/// that string comparison in range filters matches time order.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS clients (
    client_id    TEXT PRIMARY KEY,
    client_name  TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sites (
    site_id           TEXT PRIMARY KEY,
    client_id         TEXT NOT NULL REFERENCES clients(client_id),
    client_site_id    INTEGER NOT NULL,
    client_site_name  TEXT,
    latitude          REAL NOT NULL,
    longitude         REAL NOT NULL,
    capacity_kw       REAL NOT NULL,
    ml_id             INTEGER NOT NULL,
    created_at        TEXT NOT NULL,
    UNIQUE (client_id, client_site_id)
);

-- Append-only apart from last-write-wins on (site_id, start_utc).
CREATE TABLE IF NOT EXISTS generation (
    generation_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id              TEXT NOT NULL REFERENCES sites(site_id),
    start_utc            TEXT NOT NULL,
    end_utc              TEXT NOT NULL,
    generation_power_kw  REAL NOT NULL,
    UNIQUE (site_id, start_utc),
    CHECK  (end_utc > start_utc)
);

-- Forecast runs and values are strictly append-only.
-- AUTOINCREMENT keeps ids increasing in insertion order, which the
-- duplicate-run tie-break relies on.
CREATE TABLE IF NOT EXISTS forecasts (
    forecast_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id           TEXT NOT NULL REFERENCES sites(site_id),
    forecast_version  TEXT NOT NULL,
    timestamp_utc     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS forecast_values (
    forecast_value_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    forecast_id        INTEGER NOT NULL REFERENCES forecasts(forecast_id),
    start_utc          TEXT NOT NULL,
    end_utc            TEXT NOT NULL,
    horizon_minutes    INTEGER NOT NULL,
    forecast_power_kw  REAL NOT NULL,
    CHECK (end_utc > start_utc)
);

CREATE INDEX IF NOT EXISTS sites_client_idx          ON sites(client_id);
CREATE INDEX IF NOT EXISTS generation_site_start_idx ON generation(site_id, start_utc);
CREATE INDEX IF NOT EXISTS forecasts_site_ts_idx     ON forecasts(site_id, timestamp_utc);
CREATE INDEX IF NOT EXISTS forecast_values_run_idx   ON forecast_values(forecast_id, start_utc);

PRAGMA user_version = 1;
";
