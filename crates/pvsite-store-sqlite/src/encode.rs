//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings in UTC with
//! nanosecond precision, the full resolution of `DateTime<Utc>`, so lexical
//! order equals time order and values read back exactly as written. UUIDs are stored
//! as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use pvsite_core::{
  forecast::{ForecastRun, ForecastValue},
  generation::GenerationSample,
  site::{Client, Site},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `clients` row.
pub struct RawClient {
  pub client_id:   String,
  pub client_name: String,
  pub created_at:  String,
}

impl RawClient {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      client_id:   row.get(0)?,
      client_name: row.get(1)?,
      created_at:  row.get(2)?,
    })
  }

  pub fn into_client(self) -> Result<Client> {
    Ok(Client {
      client_id:   decode_uuid(&self.client_id)?,
      client_name: self.client_name,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `sites` row.
pub struct RawSite {
  pub site_id:          String,
  pub client_id:        String,
  pub client_site_id:   i64,
  pub client_site_name: Option<String>,
  pub latitude:         f64,
  pub longitude:        f64,
  pub capacity_kw:      f64,
  pub ml_id:            i64,
  pub created_at:       String,
}

impl RawSite {
  pub const COLUMNS: &'static str = "site_id, client_id, client_site_id, client_site_name, \
                                     latitude, longitude, capacity_kw, ml_id, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      site_id:          row.get(0)?,
      client_id:        row.get(1)?,
      client_site_id:   row.get(2)?,
      client_site_name: row.get(3)?,
      latitude:         row.get(4)?,
      longitude:        row.get(5)?,
      capacity_kw:      row.get(6)?,
      ml_id:            row.get(7)?,
      created_at:       row.get(8)?,
    })
  }

  pub fn into_site(self) -> Result<Site> {
    Ok(Site {
      site_id:          decode_uuid(&self.site_id)?,
      client_id:        decode_uuid(&self.client_id)?,
      client_site_id:   self.client_site_id,
      client_site_name: self.client_site_name,
      latitude:         self.latitude,
      longitude:        self.longitude,
      capacity_kw:      self.capacity_kw,
      ml_id:            self.ml_id,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `generation` row.
pub struct RawGeneration {
  pub generation_id:       i64,
  pub site_id:             String,
  pub start_utc:           String,
  pub end_utc:             String,
  pub generation_power_kw: f64,
}

impl RawGeneration {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      generation_id:       row.get(0)?,
      site_id:             row.get(1)?,
      start_utc:           row.get(2)?,
      end_utc:             row.get(3)?,
      generation_power_kw: row.get(4)?,
    })
  }

  pub fn into_sample(self) -> Result<GenerationSample> {
    Ok(GenerationSample {
      generation_id:       self.generation_id,
      site_id:             decode_uuid(&self.site_id)?,
      start_utc:           decode_dt(&self.start_utc)?,
      end_utc:             decode_dt(&self.end_utc)?,
      generation_power_kw: self.generation_power_kw,
    })
  }
}

/// Raw values read directly from a `forecasts` row.
pub struct RawForecast {
  pub forecast_id:      i64,
  pub site_id:          String,
  pub forecast_version: String,
  pub timestamp_utc:    String,
}

impl RawForecast {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      forecast_id:      row.get(0)?,
      site_id:          row.get(1)?,
      forecast_version: row.get(2)?,
      timestamp_utc:    row.get(3)?,
    })
  }

  /// Decode with the run's values, which must already be ordered.
  pub fn into_run(self, values: Vec<ForecastValue>) -> Result<ForecastRun> {
    Ok(ForecastRun {
      forecast_id: self.forecast_id,
      site_id: decode_uuid(&self.site_id)?,
      forecast_version: self.forecast_version,
      timestamp_utc: decode_dt(&self.timestamp_utc)?,
      values,
    })
  }
}

/// Raw values read directly from a `forecast_values` row.
pub struct RawForecastValue {
  pub forecast_value_id: i64,
  pub forecast_id:       i64,
  pub start_utc:         String,
  pub end_utc:           String,
  pub horizon_minutes:   i32,
  pub forecast_power_kw: f64,
}

impl RawForecastValue {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      forecast_value_id: row.get(0)?,
      forecast_id:       row.get(1)?,
      start_utc:         row.get(2)?,
      end_utc:           row.get(3)?,
      horizon_minutes:   row.get(4)?,
      forecast_power_kw: row.get(5)?,
    })
  }

  pub fn into_value(self) -> Result<ForecastValue> {
    Ok(ForecastValue {
      forecast_value_id: self.forecast_value_id,
      forecast_id:       self.forecast_id,
      start_utc:         decode_dt(&self.start_utc)?,
      end_utc:           decode_dt(&self.end_utc)?,
      horizon_minutes:   self.horizon_minutes,
      forecast_power_kw: self.forecast_power_kw,
    })
  }
}
