//! [`SqliteStore`]: the SQLite implementation of [`SiteStore`].

use std::{collections::HashMap, future::Future, path::Path};

use chrono::Utc;
use pvsite_core::{
  forecast::{ForecastRun, ForecastValue, NewForecastRun},
  generation::{GenerationSample, NewGeneration},
  site::{Client, NewSite, Site},
  store::SiteStore,
  window::TimeWindow,
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawClient, RawForecast, RawForecastValue, RawGeneration, RawSite, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A PV site store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Every clone
/// talks to the same connection, and each `call` closure runs to completion
/// before the next one starts, so a multi-statement read inside one closure
/// sees a consistent view.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `scope` inside a transaction that is always rolled back afterwards.
  ///
  /// Everything `scope` writes through the store it receives is visible to
  /// its own reads and discarded when it returns, whatever it returns. A
  /// panic inside `scope` skips the rollback.
  pub async fn with_rollback<F, Fut, T>(&self, scope: F) -> Result<T>
  where
    F: FnOnce(SqliteStore) -> Fut,
    Fut: Future<Output = T>,
  {
    self
      .conn
      .call(|conn| {
        conn.execute_batch("BEGIN")?;
        Ok(())
      })
      .await?;

    let out = scope(self.clone()).await;

    self
      .conn
      .call(|conn| {
        conn.execute_batch("ROLLBACK")?;
        Ok(())
      })
      .await?;
    tracing::debug!("rolled back scoped transaction");

    Ok(out)
  }

  async fn client_exists(&self, client_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(client_id);
    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM clients WHERE client_id = ?1",
              rusqlite::params![id_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }

  async fn site_exists(&self, site_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(site_id);
    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM sites WHERE site_id = ?1",
              rusqlite::params![id_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }
}

// ─── SiteStore impl ──────────────────────────────────────────────────────────

impl SiteStore for SqliteStore {
  type Error = Error;

  // ── Clients ───────────────────────────────────────────────────────────────

  async fn add_client(&self, client_name: String) -> Result<Client> {
    let client = Client {
      client_id: Uuid::new_v4(),
      client_name,
      created_at: Utc::now(),
    };

    let id_str   = encode_uuid(client.client_id);
    let name     = client.client_name.clone();
    let at_str   = encode_dt(client.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO clients (client_id, client_name, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, name, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(client)
  }

  async fn rename_client(&self, client_id: Uuid, client_name: String) -> Result<Option<Client>> {
    let id_str = encode_uuid(client_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE clients SET client_name = ?2 WHERE client_id = ?1",
          rusqlite::params![id_str, client_name],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_client(client_id).await
  }

  async fn get_client(&self, client_id: Uuid) -> Result<Option<Client>> {
    let id_str = encode_uuid(client_id);

    let raw: Option<RawClient> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT client_id, client_name, created_at FROM clients WHERE client_id = ?1",
              rusqlite::params![id_str],
              RawClient::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawClient::into_client).transpose()
  }

  // ── Sites ─────────────────────────────────────────────────────────────────

  async fn add_site(&self, input: NewSite) -> Result<Site> {
    if !self.client_exists(input.client_id).await? {
      return Err(Error::ClientNotFound(input.client_id));
    }

    let client_str = encode_uuid(input.client_id);
    let local_id   = input.client_site_id;
    let taken = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM sites WHERE client_id = ?1 AND client_site_id = ?2",
              rusqlite::params![client_str, local_id],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    if taken {
      return Err(
        pvsite_core::Error::DuplicateClientSiteId {
          client_id:      input.client_id,
          client_site_id: input.client_site_id,
        }
        .into(),
      );
    }

    let site = Site {
      site_id:          Uuid::new_v4(),
      client_id:        input.client_id,
      client_site_id:   input.client_site_id,
      client_site_name: input.client_site_name,
      latitude:         input.latitude,
      longitude:        input.longitude,
      capacity_kw:      input.capacity_kw,
      ml_id:            input.ml_id,
      created_at:       Utc::now(),
    };

    let site_str   = encode_uuid(site.site_id);
    let client_str = encode_uuid(site.client_id);
    let name       = site.client_site_name.clone();
    let at_str     = encode_dt(site.created_at);
    let (local_id, lat, lon, capacity, ml_id) = (
      site.client_site_id,
      site.latitude,
      site.longitude,
      site.capacity_kw,
      site.ml_id,
    );

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sites (
             site_id, client_id, client_site_id, client_site_name,
             latitude, longitude, capacity_kw, ml_id, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            site_str, client_str, local_id, name, lat, lon, capacity, ml_id, at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(site)
  }

  async fn get_site(&self, site_id: Uuid) -> Result<Option<Site>> {
    let id_str = encode_uuid(site_id);

    let raw: Option<RawSite> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {} FROM sites WHERE site_id = ?1", RawSite::COLUMNS);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawSite::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSite::into_site).transpose()
  }

  async fn list_sites(&self, client_id: Uuid) -> Result<Vec<Site>> {
    let id_str = encode_uuid(client_id);

    let raws: Vec<RawSite> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM sites WHERE client_id = ?1 ORDER BY client_site_id",
          RawSite::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawSite::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSite::into_site).collect()
  }

  // ── Ingestion ─────────────────────────────────────────────────────────────

  async fn record_generation(
    &self,
    site_id: Uuid,
    samples: Vec<NewGeneration>,
  ) -> Result<Vec<GenerationSample>> {
    for sample in &samples {
      sample.validate()?;
    }
    if !self.site_exists(site_id).await? {
      return Err(Error::SiteNotFound(site_id));
    }

    let site_str = encode_uuid(site_id);
    let encoded: Vec<(String, String, f64)> = samples
      .iter()
      .map(|s| (encode_dt(s.start_utc), encode_dt(s.end_utc), s.generation_power_kw))
      .collect();

    let ids: Vec<i64> = self
      .conn
      .call(move |conn| {
        let sp = conn.savepoint()?;
        let mut ids = Vec::with_capacity(encoded.len());
        {
          // REPLACE drops a row with the same (site_id, start_utc) first.
          let mut stmt = sp.prepare(
            "INSERT OR REPLACE INTO generation (site_id, start_utc, end_utc, generation_power_kw)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for (start, end, kw) in &encoded {
            stmt.execute(rusqlite::params![site_str, start, end, kw])?;
            ids.push(sp.last_insert_rowid());
          }
        }
        sp.commit()?;
        Ok(ids)
      })
      .await?;

    Ok(
      samples
        .into_iter()
        .zip(ids)
        .map(|(s, generation_id)| GenerationSample {
          generation_id,
          site_id,
          start_utc: s.start_utc,
          end_utc: s.end_utc,
          generation_power_kw: s.generation_power_kw,
        })
        .collect(),
    )
  }

  async fn record_forecast(&self, input: NewForecastRun) -> Result<ForecastRun> {
    input.validate()?;
    if !self.site_exists(input.site_id).await? {
      return Err(Error::SiteNotFound(input.site_id));
    }

    let site_str    = encode_uuid(input.site_id);
    let version     = input.forecast_version.clone();
    let issued_str  = encode_dt(input.timestamp_utc);
    let encoded: Vec<(String, String, i32, f64)> = input
      .values
      .iter()
      .map(|v| {
        (
          encode_dt(v.start_utc),
          encode_dt(v.end_utc),
          v.horizon_minutes,
          v.forecast_power_kw,
        )
      })
      .collect();

    let (forecast_id, value_ids): (i64, Vec<i64>) = self
      .conn
      .call(move |conn| {
        let sp = conn.savepoint()?;
        sp.execute(
          "INSERT INTO forecasts (site_id, forecast_version, timestamp_utc) VALUES (?1, ?2, ?3)",
          rusqlite::params![site_str, version, issued_str],
        )?;
        let forecast_id = sp.last_insert_rowid();

        let mut value_ids = Vec::with_capacity(encoded.len());
        {
          let mut stmt = sp.prepare(
            "INSERT INTO forecast_values (
               forecast_id, start_utc, end_utc, horizon_minutes, forecast_power_kw
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for (start, end, horizon, kw) in &encoded {
            stmt.execute(rusqlite::params![forecast_id, start, end, horizon, kw])?;
            value_ids.push(sp.last_insert_rowid());
          }
        }
        sp.commit()?;
        Ok((forecast_id, value_ids))
      })
      .await?;

    let mut values: Vec<ForecastValue> = input
      .values
      .into_iter()
      .zip(value_ids)
      .map(|(v, forecast_value_id)| ForecastValue {
        forecast_value_id,
        forecast_id,
        start_utc: v.start_utc,
        end_utc: v.end_utc,
        horizon_minutes: v.horizon_minutes,
        forecast_power_kw: v.forecast_power_kw,
      })
      .collect();
    values.sort_by_key(|v| (v.start_utc, v.forecast_value_id));

    Ok(ForecastRun {
      forecast_id,
      site_id: input.site_id,
      forecast_version: input.forecast_version,
      timestamp_utc: input.timestamp_utc,
      values,
    })
  }

  // ── Range reads ───────────────────────────────────────────────────────────

  async fn list_generation(
    &self,
    site_id: Uuid,
    window:  TimeWindow,
  ) -> Result<Vec<GenerationSample>> {
    let site_str  = encode_uuid(site_id);
    let start_str = encode_dt(window.start());
    let end_str   = encode_dt(window.end());

    let raws: Vec<RawGeneration> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT generation_id, site_id, start_utc, end_utc, generation_power_kw
           FROM generation
           WHERE site_id = ?1
             AND start_utc >= ?2
             AND start_utc <  ?3
           ORDER BY start_utc, generation_id",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![site_str, start_str, end_str],
            RawGeneration::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGeneration::into_sample).collect()
  }

  async fn list_forecast_runs(
    &self,
    site_id: Uuid,
    window:  TimeWindow,
  ) -> Result<Vec<ForecastRun>> {
    let site_str  = encode_uuid(site_id);
    let start_str = encode_dt(window.start());
    let end_str   = encode_dt(window.end());

    let (raw_runs, raw_values): (Vec<RawForecast>, Vec<RawForecastValue>) = self
      .conn
      .call(move |conn| {
        // Runs with at least one value overlapping [start, end).
        let matching = "SELECT f.forecast_id FROM forecasts f
           WHERE f.site_id = ?1
             AND EXISTS (
               SELECT 1 FROM forecast_values v
               WHERE v.forecast_id = f.forecast_id
                 AND v.start_utc < ?3
                 AND v.end_utc   > ?2
             )";

        let mut stmt = conn.prepare(&format!(
          "SELECT forecast_id, site_id, forecast_version, timestamp_utc
           FROM forecasts
           WHERE forecast_id IN ({matching})
           ORDER BY timestamp_utc, forecast_id"
        ))?;
        let runs = stmt
          .query_map(
            rusqlite::params![site_str, start_str, end_str],
            RawForecast::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(&format!(
          "SELECT forecast_value_id, forecast_id, start_utc, end_utc,
                  horizon_minutes, forecast_power_kw
           FROM forecast_values
           WHERE forecast_id IN ({matching})
           ORDER BY forecast_id, start_utc, forecast_value_id"
        ))?;
        let values = stmt
          .query_map(
            rusqlite::params![site_str, start_str, end_str],
            RawForecastValue::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((runs, values))
      })
      .await?;

    let mut values_by_run: HashMap<i64, Vec<ForecastValue>> = HashMap::new();
    for raw in raw_values {
      let value = raw.into_value()?;
      values_by_run.entry(value.forecast_id).or_default().push(value);
    }

    raw_runs
      .into_iter()
      .map(|raw| {
        let values = values_by_run.remove(&raw.forecast_id).unwrap_or_default();
        raw.into_run(values)
      })
      .collect()
  }
}
