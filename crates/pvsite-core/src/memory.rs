//! [`MemoryStore`]: an in-process [`SiteStore`] for tests and the fake mode.
//!
//! Shares no code with the SQLite backend but honours the same contract:
//! strictly increasing ids, last-write-wins on generation `start_utc`,
//! `client_site_id` uniqueness per client.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::{
  forecast::{ForecastRun, ForecastValue, NewForecastRun},
  generation::{GenerationSample, NewGeneration},
  site::{Client, NewSite, Site},
  store::SiteStore,
  window::TimeWindow,
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error(transparent)]
  Core(#[from] crate::Error),
}

#[derive(Debug, Clone, Default)]
struct State {
  clients:     Vec<Client>,
  sites:       Vec<Site>,
  generation:  Vec<GenerationSample>,
  forecasts:   Vec<ForecastRun>,
  next_row_id: i64,
}

impl State {
  fn next_id(&mut self) -> i64 {
    self.next_row_id += 1;
    self.next_row_id
  }

  fn site_exists(&self, site_id: Uuid) -> bool {
    self.sites.iter().any(|s| s.site_id == site_id)
  }
}

/// A store held entirely in memory.
///
/// Cloning is cheap and clones share state. Use [`MemoryStore::fork`] for an
/// independent copy.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  state: Arc<RwLock<State>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// A deep copy whose writes never reach `self`. Dropping the fork discards
  /// everything written to it, which gives tests a rollback scope.
  pub fn fork(&self) -> Self {
    let snapshot = self.read(State::clone);
    Self { state: Arc::new(RwLock::new(snapshot)) }
  }

  fn read<T>(&self, f: impl FnOnce(&State) -> T) -> T {
    let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
    f(&guard)
  }

  fn write<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
    let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
  }
}

impl SiteStore for MemoryStore {
  type Error = MemoryError;

  // ── Clients ───────────────────────────────────────────────────────────────

  async fn add_client(&self, client_name: String) -> Result<Client, MemoryError> {
    let client = Client {
      client_id: Uuid::new_v4(),
      client_name,
      created_at: Utc::now(),
    };
    self.write(|s| s.clients.push(client.clone()));
    Ok(client)
  }

  async fn rename_client(
    &self,
    client_id:   Uuid,
    client_name: String,
  ) -> Result<Option<Client>, MemoryError> {
    Ok(self.write(|s| {
      s.clients
        .iter_mut()
        .find(|c| c.client_id == client_id)
        .map(|c| {
          c.client_name = client_name;
          c.clone()
        })
    }))
  }

  async fn get_client(&self, client_id: Uuid) -> Result<Option<Client>, MemoryError> {
    Ok(self.read(|s| s.clients.iter().find(|c| c.client_id == client_id).cloned()))
  }

  // ── Sites ─────────────────────────────────────────────────────────────────

  async fn add_site(&self, input: NewSite) -> Result<Site, MemoryError> {
    self.write(|s| {
      if !s.clients.iter().any(|c| c.client_id == input.client_id) {
        return Err(crate::Error::ClientNotFound(input.client_id).into());
      }
      if s.sites.iter().any(|site| {
        site.client_id == input.client_id && site.client_site_id == input.client_site_id
      }) {
        return Err(
          crate::Error::DuplicateClientSiteId {
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
      s.sites.push(site.clone());
      Ok(site)
    })
  }

  async fn get_site(&self, site_id: Uuid) -> Result<Option<Site>, MemoryError> {
    Ok(self.read(|s| s.sites.iter().find(|site| site.site_id == site_id).cloned()))
  }

  async fn list_sites(&self, client_id: Uuid) -> Result<Vec<Site>, MemoryError> {
    let mut sites: Vec<Site> = self.read(|s| {
      s.sites
        .iter()
        .filter(|site| site.client_id == client_id)
        .cloned()
        .collect()
    });
    sites.sort_by_key(|site| site.client_site_id);
    Ok(sites)
  }

  // ── Ingestion ─────────────────────────────────────────────────────────────

  async fn record_generation(
    &self,
    site_id: Uuid,
    samples: Vec<NewGeneration>,
  ) -> Result<Vec<GenerationSample>, MemoryError> {
    for sample in &samples {
      sample.validate()?;
    }

    self.write(|s| {
      if !s.site_exists(site_id) {
        return Err(crate::Error::SiteNotFound(site_id).into());
      }

      let mut written = Vec::with_capacity(samples.len());
      for sample in samples {
        s.generation
          .retain(|g| !(g.site_id == site_id && g.start_utc == sample.start_utc));
        let row = GenerationSample {
          generation_id:       s.next_id(),
          site_id,
          start_utc:           sample.start_utc,
          end_utc:             sample.end_utc,
          generation_power_kw: sample.generation_power_kw,
        };
        s.generation.push(row.clone());
        written.push(row);
      }
      Ok(written)
    })
  }

  async fn record_forecast(&self, input: NewForecastRun) -> Result<ForecastRun, MemoryError> {
    input.validate()?;

    self.write(|s| {
      if !s.site_exists(input.site_id) {
        return Err(crate::Error::SiteNotFound(input.site_id).into());
      }

      let forecast_id = s.next_id();
      let mut values: Vec<ForecastValue> = input
        .values
        .into_iter()
        .map(|v| ForecastValue {
          forecast_value_id: s.next_id(),
          forecast_id,
          start_utc:         v.start_utc,
          end_utc:           v.end_utc,
          horizon_minutes:   v.horizon_minutes,
          forecast_power_kw: v.forecast_power_kw,
        })
        .collect();
      values.sort_by_key(|v| (v.start_utc, v.forecast_value_id));

      let run = ForecastRun {
        forecast_id,
        site_id: input.site_id,
        forecast_version: input.forecast_version,
        timestamp_utc: input.timestamp_utc,
        values,
      };
      s.forecasts.push(run.clone());
      Ok(run)
    })
  }

  // ── Range reads ───────────────────────────────────────────────────────────

  async fn list_generation(
    &self,
    site_id: Uuid,
    window:  TimeWindow,
  ) -> Result<Vec<GenerationSample>, MemoryError> {
    let mut rows: Vec<GenerationSample> = self.read(|s| {
      s.generation
        .iter()
        .filter(|g| g.site_id == site_id && window.contains(g.start_utc))
        .cloned()
        .collect()
    });
    rows.sort_by_key(|g| (g.start_utc, g.generation_id));
    Ok(rows)
  }

  async fn list_forecast_runs(
    &self,
    site_id: Uuid,
    window:  TimeWindow,
  ) -> Result<Vec<ForecastRun>, MemoryError> {
    let mut runs: Vec<ForecastRun> = self.read(|s| {
      s.forecasts
        .iter()
        .filter(|r| r.site_id == site_id && r.intersects(&window))
        .cloned()
        .collect()
    });
    runs.sort_by_key(|r| (r.timestamp_utc, r.forecast_id));
    Ok(runs)
  }
}
