//! Synthetic fleet data for running without a real store.
//!
//! Power follows a single `cos²` wave over the day with zero output at night.
//! [`seed_fleet`] writes a small fleet through any [`SiteStore`], so the same
//! code path feeds the in-memory store in fake mode and fixtures in tests.

use std::f64::consts::PI;

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::{
  Error, Result,
  forecast::NewForecastRun,
  generation::NewGeneration,
  site::{NewSite, Site},
  store::SiteStore,
  window::yesterday_midnight,
};

const MINUTES_PER_DAY: f64 = 24.0 * 60.0;

/// Relative solar intensity in `[0, 1]` for the time of day of `t`.
pub fn fake_intensity(t: DateTime<Utc>) -> f64 {
  let fraction_of_day = f64::from(t.hour() * 60 + t.minute()) / MINUTES_PER_DAY;
  if fraction_of_day > 0.25 && fraction_of_day < 0.75 {
    (2.0 * PI * fraction_of_day).cos().powi(2)
  } else {
    0.0
  }
}

/// Shape of the fleet written by [`seed_fleet`].
#[derive(Debug, Clone)]
pub struct FakeFleet {
  pub clients:          usize,
  pub sites_per_client: usize,
  pub capacity_kw:      f64,
  /// Spacing of generation samples.
  pub generation_step:  Duration,
  /// Spacing of forecast issue times.
  pub forecast_every:   Duration,
  /// Width of each forecast value.
  pub forecast_step:    Duration,
  /// Values per forecast run.
  pub forecast_values:  usize,
}

impl Default for FakeFleet {
  fn default() -> Self {
    Self {
      clients:          2,
      sites_per_client: 3,
      capacity_kw:      4.0,
      generation_step:  Duration::minutes(5),
      forecast_every:   Duration::hours(1),
      forecast_step:    Duration::minutes(15),
      forecast_values:  11,
    }
  }
}

/// Write clients, sites, generation from yesterday midnight up to `now` and
/// periodic forecast runs into `store`. Returns the created sites.
pub async fn seed_fleet<S: SiteStore>(
  store: &S,
  fleet: &FakeFleet,
  now: DateTime<Utc>,
) -> Result<Vec<Site>> {
  if fleet.generation_step <= Duration::zero() || fleet.forecast_every <= Duration::zero() {
    return Err(Error::InvalidBucketWidth(
      fleet.generation_step.min(fleet.forecast_every).num_seconds(),
    ));
  }

  let start = yesterday_midnight(now);
  let mut sites = Vec::with_capacity(fleet.clients * fleet.sites_per_client);

  for c in 0..fleet.clients {
    let client = store
      .add_client(format!("fake_client_{c}"))
      .await
      .map_err(Error::store)?;

    for s in 0..fleet.sites_per_client {
      let client_site_id = s as i64;
      let mut input = NewSite::new(client.client_id, client_site_id, fleet.capacity_kw);
      input.client_site_name = Some(format!("fake_site_{c}_{s}"));
      input.latitude = 51.0;
      input.longitude = 3.0;
      input.ml_id = (c * fleet.sites_per_client + s) as i64;
      sites.push(store.add_site(input).await.map_err(Error::store)?);
    }
  }

  let mut generation_times = Vec::new();
  let mut t = start;
  while t < now {
    generation_times.push(t);
    t += fleet.generation_step;
  }

  let mut issue_times = Vec::new();
  let mut t = start;
  while t <= now {
    issue_times.push(t);
    t += fleet.forecast_every;
  }

  for site in &sites {
    let samples = generation_times
      .iter()
      .map(|&t| NewGeneration {
        start_utc:           t,
        end_utc:             t + fleet.generation_step,
        generation_power_kw: site.capacity_kw * fake_intensity(t),
      })
      .collect();
    store
      .record_generation(site.site_id, samples)
      .await
      .map_err(Error::store)?;

    for &issued in &issue_times {
      let powers: Vec<f64> = (0..fleet.forecast_values)
        .map(|i| {
          let target = issued + fleet.forecast_step * i as i32;
          site.capacity_kw * fake_intensity(target)
        })
        .collect();
      store
        .record_forecast(NewForecastRun::stepped(
          site.site_id,
          "fake",
          issued,
          fleet.forecast_step,
          &powers,
        ))
        .await
        .map_err(Error::store)?;
    }
  }

  tracing::info!(
    sites = sites.len(),
    samples_per_site = generation_times.len(),
    runs_per_site = issue_times.len(),
    "seeded fake fleet"
  );

  Ok(sites)
}
