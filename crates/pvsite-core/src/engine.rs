//! The query engine: the call contract the API layer consumes.
//!
//! Each entry point validates its inputs before touching the store, reads
//! what it needs through [`SiteStore`] and hands the data to the pure
//! resolver, horizon indexer and aggregator. Per-site reads of client-level
//! queries run concurrently; any failing site fails the whole request.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  aggregate::{BucketSpec, SiteReduction, aggregate},
  forecast::ForecastValue,
  horizon::{curve_for_horizon, index, latest_curve},
  resolve::{Resolution, resolve},
  series::{AggregatePoint, SeriesPoint, SiteForecast, SiteGeneration, SiteSeries},
  site::{Client, Site},
  store::SiteStore,
  window::TimeWindow,
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Tunables for [`Engine`], usually nested in the server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Width of forecast intervals; also the bucket width of client-level
  /// forecasts.
  pub forecast_step_minutes:     i64,
  /// Bucket width for client generation when the caller gives none.
  pub generation_bucket_minutes: i64,
  /// Alignment of buckets. `None` aligns to the Unix epoch.
  pub bucket_origin:             Option<DateTime<Utc>>,
  pub site_reduction:            SiteReduction,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      forecast_step_minutes:     15,
      generation_bucket_minutes: 15,
      bucket_origin:             None,
      site_reduction:            SiteReduction::Sum,
    }
  }
}

impl EngineConfig {
  /// Bucket geometry of `width` with this config's origin and reduction.
  pub fn bucket_spec(&self, width: Duration) -> Result<BucketSpec> {
    let spec = BucketSpec::new(width)?.with_reduction(self.site_reduction);
    Ok(match self.bucket_origin {
      Some(origin) => spec.with_origin(origin),
      None => spec,
    })
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Forecast and generation queries over a [`SiteStore`].
///
/// Read-only: nothing here writes to the store.
#[derive(Debug)]
pub struct Engine<S> {
  store:  Arc<S>,
  config: EngineConfig,
}

impl<S> Clone for Engine<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), config: self.config.clone() }
  }
}

impl<S: SiteStore> Engine<S> {
  pub fn new(store: Arc<S>, config: EngineConfig) -> Self { Self { store, config } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn config(&self) -> &EngineConfig { &self.config }

  // ── Lookups ───────────────────────────────────────────────────────────────

  pub async fn require_client(&self, client_id: Uuid) -> Result<Client> {
    self
      .store
      .get_client(client_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ClientNotFound(client_id))
  }

  pub async fn require_site(&self, site_id: Uuid) -> Result<Site> {
    self
      .store
      .get_site(site_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::SiteNotFound(site_id))
  }

  /// Site metadata for a client, ordered by `client_site_id`.
  pub async fn list_client_sites(&self, client_id: Uuid) -> Result<Vec<Site>> {
    self.require_client(client_id).await?;
    self.store.list_sites(client_id).await.map_err(Error::store)
  }

  // ── Forecasts ─────────────────────────────────────────────────────────────

  /// One winning run per issue timestamp for a site. Empty if the site has
  /// no runs in range; [`Error::SiteNotFound`] if the site does not exist.
  pub async fn resolve(&self, site_id: Uuid, window: TimeWindow) -> Result<Resolution> {
    self.require_site(site_id).await?;
    self.resolve_known(site_id, window).await
  }

  async fn resolve_known(&self, site_id: Uuid, window: TimeWindow) -> Result<Resolution> {
    let runs = self
      .store
      .list_forecast_runs(site_id, window)
      .await
      .map_err(Error::store)?;
    Ok(resolve(site_id, runs, &window))
  }

  /// A site's forecast over `window`.
  ///
  /// With a horizon, the `horizon_minutes`-ahead curve restricted to predicted
  /// starts inside the window. Without one, the latest run's full value set.
  pub async fn get_site_forecast(
    &self,
    site_id: Uuid,
    window: TimeWindow,
    horizon_minutes: Option<i32>,
  ) -> Result<SiteForecast> {
    self.require_site(site_id).await?;
    self.site_forecast_known(site_id, window, horizon_minutes).await
  }

  async fn site_forecast_known(
    &self,
    site_id: Uuid,
    window: TimeWindow,
    horizon_minutes: Option<i32>,
  ) -> Result<SiteForecast> {
    let resolution = self.resolve_known(site_id, window).await?;

    let (source, values) = match horizon_minutes {
      Some(h) => {
        let values: Vec<SeriesPoint> = curve_for_horizon(&resolution, h)
          .into_iter()
          .filter(|p| window.contains(p.timestamp_utc))
          .collect();
        // Metadata of the newest run that actually produced a point.
        let source = resolution.runs().iter().rev().find(|run| {
          index(run)
            .get(h)
            .is_some_and(|v| window.contains(v.start_utc))
        });
        (source, values)
      }
      None => (resolution.latest(), latest_curve(&resolution)),
    };

    Ok(match source {
      Some(run) => SiteForecast {
        site_id,
        forecast_id: Some(run.forecast_id),
        forecast_version: Some(run.forecast_version.clone()),
        forecast_creation_datetime: Some(run.timestamp_utc),
        values,
      },
      None => SiteForecast::empty(site_id),
    })
  }

  /// Client-level forecast: every site's forecast, bucketed at the forecast
  /// step and summed.
  pub async fn get_client_forecast(
    &self,
    client_id: Uuid,
    window: TimeWindow,
    horizon_minutes: Option<i32>,
  ) -> Result<Vec<AggregatePoint>> {
    let spec = self
      .config
      .bucket_spec(minutes(self.config.forecast_step_minutes)?)?;
    let sites = self.list_client_sites(client_id).await?;
    tracing::debug!(%client_id, sites = sites.len(), "client forecast fan-out");

    let forecasts = try_join_all(
      sites
        .iter()
        .map(|site| self.site_forecast_known(site.site_id, window, horizon_minutes)),
    )
    .await?;

    let series: Vec<SiteSeries> = forecasts
      .into_iter()
      .map(|f| SiteSeries { site_id: f.site_id, points: f.values })
      .collect();
    Ok(aggregate(&series, &spec))
  }

  // ── Generation ────────────────────────────────────────────────────────────

  /// Client-level generation bucketed at `bucket_width`, or the configured
  /// default width when `None`.
  pub async fn get_client_generation(
    &self,
    client_id: Uuid,
    window: TimeWindow,
    bucket_width: Option<Duration>,
  ) -> Result<Vec<AggregatePoint>> {
    let width = match bucket_width {
      Some(width) => width,
      None => minutes(self.config.generation_bucket_minutes)?,
    };
    let spec = self.config.bucket_spec(width)?;
    let sites = self.list_client_sites(client_id).await?;
    tracing::debug!(%client_id, sites = sites.len(), "client generation fan-out");

    let series = try_join_all(sites.iter().map(|site| async move {
      let samples = self
        .store
        .list_generation(site.site_id, window)
        .await
        .map_err(Error::store)?;
      Ok::<_, Error>(SiteSeries::from((site.site_id, samples.as_slice())))
    }))
    .await?;

    Ok(aggregate(&series, &spec))
  }

  // ── Per-site batches ──────────────────────────────────────────────────────

  /// Combined forecast per site: the `horizon_minutes`-ahead curve over
  /// `window` followed by the latest run's values, with values shared by
  /// both counted once. Sites without any forecast are omitted.
  pub async fn forecasts_by_sites(
    &self,
    site_ids: &[Uuid],
    window: TimeWindow,
    horizon_minutes: i32,
  ) -> Result<Vec<SiteForecast>> {
    let sites = try_join_all(site_ids.iter().map(|&id| self.require_site(id))).await?;

    let forecasts = try_join_all(sites.iter().map(|site| async move {
      let resolution = self.resolve_known(site.site_id, window).await?;
      Ok::<_, Error>(combined_forecast(site.site_id, &resolution, window, horizon_minutes))
    }))
    .await?;

    Ok(forecasts.into_iter().flatten().collect())
  }

  /// Raw generation per site over `window`. Sites without samples are
  /// omitted.
  pub async fn generation_by_sites(
    &self,
    site_ids: &[Uuid],
    window: TimeWindow,
  ) -> Result<Vec<SiteGeneration>> {
    let sites = try_join_all(site_ids.iter().map(|&id| self.require_site(id))).await?;

    let per_site = try_join_all(sites.iter().map(|site| async move {
      let samples = self
        .store
        .list_generation(site.site_id, window)
        .await
        .map_err(Error::store)?;
      Ok::<_, Error>(SiteGeneration {
        site_id:          site.site_id,
        pv_actual_values: SiteSeries::from((site.site_id, samples.as_slice())).points,
      })
    }))
    .await?;

    Ok(
      per_site
        .into_iter()
        .filter(|g| !g.pv_actual_values.is_empty())
        .collect(),
    )
  }
}

/// A configured width in minutes; widths chrono cannot hold are rejected.
fn minutes(m: i64) -> Result<Duration> {
  Duration::try_minutes(m).ok_or(Error::InvalidBucketWidth(m.saturating_mul(60)))
}

/// Past horizon curve plus the latest run, de-duplicated by value id.
fn combined_forecast(
  site_id: Uuid,
  resolution: &Resolution,
  window: TimeWindow,
  horizon_minutes: i32,
) -> Option<SiteForecast> {
  let latest = resolution.latest()?;

  let past = resolution
    .runs()
    .iter()
    .filter_map(|run| index(run).get(horizon_minutes))
    .filter(|v| window.contains(v.start_utc));

  let mut seen: HashSet<i64> = HashSet::new();
  let mut values: Vec<&ForecastValue> = past
    .chain(latest.values.iter())
    .filter(|v| seen.insert(v.forecast_value_id))
    .collect();
  values.sort_by_key(|v| (v.start_utc, v.forecast_value_id));

  Some(SiteForecast {
    site_id,
    forecast_id: Some(latest.forecast_id),
    forecast_version: Some(latest.forecast_version.clone()),
    forecast_creation_datetime: Some(latest.timestamp_utc),
    values: values
      .into_iter()
      .map(|v| SeriesPoint::new(v.start_utc, v.forecast_power_kw))
      .collect(),
  })
}
