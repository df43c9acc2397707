//! `GET /forecasts`: combined forecasts for a batch of sites.
//!
//! Each site's entry is its `horizon_minutes`-ahead curve over the window
//! followed by the latest run's values. Sites with no forecast are left out.

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{DateTime, Utc};
use pvsite_core::{engine::Engine, series::SiteForecast, store::SiteStore};
use serde::Deserialize;

use crate::{error::ApiError, params};

#[derive(Debug, Deserialize)]
pub struct BatchParams {
  pub site_ids:        String,
  pub start_utc:       Option<DateTime<Utc>>,
  pub end_utc:         Option<DateTime<Utc>>,
  #[serde(default)]
  pub horizon_minutes: i32,
}

/// `GET /forecasts?site_ids=<uuid>,<uuid>[&horizon_minutes=<n>]`
pub async fn handler<S: SiteStore + 'static>(
  State(engine): State<Engine<S>>,
  Query(params): Query<BatchParams>,
) -> Result<Json<Vec<SiteForecast>>, ApiError> {
  let site_ids = params::site_ids(&params.site_ids)?;
  let window = params::window(params.start_utc, params.end_utc)?;

  let forecasts = engine
    .forecasts_by_sites(&site_ids, window, params.horizon_minutes)
    .await?;
  tracing::info!(
    requested = site_ids.len(),
    returned = forecasts.len(),
    "batch forecasts"
  );
  Ok(Json(forecasts))
}
