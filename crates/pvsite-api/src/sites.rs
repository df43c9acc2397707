//! Handlers for `/sites` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/sites/:id/forecast` | `start_utc`, `end_utc`, optional `horizon_minutes` |
//! | `GET`  | `/sites/:id/pv_actual` | `start_utc`, `end_utc` |
//! | `POST` | `/sites/:id/pv_actual` | Body: `[{"start_utc":..,"generation_kw":..}]` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Duration, Utc};
use pvsite_core::{
  engine::Engine,
  generation::NewGeneration,
  series::{SeriesPoint, SiteForecast, SiteGeneration},
  store::SiteStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, params};

/// Length of a posted sample when the caller gives no end time.
const DEFAULT_SAMPLE_MINUTES: i64 = 5;

// ─── Forecast ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ForecastParams {
  pub start_utc:       Option<DateTime<Utc>>,
  pub end_utc:         Option<DateTime<Utc>>,
  pub horizon_minutes: Option<i32>,
}

/// `GET /sites/:id/forecast`
pub async fn forecast<S: SiteStore + 'static>(
  State(engine): State<Engine<S>>,
  Path(site_id): Path<Uuid>,
  Query(params): Query<ForecastParams>,
) -> Result<Json<SiteForecast>, ApiError> {
  let window = params::window(params.start_utc, params.end_utc)?;
  let forecast = engine
    .get_site_forecast(site_id, window, params.horizon_minutes)
    .await?;
  tracing::debug!(%site_id, values = forecast.values.len(), "site forecast");
  Ok(Json(forecast))
}

// ─── Actuals ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActualParams {
  pub start_utc: Option<DateTime<Utc>>,
  pub end_utc:   Option<DateTime<Utc>>,
}

/// `GET /sites/:id/pv_actual`
pub async fn list_actuals<S: SiteStore + 'static>(
  State(engine): State<Engine<S>>,
  Path(site_id): Path<Uuid>,
  Query(params): Query<ActualParams>,
) -> Result<Json<SiteGeneration>, ApiError> {
  let window = params::window(params.start_utc, params.end_utc)?;
  let generation = engine
    .generation_by_sites(&[site_id], window)
    .await?
    .into_iter()
    .next()
    .unwrap_or(SiteGeneration { site_id, pv_actual_values: Vec::new() });
  Ok(Json(generation))
}

#[derive(Debug, Deserialize)]
pub struct PostedActual {
  pub start_utc:     DateTime<Utc>,
  pub end_utc:       Option<DateTime<Utc>>,
  pub generation_kw: f64,
}

impl From<PostedActual> for NewGeneration {
  fn from(p: PostedActual) -> Self {
    NewGeneration {
      start_utc:           p.start_utc,
      end_utc:             p
        .end_utc
        .unwrap_or(p.start_utc + Duration::minutes(DEFAULT_SAMPLE_MINUTES)),
      generation_power_kw: p.generation_kw,
    }
  }
}

/// `POST /sites/:id/pv_actual`
pub async fn post_actuals<S: SiteStore + 'static>(
  State(engine): State<Engine<S>>,
  Path(site_id): Path<Uuid>,
  Json(body): Json<Vec<PostedActual>>,
) -> Result<impl IntoResponse, ApiError> {
  engine.require_site(site_id).await?;

  let samples: Vec<NewGeneration> = body.into_iter().map(NewGeneration::from).collect();
  for sample in &samples {
    sample.validate()?;
  }

  let stored = engine
    .store()
    .record_generation(site_id, samples)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  tracing::info!(%site_id, samples = stored.len(), "recorded generation");

  let points: Vec<SeriesPoint> = stored
    .iter()
    .map(|s| SeriesPoint::new(s.start_utc, s.generation_power_kw))
    .collect();
  Ok((
    StatusCode::CREATED,
    Json(SiteGeneration { site_id, pv_actual_values: points }),
  ))
}
