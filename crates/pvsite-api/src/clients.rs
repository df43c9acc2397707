//! Handlers for `/clients` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/clients/:id/sites` | 404 if the client is unknown |
//! | `GET`  | `/clients/:id/forecast` | `start_utc`, `end_utc`, optional `horizon_minutes` |
//! | `GET`  | `/clients/:id/generation` | `start_utc`, `end_utc`, optional `bucket_minutes` |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Duration, Utc};
use pvsite_core::{engine::Engine, series::AggregatePoint, site::Site, store::SiteStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, params};

/// `GET /clients/:id/sites`
pub async fn sites<S: SiteStore + 'static>(
  State(engine): State<Engine<S>>,
  Path(client_id): Path<Uuid>,
) -> Result<Json<Vec<Site>>, ApiError> {
  Ok(Json(engine.list_client_sites(client_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ForecastParams {
  pub start_utc:       Option<DateTime<Utc>>,
  pub end_utc:         Option<DateTime<Utc>>,
  pub horizon_minutes: Option<i32>,
}

/// `GET /clients/:id/forecast`
pub async fn forecast<S: SiteStore + 'static>(
  State(engine): State<Engine<S>>,
  Path(client_id): Path<Uuid>,
  Query(params): Query<ForecastParams>,
) -> Result<Json<Vec<AggregatePoint>>, ApiError> {
  let window = params::window(params.start_utc, params.end_utc)?;
  let points = engine
    .get_client_forecast(client_id, window, params.horizon_minutes)
    .await?;
  tracing::info!(%client_id, buckets = points.len(), "client forecast");
  Ok(Json(points))
}

#[derive(Debug, Deserialize)]
pub struct GenerationParams {
  pub start_utc:      Option<DateTime<Utc>>,
  pub end_utc:        Option<DateTime<Utc>>,
  pub bucket_minutes: Option<i64>,
}

/// `GET /clients/:id/generation`
pub async fn generation<S: SiteStore + 'static>(
  State(engine): State<Engine<S>>,
  Path(client_id): Path<Uuid>,
  Query(params): Query<GenerationParams>,
) -> Result<Json<Vec<AggregatePoint>>, ApiError> {
  let window = params::window(params.start_utc, params.end_utc)?;
  let bucket_width = params
    .bucket_minutes
    .map(|m| {
      Duration::try_minutes(m)
        .ok_or_else(|| ApiError::BadRequest(format!("bucket_minutes out of range: {m}")))
    })
    .transpose()?;
  let points = engine
    .get_client_generation(client_id, window, bucket_width)
    .await?;
  tracing::info!(%client_id, buckets = points.len(), "client generation");
  Ok(Json(points))
}
