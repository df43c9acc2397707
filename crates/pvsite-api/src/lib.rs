//! JSON REST API for PV site forecasts and generation.
//!
//! Exposes an axum [`Router`] backed by an [`Engine`] over any
//! [`pvsite_core::store::SiteStore`]. Auth, TLS, and transport concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", pvsite_api::api_router(engine.clone()))
//! ```

pub mod clients;
pub mod error;
pub mod forecasts;
pub mod params;
pub mod sites;

use axum::{Json, Router, routing::get};
use pvsite_core::{engine::Engine, store::SiteStore};
use serde_json::{Value, json};

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S: SiteStore + 'static>(engine: Engine<S>) -> Router<()> {
  Router::new()
    .route("/status", get(status))
    // Clients
    .route("/clients/{id}/sites", get(clients::sites::<S>))
    .route("/clients/{id}/forecast", get(clients::forecast::<S>))
    .route("/clients/{id}/generation", get(clients::generation::<S>))
    // Sites
    .route("/sites/{id}/forecast", get(sites::forecast::<S>))
    .route(
      "/sites/{id}/pv_actual",
      get(sites::list_actuals::<S>).post(sites::post_actuals::<S>),
    )
    // Batches
    .route("/forecasts", get(forecasts::handler::<S>))
    .with_state(engine)
}

/// `GET /status`
async fn status() -> Json<Value> {
  Json(json!({ "status": "ok", "message": "The PV site API is running" }))
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use chrono::{DateTime, Duration, TimeZone, Utc};
  use pvsite_core::{
    engine::EngineConfig,
    forecast::{ForecastRun, NewForecastRun},
    generation::{GenerationSample, NewGeneration},
    memory::{MemoryError, MemoryStore},
    site::{Client, NewSite, Site},
    window::TimeWindow,
  };
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
  }

  fn q(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
  }

  /// A client with two sites; each site has ten one-minute samples of `i` kW
  /// from `now()` and one forecast run issued at `now()`.
  async fn seeded() -> (MemoryStore, Client, Vec<Site>) {
    let store = MemoryStore::new();
    let client = store.add_client("api_client".into()).await.unwrap();
    let mut sites = Vec::new();
    for local in 0..2 {
      let site = store
        .add_site(NewSite::new(client.client_id, local, 4.0))
        .await
        .unwrap();
      let samples = (0..10)
        .map(|i| NewGeneration {
          start_utc:           now() + Duration::minutes(i),
          end_utc:             now() + Duration::minutes(i + 1),
          generation_power_kw: i as f64,
        })
        .collect();
      store.record_generation(site.site_id, samples).await.unwrap();
      store
        .record_forecast(NewForecastRun::stepped(
          site.site_id,
          "0.0.1",
          now(),
          Duration::minutes(15),
          &[1.0, 2.0, 3.0],
        ))
        .await
        .unwrap();
      sites.push(site);
    }
    (store, client, sites)
  }

  async fn call(store: &MemoryStore, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let engine = Engine::new(Arc::new(store.clone()), EngineConfig::default());
    send(engine, method, uri, body).await
  }

  async fn send<S: SiteStore + 'static>(
    engine: Engine<S>,
    method: &str,
    uri:    &str,
    body:   Option<Value>,
  ) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
      Some(v) => builder
        .header("content-type", "application/json")
        .body(Body::from(v.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    let resp = api_router(engine).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
  }

  fn range() -> String {
    format!("start_utc={}&end_utc={}", q(now()), q(now() + Duration::hours(1)))
  }

  // ── Status ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn status_reports_ok() {
    let (status, body) = call(&MemoryStore::new(), "GET", "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
  }

  // ── Clients ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn client_sites_lists_metadata() {
    let (store, client, _) = seeded().await;
    let (status, body) = call(&store, "GET", &format!("/clients/{}/sites", client.client_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["client_site_id"], 0);
  }

  #[tokio::test]
  async fn unknown_client_is_404() {
    let (store, _, _) = seeded().await;
    let uri = format!("/clients/{}/generation?{}", Uuid::new_v4(), range());
    let (status, body) = call(&store, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("client not found"));
  }

  #[tokio::test]
  async fn client_generation_buckets_across_sites() {
    let (store, client, _) = seeded().await;
    let uri = format!(
      "/clients/{}/generation?{}&bucket_minutes=5",
      client.client_id,
      range()
    );
    let (status, body) = call(&store, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let buckets = body.as_array().unwrap();
    assert_eq!(buckets.len(), 2);
    // 0+1+2+3+4 per site, summed over two sites.
    assert_eq!(buckets[0]["power_kw"], 20.0);
    assert_eq!(buckets[0]["site_count"], 2);
    assert_eq!(buckets[1]["power_kw"], 70.0);
  }

  #[tokio::test]
  async fn client_generation_rejects_zero_bucket() {
    let (store, client, _) = seeded().await;
    let uri = format!("/clients/{}/generation?{}&bucket_minutes=0", client.client_id, range());
    let (status, _) = call(&store, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn client_generation_rejects_out_of_range_bucket() {
    let (store, client, _) = seeded().await;
    let uri = format!(
      "/clients/{}/generation?{}&bucket_minutes=200000000000000",
      client.client_id,
      range()
    );
    let (status, body) = call(&store, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("bucket_minutes"));
  }

  #[tokio::test]
  async fn client_forecast_rejects_inverted_window() {
    let (store, client, _) = seeded().await;
    let uri = format!(
      "/clients/{}/forecast?start_utc={}&end_utc={}",
      client.client_id,
      q(now()),
      q(now() - Duration::hours(1))
    );
    let (status, body) = call(&store, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid window"));
  }

  // ── Sites ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn site_forecast_returns_latest_run() {
    let (store, _, sites) = seeded().await;
    let uri = format!("/sites/{}/forecast?{}", sites[0].site_id, range());
    let (status, body) = call(&store, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["forecast_version"], "0.0.1");
    assert_eq!(body["values"].as_array().unwrap().len(), 3);
  }

  #[tokio::test]
  async fn site_forecast_rejects_inverted_window() {
    let (store, _, sites) = seeded().await;
    let uri = format!(
      "/sites/{}/forecast?start_utc={}&end_utc={}",
      sites[0].site_id,
      q(now()),
      q(now())
    );
    let (status, _) = call(&store, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn unknown_site_is_404() {
    let (store, _, _) = seeded().await;
    let uri = format!("/sites/{}/forecast?{}", Uuid::new_v4(), range());
    let (status, _) = call(&store, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn posted_actuals_are_readable() {
    let (store, _, sites) = seeded().await;
    let site_id = sites[0].site_id;
    let later = now() + Duration::minutes(30);

    let body = json!([
      { "start_utc": q(later), "generation_kw": 1.5 },
      { "start_utc": q(later + Duration::minutes(5)), "generation_kw": 2.5 },
    ]);
    let (status, created) = call(&store, "POST", &format!("/sites/{site_id}/pv_actual"), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["pv_actual_values"].as_array().unwrap().len(), 2);

    let uri = format!("/sites/{site_id}/pv_actual?{}", range());
    let (status, listed) = call(&store, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["pv_actual_values"].as_array().unwrap().len(), 12);
  }

  #[tokio::test]
  async fn negative_actuals_are_bad_request() {
    let (store, _, sites) = seeded().await;
    let body = json!([{ "start_utc": q(now()), "generation_kw": -1.0 }]);
    let uri = format!("/sites/{}/pv_actual", sites[0].site_id);
    let (status, _) = call(&store, "POST", &uri, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  // ── Batches ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn batch_forecasts_cover_each_site() {
    let (store, _, sites) = seeded().await;
    let uri = format!(
      "/forecasts?site_ids={},{}&{}",
      sites[0].site_id,
      sites[1].site_id,
      range()
    );
    let (status, body) = call(&store, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn batch_forecasts_reject_bad_ids() {
    let (status, _) = call(&MemoryStore::new(), "GET", "/forecasts?site_ids=nope", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  // ── Store failures ──────────────────────────────────────────────────────────

  #[derive(Debug, thiserror::Error)]
  #[error("disk on fire")]
  struct DiskError;

  /// Delegates to a `MemoryStore` but every range read fails.
  struct FailingReads(MemoryStore);

  impl SiteStore for FailingReads {
    type Error = MemoryError;

    async fn add_client(&self, name: String) -> Result<Client, MemoryError> {
      self.0.add_client(name).await
    }

    async fn rename_client(&self, id: Uuid, name: String) -> Result<Option<Client>, MemoryError> {
      self.0.rename_client(id, name).await
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, MemoryError> {
      self.0.get_client(id).await
    }

    async fn add_site(&self, input: NewSite) -> Result<Site, MemoryError> {
      self.0.add_site(input).await
    }

    async fn get_site(&self, id: Uuid) -> Result<Option<Site>, MemoryError> {
      self.0.get_site(id).await
    }

    async fn list_sites(&self, client_id: Uuid) -> Result<Vec<Site>, MemoryError> {
      self.0.list_sites(client_id).await
    }

    async fn record_generation(
      &self,
      site_id: Uuid,
      samples: Vec<NewGeneration>,
    ) -> Result<Vec<GenerationSample>, MemoryError> {
      self.0.record_generation(site_id, samples).await
    }

    async fn record_forecast(&self, input: NewForecastRun) -> Result<ForecastRun, MemoryError> {
      self.0.record_forecast(input).await
    }

    async fn list_generation(
      &self,
      _site_id: Uuid,
      _window: TimeWindow,
    ) -> Result<Vec<GenerationSample>, MemoryError> {
      Err(pvsite_core::Error::store(DiskError).into())
    }

    async fn list_forecast_runs(
      &self,
      _site_id: Uuid,
      _window: TimeWindow,
    ) -> Result<Vec<ForecastRun>, MemoryError> {
      Err(pvsite_core::Error::store(DiskError).into())
    }
  }

  #[tokio::test]
  async fn store_failure_is_500_with_error_body() {
    let (store, client, _) = seeded().await;
    let engine = Engine::new(Arc::new(FailingReads(store)), EngineConfig::default());

    let uri = format!("/clients/{}/generation?{}", client.client_id, range());
    let (status, body) = send(engine.clone(), "GET", &uri, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("disk on fire"));

    let uri = format!("/clients/{}/forecast?{}", client.client_id, range());
    let (status, body) = send(engine, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
  }
}
