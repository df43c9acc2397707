//! The `SiteStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `pvsite-store-sqlite`
//! and [`crate::memory::MemoryStore`]). The query engine and the API depend on
//! this abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  forecast::{ForecastRun, NewForecastRun},
  generation::{GenerationSample, NewGeneration},
  site::{Client, NewSite, Site},
  window::TimeWindow,
};

/// Abstraction over a PV site store backend.
///
/// Generation samples and forecast runs are append-only facts. Nothing in this
/// trait deletes or edits them; a newer forecast run only shadows an older one
/// when queried.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait SiteStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Clients ───────────────────────────────────────────────────────────

  /// Create and persist a new client.
  fn add_client(
    &self,
    client_name: String,
  ) -> impl Future<Output = Result<Client, Self::Error>> + Send + '_;

  /// Rename a client. Returns `None` if it does not exist.
  fn rename_client(
    &self,
    client_id: Uuid,
    client_name: String,
  ) -> impl Future<Output = Result<Option<Client>, Self::Error>> + Send + '_;

  /// Retrieve a client by id. Returns `None` if not found.
  fn get_client(
    &self,
    client_id: Uuid,
  ) -> impl Future<Output = Result<Option<Client>, Self::Error>> + Send + '_;

  // ── Sites ─────────────────────────────────────────────────────────────

  /// Create and persist a site.
  ///
  /// Returns an error if the client does not exist or already has a site
  /// with the same `client_site_id`.
  fn add_site(
    &self,
    input: NewSite,
  ) -> impl Future<Output = Result<Site, Self::Error>> + Send + '_;

  /// Retrieve a site by id. Returns `None` if not found.
  fn get_site(
    &self,
    site_id: Uuid,
  ) -> impl Future<Output = Result<Option<Site>, Self::Error>> + Send + '_;

  /// All sites of a client, ordered by `client_site_id`. Empty for an unknown
  /// client; callers that care check [`SiteStore::get_client`] first.
  fn list_sites(
    &self,
    client_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Site>, Self::Error>> + Send + '_;

  // ── Ingestion ─────────────────────────────────────────────────────────

  /// Record generation samples for a site. A sample whose `start_utc`
  /// matches an existing sample of the same site replaces it.
  fn record_generation(
    &self,
    site_id: Uuid,
    samples: Vec<NewGeneration>,
  ) -> impl Future<Output = Result<Vec<GenerationSample>, Self::Error>> + Send + '_;

  /// Record a forecast run with its values. Ids are assigned by the store.
  fn record_forecast(
    &self,
    input: NewForecastRun,
  ) -> impl Future<Output = Result<ForecastRun, Self::Error>> + Send + '_;

  // ── Range reads ───────────────────────────────────────────────────────

  /// Generation samples of a site whose `start_utc` lies in `window`,
  /// ascending by `start_utc`.
  fn list_generation(
    &self,
    site_id: Uuid,
    window: TimeWindow,
  ) -> impl Future<Output = Result<Vec<GenerationSample>, Self::Error>> + Send + '_;

  /// Forecast runs of a site with at least one value overlapping `window`,
  /// each with all of its values, ascending by `(timestamp_utc, forecast_id)`.
  fn list_forecast_runs(
    &self,
    site_id: Uuid,
    window: TimeWindow,
  ) -> impl Future<Output = Result<Vec<ForecastRun>, Self::Error>> + Send + '_;
}
