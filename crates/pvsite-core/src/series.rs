//! Plain ordered series returned by the query engine.
//!
//! These are transport-agnostic; the API layer serialises them as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::generation::GenerationSample;

/// One timestamped power reading or prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
  pub timestamp_utc: DateTime<Utc>,
  pub power_kw:      f64,
}

impl SeriesPoint {
  pub fn new(timestamp_utc: DateTime<Utc>, power_kw: f64) -> Self {
    Self { timestamp_utc, power_kw }
  }
}

/// A single site's series, the unit of input to [`crate::aggregate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSeries {
  pub site_id: Uuid,
  pub points:  Vec<SeriesPoint>,
}

impl From<(Uuid, &[GenerationSample])> for SiteSeries {
  fn from((site_id, samples): (Uuid, &[GenerationSample])) -> Self {
    Self {
      site_id,
      points: samples
        .iter()
        .map(|s| SeriesPoint::new(s.start_utc, s.generation_power_kw))
        .collect(),
    }
  }
}

/// One bucket of a client-level series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatePoint {
  pub bucket_start: DateTime<Utc>,
  pub power_kw:     f64,
  /// Number of distinct sites with data in this bucket. Distinguishes zero
  /// generation from missing data.
  pub site_count:   usize,
}

/// A site's forecast together with the run that produced it.
///
/// In horizon mode the run metadata describes the most recently issued of the
/// runs that contributed points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteForecast {
  pub site_id:                    Uuid,
  pub forecast_id:                Option<i64>,
  pub forecast_version:           Option<String>,
  pub forecast_creation_datetime: Option<DateTime<Utc>>,
  pub values:                     Vec<SeriesPoint>,
}

impl SiteForecast {
  pub fn empty(site_id: Uuid) -> Self {
    Self {
      site_id,
      forecast_id: None,
      forecast_version: None,
      forecast_creation_datetime: None,
      values: Vec::new(),
    }
  }
}

/// Raw generation samples for one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteGeneration {
  pub site_id:          Uuid,
  pub pv_actual_values: Vec<SeriesPoint>,
}
