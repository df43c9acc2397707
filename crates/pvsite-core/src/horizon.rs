//! Horizon indexing of resolved forecast runs.

use std::collections::BTreeMap;

use crate::{
  forecast::{ForecastRun, ForecastValue},
  resolve::Resolution,
  series::SeriesPoint,
};

/// The values of one run keyed by `horizon_minutes`.
#[derive(Debug, Clone, Default)]
pub struct HorizonIndex<'a> {
  by_horizon: BTreeMap<i32, &'a ForecastValue>,
}

impl<'a> HorizonIndex<'a> {
  pub fn get(&self, horizon_minutes: i32) -> Option<&'a ForecastValue> {
    self.by_horizon.get(&horizon_minutes).copied()
  }

  /// Horizons present in the run, ascending.
  pub fn horizons(&self) -> impl Iterator<Item = i32> + '_ {
    self.by_horizon.keys().copied()
  }

  pub fn len(&self) -> usize { self.by_horizon.len() }

  pub fn is_empty(&self) -> bool { self.by_horizon.is_empty() }
}

/// Index a run's values by horizon.
///
/// Horizons are unique within a well-formed run; if a malformed run repeats
/// one, the value with the greatest `forecast_value_id` is kept.
pub fn index(run: &ForecastRun) -> HorizonIndex<'_> {
  let mut by_horizon: BTreeMap<i32, &ForecastValue> = BTreeMap::new();
  for value in &run.values {
    let slot = by_horizon.entry(value.horizon_minutes).or_insert(value);
    if slot.forecast_value_id != value.forecast_value_id {
      tracing::warn!(
        forecast_id = run.forecast_id,
        horizon_minutes = value.horizon_minutes,
        "forecast run repeats a horizon"
      );
      if value.forecast_value_id > slot.forecast_value_id {
        *slot = value;
      }
    }
  }
  HorizonIndex { by_horizon }
}

/// The `horizon_minutes`-ahead forecast curve across the resolved runs.
///
/// Runs lacking that horizon are skipped, so the curve may be sparse. An
/// unknown horizon yields an empty curve.
pub fn curve_for_horizon(resolution: &Resolution, horizon_minutes: i32) -> Vec<SeriesPoint> {
  let mut curve: Vec<SeriesPoint> = resolution
    .runs()
    .iter()
    .filter_map(|run| index(run).get(horizon_minutes))
    .map(|v| SeriesPoint::new(v.start_utc, v.forecast_power_kw))
    .collect();
  curve.sort_by_key(|p| p.timestamp_utc);
  curve
}

/// The full value set of the most recently issued resolved run, regardless of
/// horizon. Empty if nothing was resolved.
pub fn latest_curve(resolution: &Resolution) -> Vec<SeriesPoint> {
  resolution
    .latest()
    .map(|run| {
      let mut values: Vec<&ForecastValue> = run.values.iter().collect();
      values.sort_by_key(|v| (v.start_utc, v.forecast_value_id));
      values
        .into_iter()
        .map(|v| SeriesPoint::new(v.start_utc, v.forecast_power_kw))
        .collect()
    })
    .unwrap_or_default()
}
