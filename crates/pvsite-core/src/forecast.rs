//! Forecast runs and the values they predict.
//!
//! A run is issued at `timestamp_utc` and predicts a sequence of fixed-width
//! intervals. Each value is indexed both by the interval it predicts and by
//! its horizon, the offset from the issue time to the interval start. Runs are
//! never edited; a newer run supersedes an older one at query time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, window::TimeWindow};

// ─── Stored types ────────────────────────────────────────────────────────────

/// One predicted interval of a [`ForecastRun`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastValue {
  /// Store-assigned, strictly increasing.
  pub forecast_value_id: i64,
  pub forecast_id:       i64,
  pub start_utc:         DateTime<Utc>,
  pub end_utc:           DateTime<Utc>,
  /// Minutes from the run's issue time to `start_utc`.
  pub horizon_minutes:   i32,
  pub forecast_power_kw: f64,
}

/// A forecast issued for one site at one instant, with all of its values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRun {
  /// Store-assigned, strictly increasing: a greater id was inserted later.
  pub forecast_id:      i64,
  pub site_id:          Uuid,
  pub forecast_version: String,
  /// When the run was issued.
  pub timestamp_utc:    DateTime<Utc>,
  /// Ordered by `start_utc`.
  pub values:           Vec<ForecastValue>,
}

impl ForecastRun {
  /// Whether any value's interval overlaps `window`.
  pub fn intersects(&self, window: &TimeWindow) -> bool {
    self
      .values
      .iter()
      .any(|v| window.intersects(v.start_utc, v.end_utc))
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// A value to be written as part of a [`NewForecastRun`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewForecastValue {
  pub start_utc:         DateTime<Utc>,
  pub end_utc:           DateTime<Utc>,
  pub horizon_minutes:   i32,
  pub forecast_power_kw: f64,
}

/// Input to [`crate::store::SiteStore::record_forecast`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewForecastRun {
  pub site_id:          Uuid,
  pub forecast_version: String,
  pub timestamp_utc:    DateTime<Utc>,
  pub values:           Vec<NewForecastValue>,
}

impl NewForecastRun {
  /// Build a run whose `i`-th value starts `i * step` after `timestamp_utc`
  /// and predicts `powers_kw[i]`.
  ///
  /// Values from the first one whose interval cannot be represented onwards
  /// are left out. A horizon too large for `i32` saturates, which
  /// [`NewForecastRun::validate`] then rejects.
  pub fn stepped(
    site_id: Uuid,
    forecast_version: impl Into<String>,
    timestamp_utc: DateTime<Utc>,
    step: Duration,
    powers_kw: &[f64],
  ) -> Self {
    let values = powers_kw
      .iter()
      .zip(0i32..)
      .map_while(|(&power, i)| {
        let offset = step.checked_mul(i)?;
        let start_utc = timestamp_utc.checked_add_signed(offset)?;
        let end_utc = start_utc.checked_add_signed(step)?;
        Some(NewForecastValue {
          start_utc,
          end_utc,
          horizon_minutes: i32::try_from(offset.num_minutes()).unwrap_or(i32::MAX),
          forecast_power_kw: power,
        })
      })
      .collect();

    Self {
      site_id,
      forecast_version: forecast_version.into(),
      timestamp_utc,
      values,
    }
  }

  /// Check the per-value invariants: positive duration shared by every
  /// value of the run, and `horizon_minutes == start_utc - timestamp_utc`.
  pub fn validate(&self) -> Result<()> {
    let mut step: Option<Duration> = None;

    for v in &self.values {
      let duration = v.end_utc - v.start_utc;
      if duration <= Duration::zero() {
        return Err(Error::InvalidForecastValue(format!(
          "interval [{}, {}) is empty",
          v.start_utc, v.end_utc
        )));
      }
      match step {
        None => step = Some(duration),
        Some(s) if s != duration => {
          return Err(Error::InvalidForecastValue(format!(
            "value at {} lasts {} minutes, run step is {} minutes",
            v.start_utc,
            duration.num_minutes(),
            s.num_minutes()
          )));
        }
        Some(_) => {}
      }

      let offset = v.start_utc - self.timestamp_utc;
      if offset != Duration::minutes(i64::from(v.horizon_minutes)) {
        return Err(Error::InvalidForecastValue(format!(
          "value at {} has horizon {} but starts {} minutes after issue",
          v.start_utc,
          v.horizon_minutes,
          offset.num_minutes()
        )));
      }

      if !v.forecast_power_kw.is_finite() {
        return Err(Error::InvalidForecastValue(format!(
          "value at {} has non-finite power",
          v.start_utc
        )));
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn issue() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
  }

  #[test]
  fn stepped_builds_consistent_horizons() {
    let run = NewForecastRun::stepped(
      Uuid::nil(),
      "0.0.0",
      issue(),
      Duration::minutes(15),
      &[0.0, 1.0, 2.0],
    );
    assert!(run.validate().is_ok());

    let horizons: Vec<i32> = run.values.iter().map(|v| v.horizon_minutes).collect();
    assert_eq!(horizons, [0, 15, 30]);
    assert_eq!(run.values[2].start_utc, issue() + Duration::minutes(30));
    assert_eq!(run.values[2].end_utc, issue() + Duration::minutes(45));
  }

  #[test]
  fn stepped_saturates_oversized_horizons() {
    let site = Uuid::new_v4();
    let run = NewForecastRun::stepped(site, "0.0.0", issue(), Duration::days(1_500_000), &[1.0, 2.0]);
    assert_eq!(run.values.len(), 2);
    assert_eq!(run.values[1].horizon_minutes, i32::MAX);
    assert!(matches!(run.validate(), Err(Error::InvalidForecastValue(_))));
  }

  #[test]
  fn validate_rejects_wrong_horizon() {
    let mut run = NewForecastRun::stepped(
      Uuid::nil(),
      "0.0.0",
      issue(),
      Duration::minutes(15),
      &[0.0, 1.0],
    );
    run.values[1].horizon_minutes = 20;
    assert!(matches!(run.validate(), Err(Error::InvalidForecastValue(_))));
  }

  #[test]
  fn validate_rejects_mixed_steps() {
    let mut run = NewForecastRun::stepped(
      Uuid::nil(),
      "0.0.0",
      issue(),
      Duration::minutes(15),
      &[0.0, 1.0],
    );
    run.values[1].end_utc += Duration::minutes(5);
    assert!(matches!(run.validate(), Err(Error::InvalidForecastValue(_))));
  }

  #[test]
  fn empty_run_is_valid() {
    let run = NewForecastRun::stepped(
      Uuid::nil(),
      "0.0.0",
      issue(),
      Duration::minutes(15),
      &[],
    );
    assert!(run.validate().is_ok());
  }
}
