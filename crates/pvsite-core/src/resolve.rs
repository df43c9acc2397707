//! Forecast resolution: one winning run per issue timestamp.
//!
//! A site may hold several runs issued at the same instant (re-runs). The run
//! with the greatest `forecast_id`, i.e. the one inserted last, wins and every
//! other run sharing its timestamp is shadowed together with all of its
//! values.

use std::collections::{BTreeMap, btree_map::Entry};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{forecast::ForecastRun, window::TimeWindow};

/// The winning runs for a site and window, ascending by issue timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
  runs: Vec<ForecastRun>,
}

impl Resolution {
  pub fn runs(&self) -> &[ForecastRun] { &self.runs }

  pub fn into_runs(self) -> Vec<ForecastRun> { self.runs }

  /// `(issue timestamp, chosen forecast_id)` pairs in ascending order.
  pub fn selections(&self) -> impl Iterator<Item = (DateTime<Utc>, i64)> + '_ {
    self.runs.iter().map(|r| (r.timestamp_utc, r.forecast_id))
  }

  /// The most recently issued winning run.
  pub fn latest(&self) -> Option<&ForecastRun> { self.runs.last() }

  pub fn len(&self) -> usize { self.runs.len() }

  pub fn is_empty(&self) -> bool { self.runs.is_empty() }
}

/// Select one run per distinct `timestamp_utc` among `runs`.
///
/// Runs of other sites and runs with no value overlapping `window` are
/// ignored. Never fails: no matching runs yields an empty [`Resolution`].
pub fn resolve(
  site_id: Uuid,
  runs: impl IntoIterator<Item = ForecastRun>,
  window: &TimeWindow,
) -> Resolution {
  let mut winners: BTreeMap<DateTime<Utc>, ForecastRun> = BTreeMap::new();

  for run in runs {
    if run.site_id != site_id || !run.intersects(window) {
      continue;
    }
    match winners.entry(run.timestamp_utc) {
      Entry::Vacant(slot) => {
        slot.insert(run);
      }
      Entry::Occupied(mut slot) => {
        let (winner, shadowed) = if run.forecast_id > slot.get().forecast_id {
          (run.forecast_id, slot.insert(run).forecast_id)
        } else {
          (slot.get().forecast_id, run.forecast_id)
        };
        tracing::debug!(
          %site_id,
          issued_at = %slot.key(),
          winner,
          shadowed,
          "duplicate forecast run shadowed"
        );
      }
    }
  }

  Resolution { runs: winners.into_values().collect() }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;
  use crate::forecast::ForecastValue;

  fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
  }

  fn run(site_id: Uuid, forecast_id: i64, issued: DateTime<Utc>, steps: i32) -> ForecastRun {
    let values = (0..steps)
      .map(|i| ForecastValue {
        forecast_value_id: forecast_id * 100 + i64::from(i),
        forecast_id,
        start_utc: issued + Duration::minutes(15 * i64::from(i)),
        end_utc: issued + Duration::minutes(15 * i64::from(i) + 15),
        horizon_minutes: 15 * i,
        forecast_power_kw: f64::from(i),
      })
      .collect();
    ForecastRun {
      forecast_id,
      site_id,
      forecast_version: "0.0.0".into(),
      timestamp_utc: issued,
      values,
    }
  }

  fn wide() -> TimeWindow {
    TimeWindow::new(t0() - Duration::days(1), t0() + Duration::days(1)).unwrap()
  }

  #[test]
  fn duplicate_timestamp_keeps_latest_inserted() {
    let site = Uuid::new_v4();
    let runs = vec![run(site, 7, t0(), 3), run(site, 3, t0(), 3), run(site, 5, t0(), 3)];

    let res = resolve(site, runs, &wide());
    assert_eq!(res.len(), 1);
    assert_eq!(res.selections().collect::<Vec<_>>(), [(t0(), 7)]);
    assert!(res.runs()[0].values.iter().all(|v| v.forecast_id == 7));
  }

  #[test]
  fn output_is_ascending_by_issue_time() {
    let site = Uuid::new_v4();
    let runs = vec![
      run(site, 1, t0() + Duration::minutes(20), 2),
      run(site, 2, t0(), 2),
      run(site, 3, t0() + Duration::minutes(10), 2),
    ];

    let res = resolve(site, runs, &wide());
    let issued: Vec<_> = res.selections().map(|(ts, _)| ts).collect();
    assert_eq!(
      issued,
      [t0(), t0() + Duration::minutes(10), t0() + Duration::minutes(20)]
    );
    assert_eq!(res.latest().unwrap().forecast_id, 1);
  }

  #[test]
  fn ignores_other_sites_and_runs_outside_window() {
    let site = Uuid::new_v4();
    let other = Uuid::new_v4();
    let window = TimeWindow::new(t0(), t0() + Duration::hours(1)).unwrap();

    let runs = vec![
      run(other, 1, t0(), 4),
      // Last value ends exactly at the window start.
      run(site, 2, t0() - Duration::minutes(60), 4),
      run(site, 3, t0() - Duration::minutes(30), 4),
    ];

    let res = resolve(site, runs, &window);
    assert_eq!(res.selections().map(|(_, id)| id).collect::<Vec<_>>(), [3]);
  }

  #[test]
  fn no_runs_is_empty_not_error() {
    let res = resolve(Uuid::new_v4(), Vec::new(), &wide());
    assert!(res.is_empty());
    assert!(res.latest().is_none());
  }

  #[test]
  fn resolve_is_deterministic_under_input_order() {
    let site = Uuid::new_v4();
    let runs = vec![run(site, 4, t0(), 2), run(site, 9, t0(), 2), run(site, 6, t0(), 2)];
    let mut reversed = runs.clone();
    reversed.reverse();

    assert_eq!(resolve(site, runs, &wide()), resolve(site, reversed, &wide()));
  }
}
