//! Fan-in of per-site series into one client-level series.
//!
//! Every point is assigned to a fixed-width, half-open bucket aligned to an
//! origin. Within a bucket each site's points are first reduced to a single
//! value, then sites are summed. Sites without data in a bucket do not
//! contribute, and buckets nobody contributed to are omitted.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  series::{AggregatePoint, SiteSeries},
};

/// How one site's several points inside a bucket become one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteReduction {
  /// Plain sum of the site's points, so a bucket holds the sum of every
  /// value that falls in it.
  #[default]
  Sum,
  /// Average power over the site's points. Opt-in for kW readings sampled
  /// more often than the bucket width.
  Mean,
}

/// Bucket geometry for [`aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSpec {
  width:         Duration,
  origin:        DateTime<Utc>,
  pub reduction: SiteReduction,
}

impl BucketSpec {
  /// Buckets of `width` aligned to the Unix epoch, reduced with
  /// [`SiteReduction::Sum`].
  pub fn new(width: Duration) -> Result<Self> {
    if width <= Duration::zero() {
      return Err(Error::InvalidBucketWidth(width.num_seconds()));
    }
    Ok(Self {
      width,
      origin: DateTime::UNIX_EPOCH,
      reduction: SiteReduction::default(),
    })
  }

  pub fn with_origin(mut self, origin: DateTime<Utc>) -> Self {
    self.origin = origin;
    self
  }

  pub fn with_reduction(mut self, reduction: SiteReduction) -> Self {
    self.reduction = reduction;
    self
  }

  pub fn width(&self) -> Duration { self.width }

  pub fn origin(&self) -> DateTime<Utc> { self.origin }

  /// Start of the bucket containing `t`; also correct for `t` before the
  /// origin. Saturates at the earliest representable instant.
  pub fn bucket_start(&self, t: DateTime<Utc>) -> DateTime<Utc> {
    let offset = match (self.width.num_microseconds(), (t - self.origin).num_microseconds()) {
      (Some(width_us), Some(offset_us)) => {
        Duration::microseconds(offset_us.div_euclid(width_us).saturating_mul(width_us))
      }
      // Widths or offsets beyond ~292k years; fall back to milliseconds.
      _ => {
        let width_ms = self.width.num_milliseconds().max(1);
        let offset_ms = (t - self.origin).num_milliseconds();
        Duration::try_milliseconds(offset_ms.div_euclid(width_ms).saturating_mul(width_ms))
          .unwrap_or(Duration::MIN)
      }
    };
    self
      .origin
      .checked_add_signed(offset)
      .unwrap_or(DateTime::<Utc>::MIN_UTC)
  }
}

#[derive(Default)]
struct SiteAccumulator {
  sum:   f64,
  count: usize,
}

impl SiteAccumulator {
  fn reduce(&self, reduction: SiteReduction) -> f64 {
    match reduction {
      SiteReduction::Sum => self.sum,
      SiteReduction::Mean => self.sum / self.count as f64,
    }
  }
}

/// Bucket and sum `series` into an ascending client-level series.
///
/// Sites are summed in site-id order, so the result does not depend on the
/// order of `series`. A site appearing more than once counts as one
/// contributor. Empty input yields an empty output.
pub fn aggregate(series: &[SiteSeries], spec: &BucketSpec) -> Vec<AggregatePoint> {
  let mut buckets: BTreeMap<DateTime<Utc>, BTreeMap<Uuid, SiteAccumulator>> = BTreeMap::new();

  for site in series {
    for point in &site.points {
      let acc = buckets
        .entry(spec.bucket_start(point.timestamp_utc))
        .or_default()
        .entry(site.site_id)
        .or_default();
      acc.sum += point.power_kw;
      acc.count += 1;
    }
  }

  buckets
    .into_iter()
    .filter(|(_, sites)| !sites.is_empty())
    .map(|(bucket_start, sites)| AggregatePoint {
      bucket_start,
      power_kw: sites.values().map(|acc| acc.reduce(spec.reduction)).sum(),
      site_count: sites.len(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::series::SeriesPoint;

  fn t(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, h, m, 0).unwrap()
  }

  fn five_min() -> BucketSpec { BucketSpec::new(Duration::minutes(5)).unwrap() }

  fn minute_series(site_id: Uuid, start: DateTime<Utc>, n: i64) -> SiteSeries {
    SiteSeries {
      site_id,
      points: (0..n)
        .map(|i| SeriesPoint::new(start + Duration::minutes(i), i as f64))
        .collect(),
    }
  }

  #[test]
  fn rejects_non_positive_width() {
    assert!(matches!(
      BucketSpec::new(Duration::zero()),
      Err(Error::InvalidBucketWidth(0))
    ));
    assert!(BucketSpec::new(Duration::minutes(-5)).is_err());
  }

  #[test]
  fn bucket_start_truncates_and_honours_origin() {
    let spec = five_min();
    assert_eq!(spec.bucket_start(t(10, 7)), t(10, 5));
    assert_eq!(spec.bucket_start(t(10, 5)), t(10, 5));

    let shifted = spec.with_origin(t(0, 2));
    assert_eq!(shifted.bucket_start(t(10, 7)), t(10, 7));
    assert_eq!(shifted.bucket_start(t(10, 6)), t(10, 2));

    let before_epoch = Utc.with_ymd_and_hms(1969, 12, 31, 23, 58, 0).unwrap();
    assert_eq!(
      spec.bucket_start(before_epoch),
      Utc.with_ymd_and_hms(1969, 12, 31, 23, 55, 0).unwrap()
    );
  }

  #[test]
  fn huge_width_does_not_overflow() {
    let spec = BucketSpec::new(Duration::try_minutes(100_000_000_000_000).unwrap()).unwrap();
    let before_epoch = Utc.with_ymd_and_hms(1969, 12, 31, 23, 58, 0).unwrap();
    assert_eq!(spec.bucket_start(before_epoch), DateTime::<Utc>::MIN_UTC);
    assert_eq!(spec.bucket_start(t(10, 0)), DateTime::UNIX_EPOCH);
  }

  #[test]
  fn four_sites_ten_minute_samples_make_two_buckets() {
    let sites: Vec<SiteSeries> = (0..4)
      .map(|_| minute_series(Uuid::new_v4(), t(10, 0), 10))
      .collect();

    let sum = aggregate(&sites, &five_min());
    assert_eq!(sum.len(), 2);
    assert_eq!(sum[0].bucket_start, t(10, 0));
    assert_eq!(sum[1].bucket_start, t(10, 5));
    assert!(sum.iter().all(|p| p.site_count == 4));
    // 0+1+2+3+4 = 10 and 5+6+7+8+9 = 35 per site.
    assert_eq!(sum[0].power_kw, 40.0);
    assert_eq!(sum[1].power_kw, 140.0);

    let mean = aggregate(&sites, &five_min().with_reduction(SiteReduction::Mean));
    assert_eq!(mean[0].power_kw, 8.0);
    assert_eq!(mean[1].power_kw, 28.0);
  }

  #[test]
  fn aggregation_is_commutative_in_site_order() {
    let a = SiteSeries {
      site_id: Uuid::new_v4(),
      points:  vec![
        SeriesPoint::new(t(10, 1), 0.1),
        SeriesPoint::new(t(10, 6), 0.7),
      ],
    };
    let b = SiteSeries {
      site_id: Uuid::new_v4(),
      points:  vec![SeriesPoint::new(t(10, 2), 0.2)],
    };
    let c = SiteSeries {
      site_id: Uuid::new_v4(),
      points:  vec![SeriesPoint::new(t(10, 3), 0.3)],
    };

    let abc = aggregate(&[a.clone(), b.clone(), c.clone()], &five_min());
    let cba = aggregate(&[c, b, a], &five_min());
    assert_eq!(abc, cba);
  }

  #[test]
  fn empty_site_does_not_contribute() {
    let full = minute_series(Uuid::new_v4(), t(10, 0), 5);
    let empty = SiteSeries { site_id: Uuid::new_v4(), points: vec![] };

    let out = aggregate(&[empty, full], &five_min());
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].site_count, 1);
    assert_eq!(out[0].power_kw, 10.0);
  }

  #[test]
  fn zero_power_is_reported_with_contributors() {
    let zero = SiteSeries {
      site_id: Uuid::new_v4(),
      points:  vec![SeriesPoint::new(t(3, 0), 0.0)],
    };
    let out = aggregate(&[zero], &five_min());
    assert_eq!(out, [AggregatePoint { bucket_start: t(3, 0), power_kw: 0.0, site_count: 1 }]);
  }

  #[test]
  fn sparse_buckets_are_omitted() {
    let s = SiteSeries {
      site_id: Uuid::new_v4(),
      points:  vec![
        SeriesPoint::new(t(10, 0), 1.0),
        SeriesPoint::new(t(10, 30), 2.0),
      ],
    };
    let out = aggregate(&[s], &five_min());
    assert_eq!(
      out.iter().map(|p| p.bucket_start).collect::<Vec<_>>(),
      [t(10, 0), t(10, 30)]
    );
  }

  #[test]
  fn duplicate_site_counts_once() {
    let id = Uuid::new_v4();
    let a = SiteSeries { site_id: id, points: vec![SeriesPoint::new(t(10, 0), 1.0)] };
    let b = SiteSeries { site_id: id, points: vec![SeriesPoint::new(t(10, 1), 3.0)] };

    let out = aggregate(&[a, b], &five_min());
    assert_eq!(out[0].site_count, 1);
    assert_eq!(out[0].power_kw, 4.0);
  }

  #[test]
  fn nothing_in_nothing_out() {
    assert!(aggregate(&[], &five_min()).is_empty());
    let empties = vec![
      SiteSeries { site_id: Uuid::new_v4(), points: vec![] },
      SiteSeries { site_id: Uuid::new_v4(), points: vec![] },
    ];
    assert!(aggregate(&empties, &five_min()).is_empty());
  }
}
