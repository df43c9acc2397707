//! Half-open UTC time windows.

use chrono::{DateTime, Days, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A validated, half-open interval `[start, end)` with `end > start`.
///
/// The only way to obtain one is [`TimeWindow::new`], so every query that
/// takes a window has already rejected empty or inverted ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct TimeWindow {
  start: DateTime<Utc>,
  end:   DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawWindow {
  start: DateTime<Utc>,
  end:   DateTime<Utc>,
}

impl TryFrom<RawWindow> for TimeWindow {
  type Error = Error;

  fn try_from(raw: RawWindow) -> Result<Self> { Self::new(raw.start, raw.end) }
}

impl TimeWindow {
  pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
    if end <= start {
      return Err(Error::InvalidWindow { start, end });
    }
    Ok(Self { start, end })
  }

  pub fn start(&self) -> DateTime<Utc> { self.start }

  pub fn end(&self) -> DateTime<Utc> { self.end }

  /// `start <= t < end`.
  pub fn contains(&self, t: DateTime<Utc>) -> bool {
    self.start <= t && t < self.end
  }

  /// Whether the half-open interval `[start, end)` overlaps this window.
  pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    start < self.end && end > self.start
  }
}

/// Midnight UTC at the start of the day before `now`.
///
/// Default lower bound for queries that omit a start time.
pub fn yesterday_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
  let today = now.date_naive();
  let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
  yesterday.and_time(NaiveTime::MIN).and_utc()
}
