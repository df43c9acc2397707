//! Query-string helpers shared by the handlers.

use chrono::{DateTime, Utc};
use pvsite_core::window::{TimeWindow, yesterday_midnight};
use uuid::Uuid;

use crate::error::ApiError;

/// Build the request window. A missing start means midnight UTC yesterday, a
/// missing end means now.
pub fn window(
  start_utc: Option<DateTime<Utc>>,
  end_utc: Option<DateTime<Utc>>,
) -> Result<TimeWindow, ApiError> {
  let now = Utc::now();
  let start = start_utc.unwrap_or_else(|| yesterday_midnight(now));
  let end = end_utc.unwrap_or(now);
  Ok(TimeWindow::new(start, end)?)
}

/// Parse a comma-separated list of site ids, ignoring empty items.
pub fn site_ids(raw: &str) -> Result<Vec<Uuid>, ApiError> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|s| {
      Uuid::parse_str(s).map_err(|e| ApiError::BadRequest(format!("invalid site id {s:?}: {e}")))
    })
    .collect()
}
