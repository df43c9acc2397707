//! Measured generation samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Average power output of a site over `[start_utc, end_utc)`.
///
/// Append-only. A later sample with the same `(site_id, start_utc)` replaces
/// an earlier one at the store level; other overlaps are kept as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSample {
  /// Store-assigned, strictly increasing.
  pub generation_id:       i64,
  pub site_id:             Uuid,
  pub start_utc:           DateTime<Utc>,
  pub end_utc:             DateTime<Utc>,
  pub generation_power_kw: f64,
}

/// Input to [`crate::store::SiteStore::record_generation`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewGeneration {
  pub start_utc:           DateTime<Utc>,
  pub end_utc:             DateTime<Utc>,
  pub generation_power_kw: f64,
}

impl NewGeneration {
  pub fn validate(&self) -> Result<()> {
    if self.end_utc <= self.start_utc {
      return Err(Error::InvalidGeneration(format!(
        "interval [{}, {}) is empty",
        self.start_utc, self.end_utc
      )));
    }
    if !self.generation_power_kw.is_finite() || self.generation_power_kw < 0.0 {
      return Err(Error::InvalidGeneration(format!(
        "power must be a non-negative number, got {}",
        self.generation_power_kw
      )));
    }
    Ok(())
  }
}
