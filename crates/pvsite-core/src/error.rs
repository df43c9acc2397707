//! Error types for `pvsite-core`.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("client not found: {0}")]
  ClientNotFound(Uuid),

  #[error("site not found: {0}")]
  SiteNotFound(Uuid),

  #[error("invalid window: end {end} is not after start {start}")]
  InvalidWindow {
    start: DateTime<Utc>,
    end:   DateTime<Utc>,
  },

  #[error("bucket width must be positive, got {0} seconds")]
  InvalidBucketWidth(i64),

  #[error("client {client_id} already has a site with client_site_id {client_site_id}")]
  DuplicateClientSiteId {
    client_id:      Uuid,
    client_site_id: i64,
  },

  #[error("invalid forecast value: {0}")]
  InvalidForecastValue(String),

  #[error("invalid generation sample: {0}")]
  InvalidGeneration(String),

  /// An opaque failure reported by the backing store. Never retried here.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  /// True for the missing-client and missing-site variants.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::ClientNotFound(_) | Self::SiteNotFound(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
