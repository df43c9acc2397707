//! Error type for `pvsite-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Validation failure on a write, e.g. a malformed forecast value.
  #[error("core error: {0}")]
  Core(#[from] pvsite_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("client not found: {0}")]
  ClientNotFound(uuid::Uuid),

  #[error("site not found: {0}")]
  SiteNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
