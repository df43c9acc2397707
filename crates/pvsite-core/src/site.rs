//! Clients and the sites they own.
//!
//! Both are created by provisioning and are otherwise read-only for this
//! crate, apart from renaming a client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An owner of zero or more sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
  pub client_id:   Uuid,
  pub client_name: String,
  pub created_at:  DateTime<Utc>,
}

/// A PV installation. Belongs to exactly one [`Client`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
  pub site_id:          Uuid,
  pub client_id:        Uuid,
  /// The site's id as given by the client; unique within that client.
  pub client_site_id:   i64,
  pub client_site_name: Option<String>,
  pub latitude:         f64,
  pub longitude:        f64,
  pub capacity_kw:      f64,
  /// Numeric id used to correlate with external forecasting systems.
  pub ml_id:            i64,
  pub created_at:       DateTime<Utc>,
}

/// Input to [`crate::store::SiteStore::add_site`].
#[derive(Debug, Clone)]
pub struct NewSite {
  pub client_id:        Uuid,
  pub client_site_id:   i64,
  pub client_site_name: Option<String>,
  pub latitude:         f64,
  pub longitude:        f64,
  pub capacity_kw:      f64,
  pub ml_id:            i64,
}

impl NewSite {
  /// Convenience constructor; coordinates default to zero and no name.
  pub fn new(client_id: Uuid, client_site_id: i64, capacity_kw: f64) -> Self {
    Self {
      client_id,
      client_site_id,
      client_site_name: None,
      latitude: 0.0,
      longitude: 0.0,
      capacity_kw,
      ml_id: client_site_id,
    }
  }
}
