//! Core types, the store trait and the forecast/generation query engine for
//! the PV site service.
//!
//! Nothing here depends on HTTP or a database. The engine works against any
//! [`store::SiteStore`]; [`memory::MemoryStore`] is the in-process
//! implementation used by tests and the fake mode.

// Store impls use `async fn`; the trait spells out the `Send` bounds.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod fake;
pub mod forecast;
pub mod generation;
pub mod horizon;
pub mod memory;
pub mod resolve;
pub mod series;
pub mod site;
pub mod store;
pub mod window;

pub use error::{Error, Result};
