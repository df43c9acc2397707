//! Layered server configuration: an optional TOML file overridden by
//! `PVSITE_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use pvsite_core::engine::EngineConfig;
use serde::Deserialize;

/// Runtime server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  /// Serve a seeded in-memory fleet instead of opening `store_path`.
  pub fake:       bool,
  pub engine:     EngineConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_string(),
      port:       8000,
      store_path: PathBuf::from("~/.local/share/pvsite/pvsite.db"),
      fake:       false,
      engine:     EngineConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Read `path` if it exists, then apply environment overrides such as
  /// `PVSITE_PORT` or `PVSITE_ENGINE__FORECAST_STEP_MINUTES`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let builder = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("PVSITE")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      );
    Self::from_builder(builder)
  }

  fn from_builder(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
  ) -> anyhow::Result<Self> {
    let mut cfg: ServerConfig = builder
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use pvsite_core::aggregate::SiteReduction;

  use super::*;

  fn from_toml(toml: &str) -> ServerConfig {
    ServerConfig::from_builder(
      config::Config::builder().add_source(config::File::from_str(toml, config::FileFormat::Toml)),
    )
    .unwrap()
  }

  #[test]
  fn empty_file_gives_defaults() {
    let cfg = from_toml("");
    assert_eq!(cfg.port, 8000);
    assert!(!cfg.fake);
    assert_eq!(cfg.engine, EngineConfig::default());
  }

  #[test]
  fn nested_engine_keys_are_read() {
    let cfg = from_toml(
      r#"
        port = 9000
        fake = true

        [engine]
        forecast_step_minutes = 30
        site_reduction = "mean"
      "#,
    );
    assert_eq!(cfg.address(), "127.0.0.1:9000");
    assert!(cfg.fake);
    assert_eq!(cfg.engine.forecast_step_minutes, 30);
    assert_eq!(cfg.engine.generation_bucket_minutes, 15);
    assert_eq!(cfg.engine.site_reduction, SiteReduction::Mean);
  }

  #[test]
  fn relative_store_path_is_untouched() {
    let cfg = from_toml(r#"store_path = "data/pvsite.db""#);
    assert_eq!(cfg.store_path, PathBuf::from("data/pvsite.db"));
  }
}
