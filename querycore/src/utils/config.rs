// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::env;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::engine::EngineOpts;
use crate::remote::merge::MergePolicy;
use crate::utils::error::QueryError;
use crate::utils::io::get_joined_path;

const DEFAULT_CONFIG_FILE_NAME: &str = "default.toml";

#[derive(Debug, Clone, Deserialize)]
/// Settings for the query engine.
pub struct EngineSettings {
  max_concurrent: usize,
  max_samples: usize,
  timeout_seconds: u64,
  lookback_delta_seconds: u64,
  #[serde(default)]
  merge_policy: MergePolicy,
}

impl EngineSettings {
  /// Maximum number of queries inside the fetch/merge/sampling phase at once.
  pub fn get_max_concurrent(&self) -> usize {
    self.max_concurrent
  }

  /// Maximum number of points a single query may materialize.
  pub fn get_max_samples(&self) -> usize {
    self.max_samples
  }

  pub fn get_timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_seconds)
  }

  pub fn get_lookback_delta(&self) -> Duration {
    Duration::from_secs(self.lookback_delta_seconds)
  }

  /// How samples of the same series reported by several backends are reconciled.
  pub fn get_merge_policy(&self) -> MergePolicy {
    self.merge_policy
  }

  /// Options for constructing an engine from these settings.
  pub fn get_engine_opts(&self) -> EngineOpts {
    EngineOpts {
      max_concurrent: self.max_concurrent,
      max_samples: self.max_samples,
      timeout: self.get_timeout(),
      lookback_delta: self.get_lookback_delta(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
/// Settings for one backend. Backends are queried in the order they are configured,
/// and earlier backends take priority when series are merged.
pub struct BackendSettings {
  endpoint: String,
  timeout_seconds: u64,
}

impl BackendSettings {
  pub fn new(endpoint: &str, timeout: Duration) -> Self {
    BackendSettings {
      endpoint: endpoint.to_owned(),
      timeout_seconds: timeout.as_secs(),
    }
  }

  /// Base URL of the backend, e.g. "http://localhost:9090".
  pub fn get_endpoint(&self) -> &str {
    self.endpoint.as_str()
  }

  /// Timeout applied to every request sent to this backend.
  pub fn get_timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_seconds)
  }
}

#[derive(Debug, Clone, Deserialize)]
/// Settings for querycore, read from config file.
pub struct Settings {
  engine: EngineSettings,
  backends: Vec<BackendSettings>,
}

impl Settings {
  /// Create Settings from given configuration directory path.
  pub fn new(config_dir_path: &str) -> Result<Self, QueryError> {
    let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
    let config_default_file_name = get_joined_path(config_dir_path, DEFAULT_CONFIG_FILE_NAME);
    let config_environment_file_name = get_joined_path(config_dir_path, &format!("{}.toml", run_mode));

    let config = Config::builder()
      // Start off by merging in the "default" configuration file
      .add_source(File::with_name(&config_default_file_name))
      // Add in the current environment file
      // Default to 'development' env
      // Note that this file is _optional_
      .add_source(File::with_name(&config_environment_file_name).required(false))
      // Add in settings from the environment (with a prefix of QUERYCORE)
      // Eg.. `QUERYCORE_ENGINE__MAX_SAMPLES=1000` would set `engine.max_samples`
      .add_source(Environment::with_prefix("querycore").separator("__"))
      .build()?;

    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
  }

  /// Check the invariants the engine relies on.
  pub fn validate(&self) -> Result<(), QueryError> {
    if self.backends.is_empty() {
      return Err(QueryError::InvalidConfiguration(
        "At least one backend must be configured.".to_owned(),
      ));
    }
    if self.engine.max_concurrent == 0 {
      return Err(QueryError::InvalidConfiguration(
        "engine.max_concurrent must be at least 1.".to_owned(),
      ));
    }
    if self.engine.timeout_seconds == 0 {
      return Err(QueryError::InvalidConfiguration(
        "engine.timeout_seconds must be at least 1.".to_owned(),
      ));
    }
    for backend in &self.backends {
      if backend.endpoint.is_empty() {
        return Err(QueryError::InvalidConfiguration(
          "Backend endpoint cannot be empty.".to_owned(),
        ));
      }
    }
    Ok(())
  }

  /// Get engine settings.
  pub fn get_engine_settings(&self) -> &EngineSettings {
    &self.engine
  }

  /// Get backend settings, in priority order.
  pub fn get_backend_settings(&self) -> &[BackendSettings] {
    &self.backends
  }

  pub fn get_default_config_file_name() -> &'static str {
    DEFAULT_CONFIG_FILE_NAME
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::fs::File;
  use std::io::Write;

  use tempdir::TempDir;


  fn write_config(config_dir_path: &str, file_name: &str, contents: &str) {
    let config_file_path = get_joined_path(config_dir_path, file_name);
    let mut file = File::create(config_file_path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
  }

  #[test]
  fn test_settings() {
    let config_dir = TempDir::new("config_test").unwrap();
    let config_dir_path = config_dir.path().to_str().unwrap();

    // Reading from an empty directory should be an error.
    assert!(Settings::new(config_dir_path).is_err());

    write_config(
      config_dir_path,
      DEFAULT_CONFIG_FILE_NAME,
      r#"
[engine]
max_concurrent = 20
max_samples = 50000000
timeout_seconds = 120
lookback_delta_seconds = 300
merge_policy = "priority"

[[backends]]
endpoint = "http://localhost:9090"
timeout_seconds = 30

[[backends]]
endpoint = "http://localhost:9091"
timeout_seconds = 10
"#,
    );

    let settings = Settings::new(config_dir_path).unwrap();
    let engine_settings = settings.get_engine_settings();
    assert_eq!(engine_settings.get_max_concurrent(), 20);
    assert_eq!(engine_settings.get_max_samples(), 50_000_000);
    assert_eq!(engine_settings.get_timeout(), Duration::from_secs(120));
    assert_eq!(engine_settings.get_lookback_delta(), Duration::from_secs(300));
    assert_eq!(engine_settings.get_merge_policy(), MergePolicy::Priority);

    let opts = engine_settings.get_engine_opts();
    assert_eq!(opts.max_concurrent, 20);
    assert_eq!(opts.lookback_delta, Duration::from_secs(300));

    let backends = settings.get_backend_settings();
    assert_eq!(backends.len(), 2);
    assert_eq!(backends[0].get_endpoint(), "http://localhost:9090");
    assert_eq!(backends[0].get_timeout(), Duration::from_secs(30));
    assert_eq!(backends[1].get_endpoint(), "http://localhost:9091");
    assert_eq!(backends[1].get_timeout(), Duration::from_secs(10));
  }

  #[test]
  fn test_settings_default_merge_policy() {
    let config_dir = TempDir::new("config_test").unwrap();
    let config_dir_path = config_dir.path().to_str().unwrap();

    write_config(
      config_dir_path,
      DEFAULT_CONFIG_FILE_NAME,
      r#"
[engine]
max_concurrent = 1
max_samples = 10
timeout_seconds = 5
lookback_delta_seconds = 300

[[backends]]
endpoint = "http://localhost:9090"
timeout_seconds = 30
"#,
    );

    let settings = Settings::new(config_dir_path).unwrap();
    assert_eq!(
      settings.get_engine_settings().get_merge_policy(),
      MergePolicy::NonStaleFirst
    );
  }

  #[test]
  fn test_settings_validation() {
    let config_dir = TempDir::new("config_test").unwrap();
    let config_dir_path = config_dir.path().to_str().unwrap();

    write_config(
      config_dir_path,
      DEFAULT_CONFIG_FILE_NAME,
      r#"
backends = []

[engine]
max_concurrent = 0
max_samples = 10
timeout_seconds = 5
lookback_delta_seconds = 300
"#,
    );

    let result = Settings::new(config_dir_path);
    assert!(matches!(result, Err(QueryError::InvalidConfiguration(_))));
  }
}
