// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

const DEFAULT_CONFIG_FILE_NAME: &str = "default.toml";

#[derive(Debug, Deserialize)]
/// Settings for the haquery server.
pub struct ServerSettings {
  port: u16,
  host: String,
}

impl ServerSettings {
  /// Get the port.
  pub fn get_port(&self) -> u16 {
    self.port
  }

  /// Get the host.
  pub fn get_host(&self) -> &str {
    &self.host
  }
}

#[derive(Debug, Deserialize)]
/// Settings for the server, read from config file. The engine and backend sections of the same
/// file are read by querycore.
pub struct Settings {
  server: ServerSettings,
}

impl Settings {
  /// Create Settings from given configuration directory path.
  pub fn new(config_dir_path: &str) -> Result<Self, ConfigError> {
    let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
    let config_default_file_name = format!("{}/{}", config_dir_path, DEFAULT_CONFIG_FILE_NAME);
    let config_environment_file_name = format!("{}/{}.toml", config_dir_path, run_mode);

    let config = Config::builder()
      // Start off by merging in the "default" configuration file
      .add_source(File::with_name(&config_default_file_name))
      // Add in the current environment file
      // Default to 'development' env
      // Note that this file is _optional_
      .add_source(File::with_name(&config_environment_file_name).required(false))
      // Add in settings from the environment (with a prefix of HAQUERY)
      // Eg.. `HAQUERY_SERVER__PORT=8080` would set `server.port`
      .add_source(Environment::with_prefix("haquery").separator("__"))
      .build()?;

    config.try_deserialize()
  }

  /// Get server settings.
  pub fn get_server_settings(&self) -> &ServerSettings {
    &self.server
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use crate::utils::test_with_env_vars::with_env_vars;

  #[test]
  fn test_settings() {
    let config_dir_path = "../config";
    let settings = Settings::new(config_dir_path).expect("Could not parse config");

    // Check server settings.
    let server_settings = settings.get_server_settings();
    assert_eq!(server_settings.get_port(), 3000);
    assert_eq!(server_settings.get_host(), "0.0.0.0");
  }

  #[test]
  fn test_settings_from_env() {
    with_env_vars(vec![("HAQUERY_SERVER__PORT", Some("8080"))], || {
      let settings = Settings::new("../config").expect("Could not parse config");
      assert_eq!(settings.get_server_settings().get_port(), 8080);
    });
  }
}
