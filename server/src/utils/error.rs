// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use querycore::utils::error::QueryError;
use thiserror::Error;

#[derive(Debug, Error)]
/// Collection of error messages in the haquery server.
pub enum ServerError {
  #[error("Invalid parameter {0}.")]
  InvalidParameter(String),

  #[error("Invalid configuration. {0}")]
  InvalidConfiguration(String),

  #[error("Could not start server. {0}")]
  StartupError(String),
}

impl From<config::ConfigError> for ServerError {
  fn from(error: config::ConfigError) -> Self {
    ServerError::InvalidConfiguration(error.to_string())
  }
}

impl From<QueryError> for ServerError {
  fn from(error: QueryError) -> Self {
    ServerError::InvalidConfiguration(error.to_string())
  }
}

impl From<std::io::Error> for ServerError {
  fn from(error: std::io::Error) -> Self {
    ServerError::StartupError(error.to_string())
  }
}

impl From<ServerError> for QueryError {
  fn from(error: ServerError) -> Self {
    QueryError::InvalidParams(error.to_string())
  }
}
