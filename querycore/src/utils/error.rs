// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use thiserror::Error;

#[derive(Debug, Clone, Error, Eq, PartialEq)]
/// Enum for various errors while executing a query.
pub enum QueryError {
  #[error("Query timed out in query queue.")]
  QueueTimeout,

  #[error("Query was canceled in query queue.")]
  QueueCanceled,

  #[error("Query timed out in expression evaluation.")]
  EvalTimeout,

  #[error("Query was canceled in expression evaluation.")]
  EvalCanceled,

  #[error("Query processing would load too many samples into memory in {0}.")]
  TooManySamples(String),

  #[error("Backend {backend} failed: {message}")]
  BackendError { backend: String, message: String },

  #[error("All backends failed: {}", .0.join("; "))]
  AllBackendsFailed(Vec<String>),

  #[error("Query result is not a {expected}, it is a {actual}.")]
  ResultTypeMismatch {
    expected: &'static str,
    actual: &'static str,
  },

  #[error("Invalid query parameters. {0}")]
  InvalidParams(String),

  #[error("Invalid configuration. {0}")]
  InvalidConfiguration(String),
}

impl QueryError {
  /// Create a backend error for the backend with the given name.
  pub fn backend(backend: &str, message: impl Into<String>) -> Self {
    QueryError::BackendError {
      backend: backend.to_owned(),
      message: message.into(),
    }
  }

  /// The `errorType` reported in the wire response for this error.
  pub fn error_type(&self) -> &'static str {
    match self {
      QueryError::QueueTimeout | QueryError::EvalTimeout => "timeout",
      QueryError::QueueCanceled | QueryError::EvalCanceled => "canceled",
      QueryError::InvalidParams(_) => "bad_data",
      QueryError::BackendError { .. } | QueryError::AllBackendsFailed(_) => "unavailable",
      QueryError::TooManySamples(_)
      | QueryError::ResultTypeMismatch { .. }
      | QueryError::InvalidConfiguration(_) => "execution",
    }
  }
}

impl From<config::ConfigError> for QueryError {
  fn from(error: config::ConfigError) -> Self {
    QueryError::InvalidConfiguration(error.to_string())
  }
}

impl From<reqwest::Error> for QueryError {
  fn from(error: reqwest::Error) -> Self {
    let backend = error
      .url()
      .map_or_else(|| "unknown".to_owned(), |url| url.origin().ascii_serialization());
    QueryError::BackendError {
      backend,
      message: error.to_string(),
    }
  }
}
