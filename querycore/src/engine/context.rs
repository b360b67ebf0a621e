// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::utils::error::QueryError;

/// The phase a query is in when its context expires or is canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
  /// Waiting for a slot in the admission gate.
  Queue,

  /// Fetching, merging or sampling series.
  Evaluation,
}

impl QueryPhase {
  fn timeout_error(self) -> QueryError {
    match self {
      QueryPhase::Queue => QueryError::QueueTimeout,
      QueryPhase::Evaluation => QueryError::EvalTimeout,
    }
  }

  fn canceled_error(self) -> QueryError {
    match self {
      QueryPhase::Queue => QueryError::QueueCanceled,
      QueryPhase::Evaluation => QueryError::EvalCanceled,
    }
  }
}

/// One deadline and one cancellation token covering every phase of a query.
#[derive(Debug, Clone)]
pub struct QueryContext {
  deadline: Instant,
  token: CancellationToken,
}

impl QueryContext {
  /// Create a context that expires `timeout` from now and is canceled through `token`.
  pub fn new(timeout: Duration, token: CancellationToken) -> Self {
    QueryContext {
      deadline: Instant::now() + timeout,
      token,
    }
  }

  /// Create a context with its own cancellation token.
  pub fn with_timeout(timeout: Duration) -> Self {
    QueryContext::new(timeout, CancellationToken::new())
  }

  pub fn get_deadline(&self) -> Instant {
    self.deadline
  }

  /// The token canceling this context.
  pub fn get_token(&self) -> CancellationToken {
    self.token.clone()
  }

  pub fn cancel(&self) {
    self.token.cancel();
  }

  pub fn is_canceled(&self) -> bool {
    self.token.is_cancelled()
  }

  /// Returns an error if the context was canceled or its deadline has passed. Cancellation wins
  /// when both happened.
  pub fn check(&self, phase: QueryPhase) -> Result<(), QueryError> {
    if self.token.is_cancelled() {
      return Err(phase.canceled_error());
    }
    if Instant::now() >= self.deadline {
      return Err(phase.timeout_error());
    }
    Ok(())
  }

  /// Run the future until it completes, the context is canceled or the deadline passes.
  pub async fn run<F: Future>(&self, phase: QueryPhase, future: F) -> Result<F::Output, QueryError> {
    tokio::select! {
      biased;
      _ = self.token.cancelled() => Err(phase.canceled_error()),
      _ = sleep_until(self.deadline) => Err(phase.timeout_error()),
      output = future => Ok(output),
    }
  }
}
