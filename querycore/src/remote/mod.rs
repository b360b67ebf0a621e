// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! Access to the metrics backends a query is fanned out to.
//!
//! A [`Backend`] executes a query against one store and returns a [`SeriesSet`]. A [`Querier`]
//! is what the engine selects series through: either one backend ([`BackendQuerier`]) or the
//! merge of several ([`merge::MergeQuerier`]).

pub mod buffer;
pub mod client;
pub mod codec;
pub mod merge;
pub mod series;

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::engine::context::{QueryContext, QueryPhase};
use crate::utils::error::QueryError;

use self::series::RemoteSeries;

/// What to select from a backend. Timestamps and step are in seconds; `step == 0` is an instant
/// query at `start`, which then equals `end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectParams {
  query: String,
  start: i64,
  end: i64,
  step: i64,
}

impl SelectParams {
  pub fn new_instant(query: &str, time: i64) -> Self {
    SelectParams {
      query: query.to_owned(),
      start: time,
      end: time,
      step: 0,
    }
  }

  pub fn new_range(query: &str, start: i64, end: i64, step: i64) -> Result<Self, QueryError> {
    let params = SelectParams {
      query: query.to_owned(),
      start,
      end,
      step,
    };
    params.validate()?;
    Ok(params)
  }

  /// Reject parameters that do not describe a single timestamp or a forward grid.
  pub fn validate(&self) -> Result<(), QueryError> {
    if self.step < 0 {
      return Err(QueryError::InvalidParams(format!(
        "Step must not be negative, got {}.",
        self.step
      )));
    }
    if self.end < self.start {
      return Err(QueryError::InvalidParams(format!(
        "End {} is before start {}.",
        self.end, self.start
      )));
    }
    if self.step == 0 && self.start != self.end {
      return Err(QueryError::InvalidParams(
        "Step must be positive for a range query.".to_owned(),
      ));
    }
    Ok(())
  }

  pub fn get_query(&self) -> &str {
    &self.query
  }

  pub fn get_start(&self) -> i64 {
    self.start
  }

  pub fn get_end(&self) -> i64 {
    self.end
  }

  pub fn get_step(&self) -> i64 {
    self.step
  }

  pub fn is_instant(&self) -> bool {
    self.step == 0
  }
}

/// Series returned by one backend, sorted by labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConcreteSeriesSet {
  series: Vec<RemoteSeries>,
  // Descriptions of the series the backend returned but that failed validation.
  rejected: Vec<String>,
}

impl ConcreteSeriesSet {
  pub fn new(mut series: Vec<RemoteSeries>, rejected: Vec<String>) -> Self {
    series.sort_by(|a, b| a.get_labels().cmp(b.get_labels()));
    ConcreteSeriesSet { series, rejected }
  }

  pub fn get_series(&self) -> &[RemoteSeries] {
    &self.series
  }

  pub fn get_rejected(&self) -> &[String] {
    &self.rejected
  }

  pub fn len(&self) -> usize {
    self.series.len()
  }

  pub fn is_empty(&self) -> bool {
    self.series.is_empty()
  }

  pub fn into_series(self) -> Vec<RemoteSeries> {
    self.series
  }
}

/// The outcome of selecting series: either a set of series, or an error sentinel reported by the
/// source itself (e.g. a backend answering with status "error").
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesSet {
  Concrete(ConcreteSeriesSet),
  Error(QueryError),
}

impl SeriesSet {
  pub fn from_series(series: Vec<RemoteSeries>) -> Self {
    SeriesSet::Concrete(ConcreteSeriesSet::new(series, Vec::new()))
  }

  /// Turn the error sentinel into an error.
  pub fn into_concrete(self) -> Result<ConcreteSeriesSet, QueryError> {
    match self {
      SeriesSet::Concrete(set) => Ok(set),
      SeriesSet::Error(error) => Err(error),
    }
  }
}

/// A single metrics store that can evaluate queries.
#[async_trait]
pub trait Backend: Send + Sync {
  /// Name used in logs and errors.
  fn name(&self) -> &str;

  async fn query_instant(&self, query: &str, time: i64) -> Result<SeriesSet, QueryError>;

  async fn query_range(
    &self,
    query: &str,
    start: i64,
    end: i64,
    step: i64,
  ) -> Result<SeriesSet, QueryError>;
}

/// Selects series for a query.
#[async_trait]
pub trait Querier: Send + Sync {
  /// Name used in logs and errors.
  fn name(&self) -> &str;

  async fn select(&self, ctx: &QueryContext, params: &SelectParams) -> Result<SeriesSet, QueryError>;
}

/// Selects series from a single backend.
pub struct BackendQuerier {
  backend: Arc<dyn Backend>,
}

impl BackendQuerier {
  pub fn new(backend: Arc<dyn Backend>) -> Self {
    BackendQuerier { backend }
  }

  pub fn get_name(&self) -> &str {
    self.backend.name()
  }
}

#[async_trait]
impl Querier for BackendQuerier {
  fn name(&self) -> &str {
    self.backend.name()
  }

  async fn select(&self, ctx: &QueryContext, params: &SelectParams) -> Result<SeriesSet, QueryError> {
    debug!(
      "Selecting {} from backend {} for [{}, {}] step {}",
      params.get_query(),
      self.backend.name(),
      params.get_start(),
      params.get_end(),
      params.get_step()
    );

    let backend = self.backend.as_ref();
    if params.is_instant() {
      ctx
        .run(
          QueryPhase::Evaluation,
          backend.query_instant(params.get_query(), params.get_start()),
        )
        .await?
    } else {
      ctx
        .run(
          QueryPhase::Evaluation,
          backend.query_range(
            params.get_query(),
            params.get_start(),
            params.get_end(),
            params.get_step(),
          ),
        )
        .await?
    }
  }
}

#[cfg(test)]
pub(crate) mod test_utils {
  use std::time::Duration;

  use super::*;

  use crate::metric::labels::Labels;
  use crate::metric::metric_point::Point;
  use crate::metric::time_series::Series;

  /// Build a series from label pairs and (time, value) points.
  pub fn series(pairs: &[(&str, &str)], points: &[(i64, f64)]) -> Series {
    Series::new(
      Labels::from_pairs(pairs),
      points.iter().map(|(t, v)| Point::new(*t, *v)).collect(),
    )
  }

  /// A backend that returns a fixed answer after an optional delay.
  pub struct StaticBackend {
    name: String,
    answer: Result<SeriesSet, QueryError>,
    delay: Duration,
  }

  impl StaticBackend {
    pub fn new(name: &str, series: Vec<Series>) -> Self {
      StaticBackend {
        name: name.to_owned(),
        answer: Ok(SeriesSet::from_series(
          series.into_iter().map(RemoteSeries::Concrete).collect(),
        )),
        delay: Duration::ZERO,
      }
    }

    pub fn failing(name: &str, message: &str) -> Self {
      StaticBackend {
        name: name.to_owned(),
        answer: Err(QueryError::backend(name, message)),
        delay: Duration::ZERO,
      }
    }

    pub fn with_answer(name: &str, answer: Result<SeriesSet, QueryError>) -> Self {
      StaticBackend {
        name: name.to_owned(),
        answer,
        delay: Duration::ZERO,
      }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
      self.delay = delay;
      self
    }
  }

  #[async_trait]
  impl Backend for StaticBackend {
    fn name(&self) -> &str {
      &self.name
    }

    async fn query_instant(&self, _query: &str, _time: i64) -> Result<SeriesSet, QueryError> {
      tokio::time::sleep(self.delay).await;
      self.answer.clone()
    }

    async fn query_range(
      &self,
      _query: &str,
      _start: i64,
      _end: i64,
      _step: i64,
    ) -> Result<SeriesSet, QueryError> {
      tokio::time::sleep(self.delay).await;
      self.answer.clone()
    }
  }

  /// Wrap a backend into a querier.
  pub fn querier(backend: StaticBackend) -> Arc<dyn Querier> {
    Arc::new(BackendQuerier::new(Arc::new(backend)))
  }
}
