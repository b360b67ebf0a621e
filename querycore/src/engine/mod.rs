// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! Query execution: admission, series selection, sampling and result lifecycle.

pub mod context;
pub mod evaluator;
pub mod gate;
pub mod pool;

use std::time::Duration;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::metric::matrix::Matrix;
use crate::metric::time_series::Sample;
use crate::metric::vector::Vector;
use crate::remote::{Querier, SelectParams};
use crate::request_manager::query_result::{QueryResult, QueryValue};
use crate::utils::error::QueryError;
use crate::utils::sync::Arc;

use self::context::{QueryContext, QueryPhase};
use self::evaluator::Evaluator;
use self::gate::Gate;
use self::pool::PointPool;

const DEFAULT_MAX_CONCURRENT: usize = 20;
const DEFAULT_MAX_SAMPLES: usize = 50_000_000;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_LOOKBACK_DELTA: Duration = Duration::from_secs(300);

/// Options of an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOpts {
  /// Maximum number of queries executing at once.
  pub max_concurrent: usize,

  /// Maximum number of points a single query may produce.
  pub max_samples: usize,

  /// Deadline of a query, covering the wait for admission.
  pub timeout: Duration,

  /// How far back a sample may be to count for a timestamp.
  pub lookback_delta: Duration,
}

impl Default for EngineOpts {
  fn default() -> Self {
    EngineOpts {
      max_concurrent: DEFAULT_MAX_CONCURRENT,
      max_samples: DEFAULT_MAX_SAMPLES,
      timeout: DEFAULT_TIMEOUT,
      lookback_delta: DEFAULT_LOOKBACK_DELTA,
    }
  }
}

/// Creates queries and holds the state they share: the admission gate and the point pool.
#[derive(Debug, Clone)]
pub struct Engine {
  gate: Arc<Gate>,
  pool: Arc<PointPool>,
  opts: EngineOpts,
}

impl Engine {
  pub fn new(opts: EngineOpts) -> Self {
    info!(
      "Creating engine with max_concurrent {}, max_samples {}, timeout {:?}, lookback delta {:?}",
      opts.max_concurrent, opts.max_samples, opts.timeout, opts.lookback_delta
    );
    Engine {
      gate: Arc::new(Gate::new(opts.max_concurrent)),
      pool: Arc::new(PointPool::new()),
      opts,
    }
  }

  /// Create an instant query evaluated at `time`.
  pub fn new_instant_query(&self, querier: Arc<dyn Querier>, query: &str, time: i64) -> Query {
    Query::new(self.clone(), querier, SelectParams::new_instant(query, time))
  }

  /// Create a range query over `[start, end]` with the given step, all in seconds.
  pub fn new_range_query(
    &self,
    querier: Arc<dyn Querier>,
    query: &str,
    start: i64,
    end: i64,
    step: i64,
  ) -> Result<Query, QueryError> {
    let params = SelectParams::new_range(query, start, end, step)?;
    Ok(Query::new(self.clone(), querier, params))
  }

  pub fn get_opts(&self) -> &EngineOpts {
    &self.opts
  }

  pub fn get_gate(&self) -> &Gate {
    &self.gate
  }

  pub fn get_pool(&self) -> &PointPool {
    &self.pool
  }

  /// Return the storage of a result taken out of a query to the pool. Returns the number of
  /// buffers released.
  pub fn release(&self, result: QueryResult) -> usize {
    match result.into_result() {
      Ok(QueryValue::Matrix(matrix)) => self.pool.put_matrix(matrix),
      _ => 0,
    }
  }
}

/// Where a query is in its execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
  /// Created, waiting for admission.
  Queued,

  /// Holding a gate slot.
  Admitted,

  /// Selecting series from the backends.
  Fetching,

  /// Sampling the selected series.
  Sampling,

  Done,
  Failed,
}

/// A single query. Execute it with [`Query::exec`], read the result, then [`Query::close`] it
/// to return the result's storage to the engine's pool.
pub struct Query {
  engine: Engine,
  querier: Arc<dyn Querier>,
  params: SelectParams,
  token: CancellationToken,
  state: QueryState,
  result: Option<QueryResult>,
  closed: bool,
}

impl Query {
  fn new(engine: Engine, querier: Arc<dyn Querier>, params: SelectParams) -> Self {
    Query {
      engine,
      querier,
      params,
      token: CancellationToken::new(),
      state: QueryState::Queued,
      result: None,
      closed: false,
    }
  }

  pub fn get_params(&self) -> &SelectParams {
    &self.params
  }

  pub fn state(&self) -> QueryState {
    self.state
  }

  /// A token that cancels this query, for use from another task.
  pub fn get_token(&self) -> CancellationToken {
    self.token.clone()
  }

  pub fn cancel(&self) {
    self.token.cancel();
  }

  /// Execute the query, once. Later calls return the same result. A closed query is not
  /// executed and yields an error.
  pub async fn exec(&mut self) -> &QueryResult {
    let result = match self.result.take() {
      Some(result) => result,
      None if self.closed => QueryResult::from_error(QueryError::InvalidParams(
        "Query was already closed.".to_owned(),
      )),
      None => {
        let result = self.run().await;
        match &result {
          Ok(_) => self.state = QueryState::Done,
          Err(error) => {
            info!("Query {} failed: {}", self.params.get_query(), error);
            self.state = QueryState::Failed;
          }
        }
        QueryResult::new(result)
      }
    };
    self.result.insert(result)
  }

  async fn run(&mut self) -> Result<QueryValue, QueryError> {
    let engine = self.engine.clone();
    let opts = engine.get_opts();
    let ctx = QueryContext::new(opts.timeout, self.token.clone());

    let slot = engine.get_gate().start(&ctx).await?;
    self.state = QueryState::Admitted;
    debug!(
      "Executing query {} over [{}, {}] step {}",
      self.params.get_query(),
      self.params.get_start(),
      self.params.get_end(),
      self.params.get_step()
    );

    self.state = QueryState::Fetching;
    let set = self
      .querier
      .select(&ctx, &self.params)
      .await?
      .into_concrete()?;

    self.state = QueryState::Sampling;
    let mut evaluator = Evaluator::new(
      &ctx,
      engine.get_pool(),
      &self.params,
      opts.lookback_delta,
      opts.max_samples,
    );
    let matrix = evaluator.eval(set.get_series())?;
    slot.done();
    if let Err(error) = ctx.check(QueryPhase::Evaluation) {
      engine.get_pool().put_matrix(matrix);
      return Err(error);
    }

    if self.params.is_instant() {
      Ok(QueryValue::Vector(self.to_vector(matrix)))
    } else {
      Ok(QueryValue::Matrix(matrix))
    }
  }

  /// Turn a single-step matrix into a vector at the query timestamp, returning the matrix
  /// storage to the pool.
  fn to_vector(&self, matrix: Matrix) -> Vector {
    let time = self.params.get_start();
    let pool = self.engine.get_pool();
    let mut vector = Vector::new(Vec::with_capacity(matrix.len()));
    for series in matrix.into_series() {
      let (labels, points) = series.into_parts();
      if let Some(point) = points.first() {
        let mut point = *point;
        point.set_time(time);
        vector.push(Sample::new(labels, point));
      }
      pool.put(points);
    }
    vector
  }

  /// Take the result out of the query, leaving the query closed. The caller owns the result's
  /// storage from then on and may hand it back with [`Engine::release`].
  pub fn take_result(&mut self) -> Option<QueryResult> {
    self.closed = true;
    self.result.take()
  }

  /// Release the result and return its storage to the pool. Returns the number of buffers
  /// released; closing again releases nothing.
  pub fn close(&mut self) -> usize {
    self.closed = true;
    match self.result.take().map(QueryResult::into_result) {
      Some(Ok(QueryValue::Matrix(matrix))) => self.engine.get_pool().put_matrix(matrix),
      _ => 0,
    }
  }
}
