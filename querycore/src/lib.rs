// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! Highly-available reads over redundant metrics backends.
//!
//! A query is sent to every configured backend concurrently. The series they return are merged
//! so that each series appears once, with gaps and stale markers of one backend covered by the
//! others, and then sampled at the query timestamp (instant queries) or on a grid of timestamps
//! (range queries).
//!
pub mod engine;
pub mod metric;
pub mod remote;
pub mod request_manager;
pub mod utils;

use log::{debug, info};

use crate::engine::{Engine, EngineOpts, Query};
use crate::remote::client::HttpBackend;
use crate::remote::merge::{MergePolicy, MergeQuerier};
use crate::remote::{BackendQuerier, Querier};
use crate::request_manager::query_result::QueryResult;
use crate::utils::config::{BackendSettings, Settings};
use crate::utils::error::QueryError;
use crate::utils::sync::Arc;
use crate::utils::time::get_current_time_in_seconds;

/// Handle for running queries against a set of backends.
#[derive(Clone)]
pub struct QueryCore {
  engine: Engine,
  querier: Arc<dyn Querier>,
}

impl QueryCore {
  /// Create a handle from the settings in the given configuration directory.
  pub fn new(config_dir_path: &str) -> Result<Self, QueryError> {
    let settings = Settings::new(config_dir_path)?;
    QueryCore::new_with_settings(&settings)
  }

  /// Create a handle from settings.
  pub fn new_with_settings(settings: &Settings) -> Result<Self, QueryError> {
    let engine_settings = settings.get_engine_settings();
    let querier = QueryCore::create_querier(
      settings.get_backend_settings(),
      engine_settings.get_merge_policy(),
    )?;
    Ok(QueryCore::new_with_querier(
      engine_settings.get_engine_opts(),
      querier,
    ))
  }

  /// Create a handle selecting series through the given querier.
  pub fn new_with_querier(opts: EngineOpts, querier: Arc<dyn Querier>) -> Self {
    QueryCore {
      engine: Engine::new(opts),
      querier,
    }
  }

  /// Build a querier merging the results of the given backends, in priority order.
  fn create_querier(
    backends: &[BackendSettings],
    policy: MergePolicy,
  ) -> Result<Arc<dyn Querier>, QueryError> {
    let mut queriers: Vec<Arc<dyn Querier>> = Vec::with_capacity(backends.len());
    for (index, backend_settings) in backends.iter().enumerate() {
      let backend = HttpBackend::new(index, backend_settings)?;
      info!(
        "Adding backend {} with timeout {:?}",
        backend.get_endpoint(),
        backend.get_timeout()
      );
      queriers.push(Arc::new(BackendQuerier::new(Arc::new(backend))));
    }
    Ok(Arc::new(MergeQuerier::new(queriers, policy)))
  }

  pub fn get_engine(&self) -> &Engine {
    &self.engine
  }

  /// Evaluate an instant query now.
  pub async fn instant_query(&self, query: &str) -> QueryResult {
    self
      .instant_query_at(query, get_current_time_in_seconds())
      .await
  }

  /// Evaluate an instant query at the given time in seconds.
  pub async fn instant_query_at(&self, query: &str, time: i64) -> QueryResult {
    debug!("Instant query {} at {}", query, time);
    let query = self
      .engine
      .new_instant_query(self.querier.clone(), query, time);
    QueryCore::exec(query).await
  }

  /// Evaluate a range query. Start, end and step are in seconds.
  pub async fn range_query(&self, query: &str, start: i64, end: i64, step: i64) -> QueryResult {
    debug!(
      "Range query {} over [{}, {}] step {}",
      query, start, end, step
    );
    match self
      .engine
      .new_range_query(self.querier.clone(), query, start, end, step)
    {
      Ok(query) => QueryCore::exec(query).await,
      Err(error) => QueryResult::from_error(error),
    }
  }

  /// Return the storage of a result to the pool for reuse by later queries.
  pub fn release(&self, result: QueryResult) -> usize {
    self.engine.release(result)
  }

  /// Execute a query and move its result out. The query is closed afterwards.
  async fn exec(mut query: Query) -> QueryResult {
    query.exec().await;
    query.take_result().unwrap_or_else(|| {
      QueryResult::from_error(QueryError::InvalidParams(
        "Query was already closed.".to_owned(),
      ))
    })
  }
}
