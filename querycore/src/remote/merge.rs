// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, warn};
use serde::Deserialize;

use crate::engine::context::{QueryContext, QueryPhase};
use crate::metric::labels::Labels;
use crate::metric::time_series::Series;
use crate::utils::error::QueryError;

use super::series::{MergedSeries, RemoteSeries};
use super::{ConcreteSeriesSet, Querier, SelectParams, SeriesSet};

/// How the sample at a timestamp is picked when several backends report the same series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
  /// The first non-stale sample in backend priority order. A stale marker is only surfaced when
  /// every backend reporting the timestamp is stale.
  #[default]
  NonStaleFirst,

  /// The sample of the highest-priority backend reporting the timestamp, stale or not.
  Priority,
}

/// Fans a query out to several queriers and merges the results into one set without duplicate
/// series. Queriers are given in priority order.
pub struct MergeQuerier {
  queriers: Vec<Arc<dyn Querier>>,
  policy: MergePolicy,
}

impl MergeQuerier {
  pub fn new(queriers: Vec<Arc<dyn Querier>>, policy: MergePolicy) -> Self {
    MergeQuerier { queriers, policy }
  }

  pub fn get_policy(&self) -> MergePolicy {
    self.policy
  }

  pub fn len(&self) -> usize {
    self.queriers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.queriers.is_empty()
  }

  /// Group the series by labels, keeping the replicas of each group in priority order.
  fn merge(&self, sets: Vec<ConcreteSeriesSet>) -> Vec<RemoteSeries> {
    let mut groups: BTreeMap<Labels, Vec<Series>> = BTreeMap::new();
    for set in sets {
      for series in set.into_series() {
        let labels = series.get_labels().clone();
        groups.entry(labels).or_default().extend(series.into_replicas());
      }
    }

    groups
      .into_iter()
      .map(|(labels, mut replicas)| {
        if replicas.len() == 1 {
          RemoteSeries::Concrete(replicas.remove(0))
        } else {
          RemoteSeries::Merged(MergedSeries::new(labels, replicas, self.policy))
        }
      })
      .collect()
  }
}

#[async_trait]
impl Querier for MergeQuerier {
  fn name(&self) -> &str {
    "merge"
  }

  async fn select(&self, ctx: &QueryContext, params: &SelectParams) -> Result<SeriesSet, QueryError> {
    let results = ctx
      .run(
        QueryPhase::Evaluation,
        join_all(
          self
            .queriers
            .iter()
            .map(|querier| querier.select(ctx, params)),
        ),
      )
      .await?;

    // A querier failing because the query itself expired or was canceled is not a backend
    // failure.
    ctx.check(QueryPhase::Evaluation)?;

    let mut sets = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (querier, result) in self.queriers.iter().zip(results) {
      match result.and_then(SeriesSet::into_concrete) {
        Ok(set) => sets.push((querier.name(), set)),
        Err(error) => {
          warn!(
            "Backend {} failed for query {}: {}",
            querier.name(),
            params.get_query(),
            error
          );
          failures.push(error.to_string());
        }
      }
    }

    if sets.is_empty() {
      return Err(QueryError::AllBackendsFailed(failures));
    }

    let mut rejected = Vec::new();
    for (name, set) in &sets {
      for description in set.get_rejected() {
        warn!(
          "Discarding invalid series from backend {} for query {}: {}",
          name,
          params.get_query(),
          description
        );
        rejected.push(description.clone());
      }
    }
    if let [querier] = self.queriers.as_slice() {
      if !rejected.is_empty() {
        return Err(QueryError::backend(
          querier.name(),
          format!("invalid series in response: {}", rejected.join("; ")),
        ));
      }
    }

    let merged = self.merge(sets.into_iter().map(|(_, set)| set).collect());
    debug!(
      "Merged {} series for query {} with {} failed backends",
      merged.len(),
      params.get_query(),
      failures.len()
    );
    Ok(SeriesSet::Concrete(ConcreteSeriesSet::new(merged, rejected)))
  }
}
