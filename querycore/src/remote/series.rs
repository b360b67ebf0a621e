// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! Series as seen by the evaluator: a label set plus an iterator over its samples.
//!
//! A series either comes straight from one backend ([`RemoteSeries::Concrete`]) or is the
//! union of the same series reported by several backends ([`RemoteSeries::Merged`]).

use crate::metric::labels::Labels;
use crate::metric::metric_point::{is_stale_nan, Point};
use crate::metric::time_series::Series;
use crate::utils::error::QueryError;

use super::merge::MergePolicy;

/// Iterates over the samples of one series in time order.
pub trait SeriesIterator {
  /// Advance to the first sample with timestamp >= t. Never moves backwards.
  fn seek(&mut self, t: i64) -> bool;

  /// The sample at the current position. Only valid after a successful seek or next.
  fn at(&self) -> (i64, f64);

  /// Advance by one sample.
  fn next(&mut self) -> bool;

  /// Go back to before the first sample.
  fn rewind(&mut self);

  /// The error the underlying source ran into, if any.
  fn err(&self) -> Option<&QueryError> {
    None
  }
}

/// Iterator over the points of a series reported by one backend.
#[derive(Debug, Clone)]
pub struct ConcreteSeriesIterator<'a> {
  points: &'a [Point],
  // None until the first seek or next.
  cur: Option<usize>,
}

impl<'a> ConcreteSeriesIterator<'a> {
  pub fn new(points: &'a [Point]) -> Self {
    ConcreteSeriesIterator { points, cur: None }
  }
}

impl SeriesIterator for ConcreteSeriesIterator<'_> {
  fn seek(&mut self, t: i64) -> bool {
    let start = match self.cur {
      Some(cur) if cur < self.points.len() && self.points[cur].get_time() >= t => return true,
      Some(cur) => cur.min(self.points.len()),
      None => 0,
    };
    let index = start
      + self.points[start..].partition_point(|point| point.get_time() < t);
    self.cur = Some(index);
    index < self.points.len()
  }

  fn at(&self) -> (i64, f64) {
    self
      .cur
      .and_then(|cur| self.points.get(cur))
      .map_or((i64::MIN, f64::NAN), |point| {
        (point.get_time(), point.get_value())
      })
  }

  fn next(&mut self) -> bool {
    let next = match self.cur {
      Some(cur) => (cur + 1).min(self.points.len()),
      None => 0,
    };
    self.cur = Some(next);
    next < self.points.len()
  }

  fn rewind(&mut self) {
    self.cur = None;
  }
}

/// The same series reported by two or more backends, in backend priority order.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedSeries {
  labels: Labels,
  replicas: Vec<Series>,
  policy: MergePolicy,
}

impl MergedSeries {
  pub fn new(labels: Labels, replicas: Vec<Series>, policy: MergePolicy) -> Self {
    MergedSeries {
      labels,
      replicas,
      policy,
    }
  }

  pub fn get_replicas(&self) -> &[Series] {
    &self.replicas
  }

  pub fn iterator(&self) -> MergedSeriesIterator<'_> {
    MergedSeriesIterator {
      replicas: self
        .replicas
        .iter()
        .map(|series| ConcreteSeriesIterator::new(series.get_points()))
        .collect(),
      ok: vec![false; self.replicas.len()],
      policy: self.policy,
      cur: None,
      started: false,
    }
  }
}

/// Walks the union of the replicas' timestamps. At each timestamp, the sample is picked from the
/// replicas that have one, in priority order, according to the merge policy.
#[derive(Debug, Clone)]
pub struct MergedSeriesIterator<'a> {
  replicas: Vec<ConcreteSeriesIterator<'a>>,
  // Whether each replica is positioned on a sample.
  ok: Vec<bool>,
  policy: MergePolicy,
  cur: Option<(i64, f64)>,
  started: bool,
}

impl MergedSeriesIterator<'_> {
  /// Pick the sample at the smallest timestamp any replica is positioned on.
  fn select(&mut self) -> bool {
    let min_time = self
      .replicas
      .iter()
      .zip(&self.ok)
      .filter(|(_, ok)| **ok)
      .map(|(replica, _)| replica.at().0)
      .min();

    self.cur = min_time.and_then(|min_time| {
      let mut candidates = self
        .replicas
        .iter()
        .zip(&self.ok)
        .filter(|(replica, ok)| **ok && replica.at().0 == min_time)
        .map(|(replica, _)| replica.at());

      match self.policy {
        MergePolicy::Priority => candidates.next(),
        MergePolicy::NonStaleFirst => {
          let first = candidates.next()?;
          if !is_stale_nan(first.1) {
            return Some(first);
          }
          // Every candidate is stale: surface the stale marker of the first one.
          candidates
            .find(|(_, value)| !is_stale_nan(*value))
            .or(Some(first))
        }
      }
    });
    self.cur.is_some()
  }
}

impl SeriesIterator for MergedSeriesIterator<'_> {
  fn seek(&mut self, t: i64) -> bool {
    if let Some((time, _)) = self.cur {
      if time >= t {
        return true;
      }
    }
    self.started = true;
    for (replica, ok) in self.replicas.iter_mut().zip(self.ok.iter_mut()) {
      *ok = replica.seek(t);
    }
    self.select()
  }

  fn at(&self) -> (i64, f64) {
    self.cur.unwrap_or((i64::MIN, f64::NAN))
  }

  fn next(&mut self) -> bool {
    if !self.started {
      self.started = true;
      for (replica, ok) in self.replicas.iter_mut().zip(self.ok.iter_mut()) {
        *ok = replica.next();
      }
      return self.select();
    }

    let (time, _) = match self.cur {
      Some(cur) => cur,
      None => return false,
    };
    for (replica, ok) in self.replicas.iter_mut().zip(self.ok.iter_mut()) {
      if *ok && replica.at().0 == time {
        *ok = replica.next();
      }
    }
    self.select()
  }

  fn rewind(&mut self) {
    for replica in self.replicas.iter_mut() {
      replica.rewind();
    }
    self.ok.iter_mut().for_each(|ok| *ok = false);
    self.cur = None;
    self.started = false;
  }
}

/// A series returned by a querier.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteSeries {
  /// Reported by a single backend.
  Concrete(Series),

  /// Reported by several backends and merged.
  Merged(MergedSeries),
}

impl RemoteSeries {
  pub fn get_labels(&self) -> &Labels {
    match self {
      RemoteSeries::Concrete(series) => series.get_labels(),
      RemoteSeries::Merged(merged) => &merged.labels,
    }
  }

  pub fn iterator(&self) -> RemoteSeriesIterator<'_> {
    match self {
      RemoteSeries::Concrete(series) => {
        RemoteSeriesIterator::Concrete(ConcreteSeriesIterator::new(series.get_points()))
      }
      RemoteSeries::Merged(merged) => RemoteSeriesIterator::Merged(merged.iterator()),
    }
  }

  /// The backend series this series is made of, in priority order.
  pub fn into_replicas(self) -> Vec<Series> {
    match self {
      RemoteSeries::Concrete(series) => vec![series],
      RemoteSeries::Merged(merged) => merged.replicas,
    }
  }
}

/// Iterator over a [`RemoteSeries`].
#[derive(Debug, Clone)]
pub enum RemoteSeriesIterator<'a> {
  Concrete(ConcreteSeriesIterator<'a>),
  Merged(MergedSeriesIterator<'a>),
}

impl SeriesIterator for RemoteSeriesIterator<'_> {
  fn seek(&mut self, t: i64) -> bool {
    match self {
      RemoteSeriesIterator::Concrete(it) => it.seek(t),
      RemoteSeriesIterator::Merged(it) => it.seek(t),
    }
  }

  fn at(&self) -> (i64, f64) {
    match self {
      RemoteSeriesIterator::Concrete(it) => it.at(),
      RemoteSeriesIterator::Merged(it) => it.at(),
    }
  }

  fn next(&mut self) -> bool {
    match self {
      RemoteSeriesIterator::Concrete(it) => it.next(),
      RemoteSeriesIterator::Merged(it) => it.next(),
    }
  }

  fn rewind(&mut self) {
    match self {
      RemoteSeriesIterator::Concrete(it) => it.rewind(),
      RemoteSeriesIterator::Merged(it) => it.rewind(),
    }
  }

  fn err(&self) -> Option<&QueryError> {
    match self {
      RemoteSeriesIterator::Concrete(it) => it.err(),
      RemoteSeriesIterator::Merged(it) => it.err(),
    }
  }
}
