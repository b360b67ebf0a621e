// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::time::Duration;

use crate::metric::matrix::Matrix;
use crate::metric::metric_point::{is_stale_nan, Point};
use crate::metric::time_series::Series;
use crate::remote::buffer::BufferedSeriesIterator;
use crate::remote::series::{RemoteSeries, SeriesIterator};
use crate::remote::SelectParams;
use crate::utils::error::QueryError;
use crate::utils::time::duration_seconds;

use super::context::{QueryContext, QueryPhase};
use super::pool::PointPool;

// Room reserved up front for the points of one series. Longer series grow their buffer as
// points are recorded.
const MAX_INITIAL_POINTS: usize = 11_000;

// The context is checked once per this many grid steps.
const CONTEXT_CHECK_INTERVAL: usize = 1024;

/// Find the sample for timestamp `t`: the sample at exactly `t`, or else the most recent sample
/// before `t` that is at most `lookback_delta` old. A stale marker counts as no sample.
pub fn vector_selector_single<I: SeriesIterator>(
  it: &mut BufferedSeriesIterator<I>,
  t: i64,
  lookback_delta: i64,
) -> Result<Option<(i64, f64)>, QueryError> {
  let found = it.seek(t);
  if !found {
    if let Some(error) = it.err() {
      return Err(error.clone());
    }
  }

  let mut sample = if found { Some(it.values()) } else { None };
  if sample.map_or(true, |(time, _)| time > t) {
    sample = it
      .peek_back(1)
      .filter(|(time, _)| *time >= t.saturating_sub(lookback_delta));
  }

  Ok(sample.filter(|(_, value)| !is_stale_nan(*value)))
}

/// Samples series on a grid of timestamps, within a sample budget.
#[derive(Debug)]
pub struct Evaluator<'a> {
  ctx: &'a QueryContext,
  pool: &'a PointPool,
  start: i64,
  end: i64,
  interval: i64,
  lookback_delta: i64,
  max_samples: usize,
  current_samples: usize,
}

impl<'a> Evaluator<'a> {
  pub fn new(
    ctx: &'a QueryContext,
    pool: &'a PointPool,
    params: &SelectParams,
    lookback_delta: Duration,
    max_samples: usize,
  ) -> Self {
    Evaluator {
      ctx,
      pool,
      start: params.get_start(),
      end: params.get_end(),
      interval: params.get_step(),
      lookback_delta: duration_seconds(lookback_delta),
      max_samples,
      current_samples: 0,
    }
  }

  /// Number of points recorded so far.
  pub fn get_current_samples(&self) -> usize {
    self.current_samples
  }

  fn num_steps(&self) -> usize {
    if self.interval <= 0 {
      return 1;
    }
    let steps = (i128::from(self.end) - i128::from(self.start)) / i128::from(self.interval) + 1;
    usize::try_from(steps).unwrap_or(usize::MAX)
  }

  /// Sample every series at each grid timestamp. Points carry the grid timestamp. Series without
  /// any sample are left out, and the result is sorted by labels.
  ///
  /// On error, the storage of the partial result is returned to the pool.
  pub fn eval(&mut self, series: &[RemoteSeries]) -> Result<Matrix, QueryError> {
    let mut matrix = Matrix::with_capacity(series.len());
    match self.eval_into(series, &mut matrix) {
      Ok(()) => {
        matrix.sort();
        Ok(matrix)
      }
      Err(error) => {
        self.pool.put_matrix(matrix);
        Err(error)
      }
    }
  }

  fn eval_into(&mut self, series: &[RemoteSeries], matrix: &mut Matrix) -> Result<(), QueryError> {
    let num_steps = self.num_steps();
    let mut it = BufferedSeriesIterator::new(self.lookback_delta);

    for s in series {
      self.ctx.check(QueryPhase::Evaluation)?;

      it.reset(s.iterator());
      let remaining = self.max_samples.saturating_sub(self.current_samples);
      let mut points = self
        .pool
        .get(num_steps.min(remaining).min(MAX_INITIAL_POINTS));
      if let Err(error) = self.sample_series(&mut it, &mut points) {
        self.pool.put(points);
        return Err(error);
      }

      if points.is_empty() {
        self.pool.put(points);
      } else {
        matrix.push(Series::new(s.get_labels().clone(), points));
      }
    }
    Ok(())
  }

  fn sample_series<I: SeriesIterator>(
    &mut self,
    it: &mut BufferedSeriesIterator<I>,
    points: &mut Vec<Point>,
  ) -> Result<(), QueryError> {
    let mut ts = self.start;
    let mut steps: usize = 0;
    loop {
      steps += 1;
      if steps % CONTEXT_CHECK_INTERVAL == 0 {
        self.ctx.check(QueryPhase::Evaluation)?;
      }

      if let Some((_, value)) = vector_selector_single(it, ts, self.lookback_delta)? {
        if self.current_samples >= self.max_samples {
          return Err(QueryError::TooManySamples("query execution".to_owned()));
        }
        self.current_samples += 1;
        points.push(Point::new(ts, value));
      }

      if self.interval <= 0 {
        return Ok(());
      }
      match ts.checked_add(self.interval) {
        Some(next) if next <= self.end => ts = next,
        _ => return Ok(()),
      }
    }
  }
}
