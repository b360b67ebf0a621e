// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::collections::VecDeque;

use crate::utils::error::QueryError;

use super::series::SeriesIterator;

/// Ring of recent samples, holding only samples within `delta` of the newest one.
#[derive(Debug)]
struct SampleRing {
  delta: i64,
  buf: VecDeque<(i64, f64)>,
}

impl SampleRing {
  fn new(delta: i64) -> Self {
    SampleRing {
      delta,
      buf: VecDeque::new(),
    }
  }

  fn reset(&mut self) {
    self.buf.clear();
  }

  fn add(&mut self, t: i64, v: f64) {
    self.buf.push_back((t, v));
    let min_time = t.saturating_sub(self.delta);
    while let Some((front_time, _)) = self.buf.front() {
      if *front_time >= min_time {
        break;
      }
      self.buf.pop_front();
    }
  }

  /// The n-th most recent sample, 1-based.
  fn nth_last(&self, n: usize) -> Option<(i64, f64)> {
    if n == 0 || n > self.buf.len() {
      return None;
    }
    self.buf.get(self.buf.len() - n).copied()
  }
}

/// Wraps a series iterator and remembers the samples it moved past, so that "the latest sample
/// before t, at most delta old" can be answered without rescanning the series.
///
/// Seeks are expected in increasing order. A seek to a time earlier than the previous one
/// rewinds the underlying iterator and rescans from the beginning.
#[derive(Debug)]
pub struct BufferedSeriesIterator<I> {
  it: Option<I>,
  buf: SampleRing,
  ok: bool,
  // Time of the current sample. None until the underlying iterator is first positioned.
  last_time: Option<i64>,
  last_seek: i64,
}

impl<I: SeriesIterator> BufferedSeriesIterator<I> {
  /// Create an iterator that buffers samples at most `delta` seconds older than the current one.
  pub fn new(delta: i64) -> Self {
    BufferedSeriesIterator {
      it: None,
      buf: SampleRing::new(delta),
      ok: false,
      last_time: None,
      last_seek: i64::MIN,
    }
  }

  /// Rebind to a new iterator and forget all buffered samples.
  pub fn reset(&mut self, it: I) {
    self.it = Some(it);
    self.restart();
  }

  fn restart(&mut self) {
    self.buf.reset();
    self.ok = true;
    self.last_time = None;
    self.last_seek = i64::MIN;
  }

  /// Advance to the first sample with timestamp >= t, buffering the samples moved past.
  pub fn seek(&mut self, t: i64) -> bool {
    if t < self.last_seek {
      if let Some(it) = self.it.as_mut() {
        it.rewind();
      }
      self.restart();
    }
    self.last_seek = t;

    let it = match self.it.as_mut() {
      Some(it) => it,
      None => return false,
    };

    // If seeking to t - delta would move backwards, keep the buffer and advance normally, filling
    // the buffer on the way.
    let t0 = t.saturating_sub(self.buf.delta);
    if self.last_time.map_or(true, |last_time| t0 > last_time) {
      self.buf.reset();
      self.ok = it.seek(t0);
      if !self.ok {
        return false;
      }
      self.last_time = Some(it.at().0);
    }

    if self.last_time.map_or(false, |last_time| last_time >= t) {
      return true;
    }
    while self.next() {
      if self.last_time.map_or(false, |last_time| last_time >= t) {
        return true;
      }
    }
    false
  }

  /// Advance by one sample, buffering the current one.
  pub fn next(&mut self) -> bool {
    if !self.ok {
      return false;
    }
    let it = match self.it.as_mut() {
      Some(it) => it,
      None => return false,
    };

    let (t, v) = it.at();
    self.buf.add(t, v);
    self.ok = it.next();
    if self.ok {
      self.last_time = Some(it.at().0);
    }
    self.ok
  }

  /// The sample at the current position. Only valid after a successful seek or next.
  pub fn values(&self) -> (i64, f64) {
    self
      .it
      .as_ref()
      .map_or((i64::MIN, f64::NAN), |it| it.at())
  }

  /// The n-th most recent sample before the current position (1-based), if it was buffered.
  pub fn peek_back(&self, n: usize) -> Option<(i64, f64)> {
    self.buf.nth_last(n)
  }

  /// The error of the underlying iterator, if any.
  pub fn err(&self) -> Option<&QueryError> {
    self.it.as_ref().and_then(|it| it.err())
  }
}
