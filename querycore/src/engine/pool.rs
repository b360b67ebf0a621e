// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use crate::metric::matrix::Matrix;
use crate::metric::metric_point::Point;
use crate::utils::sync::Mutex;

// Buffers beyond this many are dropped instead of pooled.
const DEFAULT_MAX_POOLED: usize = 1024;

/// Free list of point buffers shared by all queries of an engine.
#[derive(Debug)]
pub struct PointPool {
  free: Mutex<Vec<Vec<Point>>>,
  max_pooled: usize,
}

impl PointPool {
  pub fn new() -> Self {
    PointPool::with_max_pooled(DEFAULT_MAX_POOLED)
  }

  pub fn with_max_pooled(max_pooled: usize) -> Self {
    PointPool {
      free: Mutex::new(Vec::new()),
      max_pooled,
    }
  }

  /// Get an empty buffer with room for at least `capacity` points.
  pub fn get(&self, capacity: usize) -> Vec<Point> {
    let mut points = self.free.lock().pop().unwrap_or_default();
    points.reserve(capacity);
    points
  }

  /// Return a buffer to the pool. Its contents are discarded.
  pub fn put(&self, mut points: Vec<Point>) {
    points.clear();
    let mut free = self.free.lock();
    if free.len() < self.max_pooled {
      free.push(points);
    }
  }

  /// Return the point buffers of every series in the matrix. Returns the number of buffers
  /// released.
  pub fn put_matrix(&self, matrix: Matrix) -> usize {
    let series = matrix.into_series();
    let count = series.len();
    for s in series {
      self.put(s.into_points());
    }
    count
  }

  /// Number of buffers waiting to be reused.
  pub fn len(&self) -> usize {
    self.free.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Default for PointPool {
  fn default() -> Self {
    PointPool::new()
  }
}
