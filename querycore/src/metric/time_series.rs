// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::fmt;

use serde::{Deserialize, Serialize};

use super::labels::Labels;
use super::metric_point::Point;

/// A stream of points belonging to one series, sorted by time with unique timestamps.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Series {
  #[serde(rename = "metric")]
  labels: Labels,

  #[serde(rename = "values")]
  points: Vec<Point>,
}

impl Series {
  pub fn new(labels: Labels, points: Vec<Point>) -> Self {
    Series { labels, points }
  }

  pub fn get_labels(&self) -> &Labels {
    &self.labels
  }

  pub fn get_points(&self) -> &[Point] {
    &self.points
  }

  /// Append a point. Callers append in increasing time order.
  pub fn push_point(&mut self, point: Point) {
    debug_assert!(self
      .points
      .last()
      .map_or(true, |last| last.get_time() < point.get_time()));
    self.points.push(point);
  }

  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  /// Give up the point storage, e.g. to return it to a pool.
  pub fn into_points(self) -> Vec<Point> {
    self.points
  }

  /// Split into labels and points.
  pub fn into_parts(self) -> (Labels, Vec<Point>) {
    (self.labels, self.points)
  }
}

impl fmt::Display for Series {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} =>", self.labels)?;
    for point in &self.points {
      write!(f, "\n{}", point)?;
    }
    Ok(())
  }
}

/// A single point belonging to a series; the unit of an instant query.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Sample {
  #[serde(rename = "metric")]
  labels: Labels,

  #[serde(rename = "value")]
  point: Point,
}

impl Sample {
  pub fn new(labels: Labels, point: Point) -> Self {
    Sample { labels, point }
  }

  pub fn get_labels(&self) -> &Labels {
    &self.labels
  }

  pub fn get_point(&self) -> &Point {
    &self.point
  }

  pub fn into_parts(self) -> (Labels, Point) {
    (self.labels, self.point)
  }
}

impl fmt::Display for Sample {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} => {}", self.labels, self.point)
  }
}
