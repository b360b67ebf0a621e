// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::time_series::Series;

/// A set of series, sorted by labels once evaluation completes. No two series may have the same labels.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Matrix {
  series: Vec<Series>,
}

impl Matrix {
  pub fn new(series: Vec<Series>) -> Self {
    Matrix { series }
  }

  pub fn with_capacity(capacity: usize) -> Self {
    Matrix {
      series: Vec::with_capacity(capacity),
    }
  }

  pub fn get_series(&self) -> &[Series] {
    &self.series
  }

  pub fn push(&mut self, series: Series) {
    self.series.push(series);
  }

  pub fn len(&self) -> usize {
    self.series.len()
  }

  pub fn is_empty(&self) -> bool {
    self.series.is_empty()
  }

  /// Sort the series by labels.
  pub fn sort(&mut self) {
    self
      .series
      .sort_by(|a, b| a.get_labels().cmp(b.get_labels()));
  }

  /// Total number of points across all series.
  pub fn total_samples(&self) -> usize {
    self.series.iter().map(|series| series.len()).sum()
  }

  /// Checks whether two series have the same labels, which is semantically undefined.
  pub fn contains_same_labelset(&self) -> bool {
    let mut seen = HashSet::with_capacity(self.series.len());
    self
      .series
      .iter()
      .any(|series| !seen.insert(series.get_labels()))
  }

  pub fn into_series(self) -> Vec<Series> {
    self.series
  }
}

impl fmt::Display for Matrix {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, series) in self.series.iter().enumerate() {
      if i > 0 {
        writeln!(f)?;
      }
      write!(f, "{}", series)?;
    }
    Ok(())
  }
}
