// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::time_series::Sample;

/// Samples sharing one evaluation timestamp. No two samples may have the same labels.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Vector {
  samples: Vec<Sample>,
}

impl Vector {
  pub fn new(samples: Vec<Sample>) -> Self {
    Vector { samples }
  }

  pub fn get_samples(&self) -> &[Sample] {
    &self.samples
  }

  pub fn push(&mut self, sample: Sample) {
    self.samples.push(sample);
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  /// Checks whether two samples have the same labels, which is semantically undefined.
  pub fn contains_same_labelset(&self) -> bool {
    let mut seen = HashSet::with_capacity(self.samples.len());
    self
      .samples
      .iter()
      .any(|sample| !seen.insert(sample.get_labels()))
  }
}

impl fmt::Display for Vector {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, sample) in self.samples.iter().enumerate() {
      if i > 0 {
        writeln!(f)?;
      }
      write!(f, "{}", sample)?;
    }
    Ok(())
  }
}
