// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::constants::METRIC_NAME_LABEL;

/// A single name/value pair attached to a series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
  name: String,
  value: String,
}

impl Label {
  pub fn new(name: &str, value: &str) -> Self {
    Label {
      name: name.to_owned(),
      value: value.to_owned(),
    }
  }

  pub fn get_name(&self) -> &str {
    &self.name
  }

  pub fn get_value(&self) -> &str {
    &self.value
  }
}

/// The identity of a series: labels sorted by name, with unique names.
///
/// Two label sets with the same sorted content are the same series, no matter which backend
/// reported them. Ordering compares label by label on (name, value) and then by length, which is
/// the order series are emitted in by the merge layer and the evaluator.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Labels {
  labels: Vec<Label>,
}

impl Labels {
  /// Create a label set from labels in any order. When a name appears more than once, the first
  /// occurrence is kept.
  pub fn new(mut labels: Vec<Label>) -> Self {
    // Stable sort, so that dedup_by keeps the first occurrence of every name.
    labels.sort_by(|a, b| a.name.cmp(&b.name));
    labels.dedup_by(|later, earlier| later.name == earlier.name);
    Labels { labels }
  }

  /// Create a label set from (name, value) pairs.
  pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
    Labels::new(
      pairs
        .iter()
        .map(|(name, value)| Label::new(name, value))
        .collect(),
    )
  }

  /// Get the value of the label with the given name.
  pub fn get(&self, name: &str) -> Option<&str> {
    self
      .labels
      .binary_search_by(|label| label.name.as_str().cmp(name))
      .ok()
      .map(|index| self.labels[index].value.as_str())
  }

  /// Get the metric name, i.e. the value of the `__name__` label.
  pub fn get_metric_name(&self) -> Option<&str> {
    self.get(METRIC_NAME_LABEL)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Label> {
    self.labels.iter()
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  /// A hash over the full sorted content. Equal label sets always hash to the same value within a process.
  pub fn hash_value(&self) -> u64 {
    let mut hasher = DefaultHasher::new();
    self.hash(&mut hasher);
    hasher.finish()
  }
}

impl From<BTreeMap<String, String>> for Labels {
  fn from(map: BTreeMap<String, String>) -> Self {
    // BTreeMap iterates in key order, so the labels are already sorted and unique.
    Labels {
      labels: map
        .into_iter()
        .map(|(name, value)| Label { name, value })
        .collect(),
    }
  }
}

impl From<HashMap<String, String>> for Labels {
  fn from(map: HashMap<String, String>) -> Self {
    Labels::from(map.into_iter().collect::<BTreeMap<String, String>>())
  }
}

impl fmt::Display for Labels {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{{")?;
    for (i, label) in self.labels.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{}={:?}", label.name, label.value)?;
    }
    write!(f, "}}")
  }
}

impl Serialize for Labels {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.labels.len()))?;
    for label in &self.labels {
      map.serialize_entry(&label.name, &label.value)?;
    }
    map.end()
  }
}

impl<'de> Deserialize<'de> for Labels {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let map = BTreeMap::<String, String>::deserialize(deserializer)?;
    Ok(Labels::from(map))
  }
}
