// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::cmp::Ordering;
use std::fmt;

use approx::abs_diff_eq;
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::constants::STALE_NAN;

/// Returns true when the given value is the stale marker. The check is on the bit pattern,
/// as the stale marker is a NaN and never compares equal to anything.
pub fn is_stale_nan(value: f64) -> bool {
  value.to_bits() == STALE_NAN
}

/// The stale marker as a float.
pub fn stale_nan() -> f64 {
  f64::from_bits(STALE_NAN)
}

/// Format a value the way the wire format expects it: shortest round-trip decimal, "NaN", "+Inf" or "-Inf".
pub fn format_value(value: f64) -> String {
  if value.is_nan() {
    "NaN".to_owned()
  } else if value == f64::INFINITY {
    "+Inf".to_owned()
  } else if value == f64::NEG_INFINITY {
    "-Inf".to_owned()
  } else {
    value.to_string()
  }
}

/// Parse a value formatted as a decimal string.
pub fn parse_value(value: &str) -> Result<f64, String> {
  match value {
    "NaN" => Ok(f64::NAN),
    "+Inf" | "Inf" => Ok(f64::INFINITY),
    "-Inf" => Ok(f64::NEG_INFINITY),
    _ => value
      .parse::<f64>()
      .map_err(|_| format!("Invalid sample value {}", value)),
  }
}

/// Represents a single data point: a timestamp in seconds and a value.
#[derive(Debug, Clone, Copy)]
pub struct Point {
  /// Timestamp, in seconds since the epoch.
  time: i64,

  /// Value for this point. May be the stale marker.
  value: f64,
}

impl Point {
  /// Create a new Point from given time and value.
  pub fn new(time: i64, value: f64) -> Self {
    Point { time, value }
  }

  /// Create a point holding the stale marker.
  pub fn new_stale(time: i64) -> Self {
    Point {
      time,
      value: stale_nan(),
    }
  }

  /// Get time.
  pub fn get_time(&self) -> i64 {
    self.time
  }

  /// Get value.
  pub fn get_value(&self) -> f64 {
    self.value
  }

  /// Set time.
  pub fn set_time(&mut self, time: i64) {
    self.time = time;
  }

  pub fn is_stale(&self) -> bool {
    is_stale_nan(self.value)
  }
}

impl fmt::Display for Point {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} @[{}]", format_value(self.value), self.time)
  }
}

impl PartialEq for Point {
  #[inline]
  fn eq(&self, other: &Point) -> bool {
    // Two points are equal if their times are equal, and their values are either approximately equal,
    // or NaNs with the same bit pattern (so that the stale marker only equals the stale marker).
    if self.time == other.time {
      if self.value.is_nan() || other.value.is_nan() {
        return self.value.to_bits() == other.value.to_bits();
      } else {
        return self.value == other.value || abs_diff_eq!(self.value, other.value);
      }
    }
    false
  }
}

impl PartialOrd for Point {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.time.cmp(&other.time))
  }
}

impl Serialize for Point {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut tuple = serializer.serialize_tuple(2)?;
    tuple.serialize_element(&self.time)?;
    tuple.serialize_element(&format_value(self.value))?;
    tuple.end()
  }
}

impl<'de> Deserialize<'de> for Point {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    struct PointVisitor;

    impl<'de> Visitor<'de> for PointVisitor {
      type Value = Point;

      fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a [timestamp, \"value\"] pair")
      }

      fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Point, A::Error> {
        // Backends report fractional seconds; timestamps are truncated to whole seconds.
        let time: f64 = seq
          .next_element()?
          .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let value: String = seq
          .next_element()?
          .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        let value = parse_value(&value).map_err(de::Error::custom)?;
        Ok(Point::new(time as i64, value))
      }
    }

    deserializer.deserialize_seq(PointVisitor)
  }
}
