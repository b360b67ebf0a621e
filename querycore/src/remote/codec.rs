// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! Decoding of backend query responses into series sets.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::metric::constants::METRIC_NAME_LABEL;
use crate::metric::labels::Labels;
use crate::metric::metric_point::Point;
use crate::metric::time_series::Series;
use crate::request_manager::query_result::ValueType;
use crate::utils::error::QueryError;

use super::series::RemoteSeries;
use super::{ConcreteSeriesSet, SeriesSet};

lazy_static! {
  static ref METRIC_NAME_RE: Regex = Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").unwrap();
  static ref LABEL_NAME_RE: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap();
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
  status: String,
  #[serde(default)]
  data: Option<ApiData>,
  #[serde(rename = "errorType", default)]
  error_type: Option<String>,
  #[serde(default)]
  error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
  #[serde(rename = "resultType")]
  result_type: ValueType,
  result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiSample {
  metric: BTreeMap<String, String>,
  value: Point,
}

#[derive(Debug, Deserialize)]
struct ApiSeries {
  metric: BTreeMap<String, String>,
  values: Vec<Point>,
}

/// Check that a metric name is valid.
pub fn is_valid_metric_name(name: &str) -> bool {
  METRIC_NAME_RE.is_match(name)
}

/// Check that a label name is valid.
pub fn is_valid_label_name(name: &str) -> bool {
  LABEL_NAME_RE.is_match(name)
}

/// Check the names in a label set reported by a backend, returning the labels on success and a
/// description of the problem otherwise.
pub fn validate_labels(metric: BTreeMap<String, String>) -> Result<Labels, String> {
  for name in metric.keys() {
    if name == METRIC_NAME_LABEL {
      continue;
    }
    if !is_valid_label_name(name) {
      return Err(format!("invalid label name {:?}", name));
    }
  }
  if let Some(metric_name) = metric.get(METRIC_NAME_LABEL) {
    if !is_valid_metric_name(metric_name) {
      return Err(format!("invalid metric name {:?}", metric_name));
    }
  }
  Ok(Labels::from(metric))
}

/// Order points by time with unique timestamps. Sub-second samples truncated to the same second
/// keep the latest one.
fn normalize_points(points: Vec<Point>) -> Result<Vec<Point>, String> {
  let mut retval: Vec<Point> = Vec::with_capacity(points.len());
  for point in points {
    if let Some(last) = retval.last_mut() {
      if last.get_time() > point.get_time() {
        return Err(format!(
          "sample at {} is out of order after {}",
          point.get_time(),
          last.get_time()
        ));
      }
      if last.get_time() == point.get_time() {
        *last = point;
        continue;
      }
    }
    retval.push(point);
  }
  Ok(retval)
}

/// Decode the body of a query response from the named backend.
///
/// A response with a non-success status decodes to [`SeriesSet::Error`]. Series with invalid
/// names or unordered samples are left out and described in the set's rejected list.
pub fn decode_response(backend: &str, body: &[u8]) -> Result<SeriesSet, QueryError> {
  let response: ApiResponse = serde_json::from_slice(body)
    .map_err(|e| QueryError::backend(backend, format!("could not decode response: {}", e)))?;

  if response.status != "success" {
    return Ok(SeriesSet::Error(QueryError::backend(
      backend,
      format!(
        "{}: {}",
        response.error_type.unwrap_or_else(|| response.status.clone()),
        response.error.unwrap_or_default()
      ),
    )));
  }

  let data = response
    .data
    .ok_or_else(|| QueryError::backend(backend, "response has no data"))?;
  let decode_error =
    |e: serde_json::Error| QueryError::backend(backend, format!("could not decode result: {}", e));

  let mut series = Vec::new();
  let mut rejected = Vec::new();
  match data.result_type {
    ValueType::Vector => {
      let samples: Vec<ApiSample> = serde_json::from_value(data.result).map_err(decode_error)?;
      for sample in samples {
        match validate_labels(sample.metric) {
          Ok(labels) => series.push(Series::new(labels, vec![sample.value])),
          Err(message) => rejected.push(message),
        }
      }
    }
    ValueType::Matrix => {
      let matrix: Vec<ApiSeries> = serde_json::from_value(data.result).map_err(decode_error)?;
      for raw in matrix {
        let result = validate_labels(raw.metric)
          .and_then(|labels| Ok(Series::new(labels, normalize_points(raw.values)?)));
        match result {
          Ok(s) => series.push(s),
          Err(message) => rejected.push(message),
        }
      }
    }
    other => {
      return Err(QueryError::backend(
        backend,
        format!("unsupported result type {}", other.as_str()),
      ));
    }
  }

  Ok(SeriesSet::Concrete(ConcreteSeriesSet::new(
    series.into_iter().map(RemoteSeries::Concrete).collect(),
    rejected,
  )))
}
