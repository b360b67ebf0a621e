// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::fmt;

use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize, Serializer};

use crate::metric::matrix::Matrix;
use crate::metric::metric_point::format_value;
use crate::metric::vector::Vector;
use crate::utils::error::QueryError;

/// The type of a query value, as reported in `resultType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ValueType {
  #[serde(rename = "vector")]
  Vector,

  #[serde(rename = "matrix")]
  Matrix,

  #[serde(rename = "scalar")]
  Scalar,

  #[serde(rename = "string")]
  String,
}

impl ValueType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ValueType::Vector => "vector",
      ValueType::Matrix => "matrix",
      ValueType::Scalar => "scalar",
      ValueType::String => "string",
    }
  }
}

/// A data point that is not associated with a series. Timestamps are seconds, like everywhere else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scalar {
  pub time: i64,
  pub value: f64,
}

impl Serialize for Scalar {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut tuple = serializer.serialize_tuple(2)?;
    tuple.serialize_element(&self.time)?;
    tuple.serialize_element(&format_value(self.value))?;
    tuple.end()
  }
}

/// A string value at a timestamp (seconds).
#[derive(Debug, Clone, PartialEq)]
pub struct StringValue {
  pub time: i64,
  pub value: String,
}

impl Serialize for StringValue {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut tuple = serializer.serialize_tuple(2)?;
    tuple.serialize_element(&self.time)?;
    tuple.serialize_element(&self.value)?;
    tuple.end()
  }
}

/// The value produced by a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
  Vector(Vector),
  Matrix(Matrix),
  Scalar(Scalar),
  String(StringValue),
}

impl QueryValue {
  pub fn value_type(&self) -> ValueType {
    match self {
      QueryValue::Vector(_) => ValueType::Vector,
      QueryValue::Matrix(_) => ValueType::Matrix,
      QueryValue::Scalar(_) => ValueType::Scalar,
      QueryValue::String(_) => ValueType::String,
    }
  }
}

impl fmt::Display for QueryValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QueryValue::Vector(vector) => write!(f, "{}", vector),
      QueryValue::Matrix(matrix) => write!(f, "{}", matrix),
      QueryValue::Scalar(scalar) => write!(
        f,
        "scalar: {} @[{}]",
        format_value(scalar.value),
        scalar.time
      ),
      QueryValue::String(string) => write!(f, "{}", string.value),
    }
  }
}

/// Holds the value of an executed query, or the error that occurred.
///
/// The typed accessors always report a stored error first; otherwise they fail with
/// [`QueryError::ResultTypeMismatch`] when the value is of another type.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
  result: Result<QueryValue, QueryError>,
}

impl QueryResult {
  pub fn new(result: Result<QueryValue, QueryError>) -> Self {
    QueryResult { result }
  }

  pub fn from_value(value: QueryValue) -> Self {
    QueryResult { result: Ok(value) }
  }

  pub fn from_error(error: QueryError) -> Self {
    QueryResult { result: Err(error) }
  }

  pub fn get_error(&self) -> Option<&QueryError> {
    self.result.as_ref().err()
  }

  pub fn get_value(&self) -> Result<&QueryValue, QueryError> {
    self.result.as_ref().map_err(Clone::clone)
  }

  pub fn is_ok(&self) -> bool {
    self.result.is_ok()
  }

  pub fn vector(&self) -> Result<&Vector, QueryError> {
    match self.get_value()? {
      QueryValue::Vector(vector) => Ok(vector),
      other => Err(mismatch(ValueType::Vector, other)),
    }
  }

  pub fn matrix(&self) -> Result<&Matrix, QueryError> {
    match self.get_value()? {
      QueryValue::Matrix(matrix) => Ok(matrix),
      other => Err(mismatch(ValueType::Matrix, other)),
    }
  }

  pub fn scalar(&self) -> Result<Scalar, QueryError> {
    match self.get_value()? {
      QueryValue::Scalar(scalar) => Ok(*scalar),
      other => Err(mismatch(ValueType::Scalar, other)),
    }
  }

  pub fn string(&self) -> Result<&StringValue, QueryError> {
    match self.get_value()? {
      QueryValue::String(string) => Ok(string),
      other => Err(mismatch(ValueType::String, other)),
    }
  }

  pub fn into_result(self) -> Result<QueryValue, QueryError> {
    self.result
  }
}

fn mismatch(expected: ValueType, actual: &QueryValue) -> QueryError {
  QueryError::ResultTypeMismatch {
    expected: expected.as_str(),
    actual: actual.value_type().as_str(),
  }
}

impl fmt::Display for QueryResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.result {
      Ok(value) => write!(f, "{}", value),
      Err(error) => write!(f, "{}", error),
    }
  }
}
