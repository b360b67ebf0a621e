// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use serde::Serialize;

use super::query_result::{QueryResult, QueryValue, ValueType};

const STATUS_SUCCESS: &str = "success";
const STATUS_ERROR: &str = "error";

/// The data section of a successful response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryData {
  #[serde(rename = "resultType")]
  result_type: ValueType,

  result: QueryValue,
}

/// A query response in the Prometheus HTTP API shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
  status: &'static str,

  #[serde(skip_serializing_if = "Option::is_none")]
  data: Option<QueryData>,

  #[serde(rename = "errorType", skip_serializing_if = "Option::is_none")]
  error_type: Option<&'static str>,

  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

impl QueryResponse {
  pub fn get_status(&self) -> &str {
    self.status
  }

  pub fn get_data(&self) -> Option<&QueryData> {
    self.data.as_ref()
  }

  pub fn get_error_type(&self) -> Option<&str> {
    self.error_type
  }
}

impl QueryData {
  pub fn get_result_type(&self) -> ValueType {
    self.result_type
  }

  pub fn get_result(&self) -> &QueryValue {
    &self.result
  }
}

impl From<QueryResult> for QueryResponse {
  fn from(result: QueryResult) -> Self {
    match result.into_result() {
      Ok(value) => QueryResponse {
        status: STATUS_SUCCESS,
        data: Some(QueryData {
          result_type: value.value_type(),
          result: value,
        }),
        error_type: None,
        error: None,
      },
      Err(error) => QueryResponse {
        status: STATUS_ERROR,
        data: None,
        error_type: Some(error.error_type()),
        error: Some(error.to_string()),
      },
    }
  }
}
