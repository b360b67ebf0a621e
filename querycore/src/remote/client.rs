// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use crate::utils::config::BackendSettings;
use crate::utils::error::QueryError;

use super::codec::decode_response;
use super::{Backend, SeriesSet};

const INSTANT_QUERY_PATH: &str = "/api/v1/query";
const RANGE_QUERY_PATH: &str = "/api/v1/query_range";

// Error bodies longer than this are cut off in error messages.
const MAX_ERROR_MESSAGE_LEN: usize = 256;

/// A backend speaking the Prometheus HTTP query API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
  name: String,
  endpoint: String,
  timeout: Duration,
  client: reqwest::Client,
}

impl HttpBackend {
  /// Create the backend configured at position `index`. The index is part of the name, so that
  /// logs tell backends with the same endpoint apart.
  pub fn new(index: usize, settings: &BackendSettings) -> Result<Self, QueryError> {
    let endpoint = settings.get_endpoint().trim_end_matches('/').to_owned();
    let timeout = settings.get_timeout();
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    Ok(HttpBackend {
      name: format!("{}:{}", index, endpoint),
      endpoint,
      timeout,
      client,
    })
  }

  pub fn get_endpoint(&self) -> &str {
    &self.endpoint
  }

  pub fn get_timeout(&self) -> Duration {
    self.timeout
  }

  async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<SeriesSet, QueryError> {
    let url = format!("{}{}", self.endpoint, path);
    debug!("Sending request to backend {}: {} {:?}", self.name, url, params);

    let response = self
      .client
      .get(&url)
      .query(params)
      .send()
      .await
      .map_err(|e| QueryError::backend(&self.name, e.to_string()))?;

    let status = response.status();
    let body = response
      .bytes()
      .await
      .map_err(|e| QueryError::backend(&self.name, e.to_string()))?;

    if !status.is_success() {
      let len = body.len().min(MAX_ERROR_MESSAGE_LEN);
      return Err(QueryError::backend(
        &self.name,
        format!(
          "server returned HTTP status {}: {}",
          status,
          String::from_utf8_lossy(&body[..len])
        ),
      ));
    }

    decode_response(&self.name, &body)
  }
}

#[async_trait]
impl Backend for HttpBackend {
  fn name(&self) -> &str {
    &self.name
  }

  async fn query_instant(&self, query: &str, time: i64) -> Result<SeriesSet, QueryError> {
    self
      .get(
        INSTANT_QUERY_PATH,
        &[("query", query.to_owned()), ("time", time.to_string())],
      )
      .await
  }

  async fn query_range(
    &self,
    query: &str,
    start: i64,
    end: i64,
    step: i64,
  ) -> Result<SeriesSet, QueryError> {
    self
      .get(
        RANGE_QUERY_PATH,
        &[
          ("query", query.to_owned()),
          ("start", start.to_string()),
          ("end", end.to_string()),
          ("step", step.to_string()),
        ],
      )
      .await
  }
}

#[cfg(test)]
mod tests {
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;
  use tokio::task::JoinHandle;

  use super::*;

  /// Serve one canned HTTP response on a local port. The handle yields the request line.
  async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
      let (mut stream, _) = listener.accept().await.unwrap();
      let mut buf = vec![0u8; 8192];
      let n = stream.read(&mut buf).await.unwrap();
      let request = String::from_utf8_lossy(&buf[..n]).to_string();

      let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
      );
      stream.write_all(response.as_bytes()).await.unwrap();
      stream.shutdown().await.unwrap();
      request.lines().next().unwrap_or_default().to_owned()
    });
    (endpoint, handle)
  }

  fn backend(endpoint: &str) -> HttpBackend {
    HttpBackend::new(0, &BackendSettings::new(endpoint, Duration::from_secs(5))).unwrap()
  }

  #[test]
  fn test_new() {
    let backend = backend("http://localhost:9090/");
    assert_eq!(backend.get_endpoint(), "http://localhost:9090");
    assert_eq!(backend.name(), "0:http://localhost:9090");
    assert_eq!(backend.get_timeout(), Duration::from_secs(5));
  }

  #[tokio::test]
  async fn test_query_instant() {
    let body =
      r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{"__name__":"up","job":"x"},"value":[100,"1"]}]}}"#;
    let (endpoint, handle) = serve_once("200 OK", body.to_owned()).await;

    let set = backend(&endpoint)
      .query_instant("up", 100)
      .await
      .unwrap()
      .into_concrete()
      .unwrap();
    assert_eq!(set.len(), 1);

    let request_line = handle.await.unwrap();
    assert!(request_line.starts_with("GET /api/v1/query?query=up&time=100 "));
  }

  #[tokio::test]
  async fn test_query_range() {
    let body = r#"{"status":"success","data":{"resultType":"matrix","result":[]}}"#;
    let (endpoint, handle) = serve_once("200 OK", body.to_owned()).await;

    let set = backend(&endpoint)
      .query_range("up", 0, 600, 60)
      .await
      .unwrap()
      .into_concrete()
      .unwrap();
    assert!(set.is_empty());

    let request_line = handle.await.unwrap();
    assert!(request_line.starts_with("GET /api/v1/query_range?query=up&start=0&end=600&step=60 "));
  }

  #[tokio::test]
  async fn test_error_status_truncated() {
    let body = "x".repeat(1000);
    let (endpoint, handle) = serve_once("500 Internal Server Error", body).await;

    match backend(&endpoint).query_instant("up", 0).await {
      Err(QueryError::BackendError { backend, message }) => {
        assert_eq!(backend, format!("0:{}", endpoint));
        assert!(message.starts_with("server returned HTTP status 500"));
        assert!(message.ends_with(&"x".repeat(MAX_ERROR_MESSAGE_LEN)));
        assert!(!message.contains(&"x".repeat(MAX_ERROR_MESSAGE_LEN + 1)));
      }
      other => panic!("unexpected result {:?}", other),
    }
    handle.await.unwrap();
  }

  #[tokio::test]
  async fn test_unreachable_backend() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    assert!(matches!(
      backend(&endpoint).query_instant("up", 0).await,
      Err(QueryError::BackendError { .. })
    ));
  }
}
