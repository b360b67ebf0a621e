// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! The haquery server.
//!
//! An [Axum](https://docs.rs/axum/latest/axum/) web application exposing the Prometheus query
//! API over a set of redundant metrics backends. Each query is fanned out to all configured
//! backends by querycore, and the merged, deduplicated result is returned in the Prometheus
//! response format.
//!

mod utils;

use std::env;
use std::result::Result;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use hyper::StatusCode;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use querycore::request_manager::query_response::QueryResponse;
use querycore::request_manager::query_result::QueryResult;
use querycore::utils::error::QueryError;
use querycore::QueryCore;

use crate::utils::error::ServerError;
use crate::utils::params::{parse_duration, parse_time};
use crate::utils::settings::Settings;
use crate::utils::shutdown::shutdown_signal;

/// Represents application state.
struct AppState {
  core: QueryCore,
}

#[derive(Debug, Deserialize, Serialize)]
/// Represents an instant query.
struct InstantQuery {
  query: Option<String>,
  time: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
/// Represents a range query.
struct RangeQuery {
  query: Option<String>,
  start: Option<String>,
  end: Option<String>,
  step: Option<String>,
}

/// Build the router serving the given state.
fn router(shared_state: Arc<AppState>) -> Router {
  Router::new()
    .route("/ping", get(ping))
    .route("/", get(ping))
    .route("/api/v1/query", get(query))
    .route("/api/v1/query_range", get(query_range))
    // State that is passed to each request.
    .with_state(shared_state)
    // Layer for tracing in debug mode.
    .layer(TraceLayer::new_for_http())
}

/// Axum application for the haquery server.
fn app(config_dir_path: &str) -> Result<(Router, Settings), ServerError> {
  // Read the settings from the config directory.
  let settings = Settings::new(config_dir_path)?;
  let core = QueryCore::new(config_dir_path)?;
  let shared_state = Arc::new(AppState { core });

  Ok((router(shared_state), settings))
}

async fn run_server() -> Result<(), ServerError> {
  // Config directory path is relative to the current directory, and set in environment variable "HAQUERY_CONFIG_DIR_PATH".
  // Defaults to "config" if not set.
  let config_dir_path = &env::var("HAQUERY_CONFIG_DIR_PATH").unwrap_or_else(|_| "config".to_owned());

  // Create app.
  let (app, settings) = app(config_dir_path)?;

  // Start server.
  let port = settings.get_server_settings().get_port();
  let host = settings.get_server_settings().get_host();
  let connection_string = &format!("{}:{}", host, port);
  let listener = TcpListener::bind(connection_string).await.map_err(|e| {
    ServerError::StartupError(format!("Could not listen using {}: {}", connection_string, e))
  })?;

  info!(
    "Starting haquery server on {}. Use Ctrl-C or SIGTERM to gracefully exit...",
    connection_string
  );

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  info!("Completed haquery server shutdown");
  Ok(())
}

/// Program entry point.
fn main() -> Result<(), ServerError> {
  // If log level isn't set, set it to info.
  if env::var("RUST_LOG").is_err() {
    env::set_var("RUST_LOG", "info")
  }

  // Set up logging.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let runtime = tokio::runtime::Builder::new_multi_thread()
    .enable_all() // Enables both I/O and time drivers
    .build()?;

  runtime.block_on(run_server())
}

/// Map a query result to the HTTP status and the Prometheus response body.
fn to_response(result: QueryResult) -> (StatusCode, Json<QueryResponse>) {
  let response = QueryResponse::from(result);
  let status_code = match response.get_error_type() {
    None => StatusCode::OK,
    Some("bad_data") => StatusCode::BAD_REQUEST,
    Some("execution") => StatusCode::UNPROCESSABLE_ENTITY,
    Some("timeout") | Some("canceled") => StatusCode::SERVICE_UNAVAILABLE,
    Some("unavailable") => StatusCode::BAD_GATEWAY,
    Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
  };
  (status_code, Json(response))
}

fn bad_request(error: ServerError) -> (StatusCode, Json<QueryResponse>) {
  to_response(QueryResult::from_error(QueryError::from(error)))
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ServerError> {
  value
    .as_deref()
    .filter(|value| !value.is_empty())
    .ok_or_else(|| ServerError::InvalidParameter(format!("{} is required", name)))
}

/// Evaluate an instant query, at the given time or now.
async fn query(
  State(state): State<Arc<AppState>>,
  Query(instant_query): Query<InstantQuery>,
) -> (StatusCode, Json<QueryResponse>) {
  debug!("Instant query for HTTP query: {:?}", instant_query);

  let query_text = match required(&instant_query.query, "query") {
    Ok(query_text) => query_text,
    Err(error) => return bad_request(error),
  };

  let result = match instant_query.time.as_deref() {
    Some(time) => match parse_time(time) {
      Ok(time) => state.core.instant_query_at(query_text, time).await,
      Err(error) => return bad_request(error),
    },
    None => state.core.instant_query(query_text).await,
  };
  to_response(result)
}

/// Parse and check the parameters of a range query.
fn parse_range(params: &RangeQuery) -> Result<(&str, i64, i64, i64), ServerError> {
  let query_text = required(&params.query, "query")?;
  let start = parse_time(required(&params.start, "start")?)?;
  let end = parse_time(required(&params.end, "end")?)?;
  let step = parse_duration(required(&params.step, "step")?)?;
  if step <= 0 {
    return Err(ServerError::InvalidParameter(
      "zero or negative query resolution step widths are not accepted".to_owned(),
    ));
  }
  Ok((query_text, start, end, step))
}

/// Evaluate a range query.
async fn query_range(
  State(state): State<Arc<AppState>>,
  Query(range_query): Query<RangeQuery>,
) -> (StatusCode, Json<QueryResponse>) {
  debug!("Range query for HTTP query: {:?}", range_query);

  let parsed = parse_range(&range_query);

  match parsed {
    Ok((query_text, start, end, step)) => {
      to_response(state.core.range_query(query_text, start, end, step).await)
    }
    Err(error) => bad_request(error),
  }
}

/// Ping to check if the server is up.
async fn ping(State(_state): State<Arc<AppState>>) -> String {
  "OK".to_owned()
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use async_trait::async_trait;
  use axum::body::{to_bytes, Body};
  use axum::http::{self, Request};
  use serde_json::Value;
  use test_case::test_case;
  use tower::ServiceExt;
  use urlencoding::encode;

  use querycore::engine::context::QueryContext;
  use querycore::engine::EngineOpts;
  use querycore::metric::labels::Labels;
  use querycore::metric::metric_point::Point;
  use querycore::metric::time_series::Series;
  use querycore::remote::merge::{MergePolicy, MergeQuerier};
  use querycore::remote::series::RemoteSeries;
  use querycore::remote::{Querier, SelectParams, SeriesSet};

  use super::*;

  /// A querier answering every select with a fixed set of series, or an error.
  struct FixedQuerier {
    series: Vec<Series>,
    error: Option<QueryError>,
    delay: Duration,
  }

  #[async_trait]
  impl Querier for FixedQuerier {
    fn name(&self) -> &str {
      "fixed"
    }

    async fn select(
      &self,
      _ctx: &QueryContext,
      _params: &SelectParams,
    ) -> Result<SeriesSet, QueryError> {
      tokio::time::sleep(self.delay).await;
      match &self.error {
        Some(error) => Err(error.clone()),
        None => Ok(SeriesSet::from_series(
          self
            .series
            .iter()
            .cloned()
            .map(RemoteSeries::Concrete)
            .collect(),
        )),
      }
    }
  }

  fn up_series() -> Vec<Series> {
    vec![Series::new(
      Labels::from_pairs(&[("__name__", "up"), ("job", "node")]),
      vec![Point::new(1000, 1.0), Point::new(1060, 1.0)],
    )]
  }

  fn replica(error: Option<QueryError>) -> Arc<dyn Querier> {
    Arc::new(FixedQuerier {
      series: up_series(),
      error,
      delay: Duration::ZERO,
    })
  }

  fn test_router(opts: EngineOpts, queriers: Vec<Arc<dyn Querier>>) -> Router {
    let querier = Arc::new(MergeQuerier::new(queriers, MergePolicy::default()));
    router(Arc::new(AppState {
      core: QueryCore::new_with_querier(opts, querier),
    }))
  }

  async fn get(router: Router, uri: &str) -> (StatusCode, Value) {
    let response = router
      .oneshot(
        Request::builder()
          .method(http::Method::GET)
          .uri(uri)
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 10 * 1024 * 1024)
      .await
      .expect("Failed to read body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
  }

  #[tokio::test]
  async fn test_ping() {
    let router = test_router(EngineOpts::default(), vec![replica(None)]);
    let response = router
      .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn test_instant_query_two_replicas() {
    let router = test_router(
      EngineOpts::default(),
      vec![replica(None), replica(None)],
    );
    let (status, body) = get(router, &format!("/api/v1/query?query={}&time=1000", encode("up"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
      body,
      serde_json::json!({
        "status": "success",
        "data": {
          "resultType": "vector",
          "result": [
            {"metric": {"__name__": "up", "job": "node"}, "value": [1000, "1"]}
          ]
        }
      })
    );
  }

  #[tokio::test]
  async fn test_range_query() {
    let router = test_router(
      EngineOpts::default(),
      vec![
        replica(Some(QueryError::backend("a", "connection refused"))),
        replica(None),
      ],
    );
    let (status, body) = get(
      router,
      "/api/v1/query_range?query=up&start=1000&end=1120&step=1m",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["resultType"], "matrix");
    assert_eq!(
      body["data"]["result"][0]["values"],
      serde_json::json!([[1000, "1"], [1060, "1"], [1120, "1"]])
    );
  }

  #[test_case("/api/v1/query"; "missing query")]
  #[test_case("/api/v1/query?query=up&time=yesterday"; "bad time")]
  #[test_case("/api/v1/query_range?query=up&start=0&end=60"; "missing step")]
  #[test_case("/api/v1/query_range?query=up&start=0&end=60&step=0"; "zero step")]
  #[test_case("/api/v1/query_range?query=up&start=60&end=0&step=15"; "end before start")]
  #[tokio::test]
  async fn test_bad_data(uri: &str) {
    let router = test_router(EngineOpts::default(), vec![replica(None)]);
    let (status, body) = get(router, uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["errorType"], "bad_data");
  }

  #[tokio::test]
  async fn test_all_backends_failed() {
    let router = test_router(
      EngineOpts::default(),
      vec![
        replica(Some(QueryError::backend("a", "down"))),
        replica(Some(QueryError::backend("b", "down"))),
      ],
    );
    let (status, body) = get(router, "/api/v1/query?query=up&time=1000").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["errorType"], "unavailable");
  }

  #[tokio::test]
  async fn test_too_many_samples() {
    let router = test_router(
      EngineOpts {
        max_samples: 2,
        ..Default::default()
      },
      vec![replica(None)],
    );
    let (status, body) = get(
      router,
      "/api/v1/query_range?query=up&start=1000&end=1120&step=60",
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errorType"], "execution");
  }

  #[tokio::test]
  async fn test_timeout() {
    let slow: Arc<dyn Querier> = Arc::new(FixedQuerier {
      series: up_series(),
      error: None,
      delay: Duration::from_secs(60),
    });
    let router = test_router(
      EngineOpts {
        timeout: Duration::from_millis(20),
        ..Default::default()
      },
      vec![slow],
    );
    let (status, body) = get(router, "/api/v1/query?query=up&time=1000").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["errorType"], "timeout");
  }
}
