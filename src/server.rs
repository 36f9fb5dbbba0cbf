//! HTTP surface of the façade.
//!
//! One GET route per entry in `operations::OPERATION_REGISTRY`, plus a
//! health check and a JSON 404 fallback. Every outcome, success or
//! failure, leaves as `application/json`; no request error can take the
//! process down.

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{ConfigError, FacadeConfig};
use crate::ingest::airqino::AirqinoClient;
use crate::logging;
use crate::model::{FacadeError, RequestParameters, Translated};
use crate::operations::{self, Operation, OPERATION_REGISTRY};
use crate::translate::{translate, ReadingPolicy};

// Application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub client: AirqinoClient,
    pub policy: ReadingPolicy,
}

impl AppState {
    pub fn from_config(config: &FacadeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client: AirqinoClient::new(&config.upstream_base_url, config.request_timeout())?,
            policy: config.reading_policy(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub upstream: String,
    pub checked_at: String,
}

pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new().route("/api/health", get(health_check));

    for spec in OPERATION_REGISTRY {
        let operation = spec.operation;
        router = router.route(
            &operation.route_path(),
            get(
                move |state: State<AppState>, path: Path<Vec<(String, String)>>| {
                    handle_operation(state, operation, path)
                },
            ),
        );
    }

    router
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET])
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Resolve, fetch and translate one operation.
///
/// This is the whole request pipeline minus HTTP framing, so it can be
/// driven directly by callers that already hold `RequestParameters`.
pub async fn serve_operation(
    state: &AppState,
    operation: Operation,
    params: &RequestParameters,
) -> Result<Translated, FacadeError> {
    let response = state.client.fetch_operation(operation, params).await?;
    translate(operation.shape(), &response, state.policy)
}

async fn handle_operation(
    State(state): State<AppState>,
    operation: Operation,
    Path(pairs): Path<Vec<(String, String)>>,
) -> Result<Json<Translated>, FacadeError> {
    let params = RequestParameters::from(pairs);

    match serve_operation(&state, operation, &params).await {
        Ok(translated) => Ok(Json(translated)),
        Err(e) => {
            logging::log_upstream_failure(operation, &e);
            Err(e)
        }
    }
}

// Health check endpoint; never touches the upstream.
async fn health_check(State(state): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        upstream: state.client.base_url().to_string(),
        checked_at: Utc::now().to_rfc3339(),
    })
}

async fn not_found(uri: Uri) -> FacadeError {
    unmatched_path_error(uri.path())
}

/// Error for a path no route matched.
///
/// The router never matches an empty segment, so `/api/getRange/S1//B` or
/// `/api/getCurrentValues/` lands here. A known operation with no more
/// segments than it takes is answered the way the resolver would answer it,
/// with `MissingParameter` for the first blank one. Nothing is fetched.
pub fn unmatched_path_error(path: &str) -> FacadeError {
    let not_found = || FacadeError::NotFound(path.to_string());

    let mut segments = path.trim_start_matches('/').split('/');
    if segments.next() != Some("api") {
        return not_found();
    }
    let Some(spec) = segments
        .next()
        .and_then(|name| OPERATION_REGISTRY.iter().find(|s| s.name == name))
    else {
        return not_found();
    };

    let values: Vec<&str> = segments.collect();
    if values.len() > spec.params.len() {
        return not_found();
    }
    let params: RequestParameters = spec
        .params
        .iter()
        .zip(&values)
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect::<Vec<_>>()
        .into();

    match operations::build_upstream_url("", spec.operation, &params) {
        Err(e) => e,
        Ok(_) => not_found(),
    }
}

/// HTTP status a façade error is served with.
pub fn status_for(err: &FacadeError) -> StatusCode {
    match err {
        FacadeError::MissingParameter(_) => StatusCode::BAD_REQUEST,
        FacadeError::UpstreamUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
        FacadeError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        FacadeError::UpstreamError { .. } | FacadeError::DecodeError(_) => StatusCode::BAD_GATEWAY,
        FacadeError::NotFound(_) => StatusCode::NOT_FOUND,
    }
}

impl IntoResponse for FacadeError {
    fn into_response(self) -> Response {
        let upstream_status = match &self {
            FacadeError::UpstreamError { status, .. } => Some(*status),
            _ => None,
        };
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
            upstream_status,
        };
        (status_for(&self), Json(body)).into_response()
    }
}

/// Resolves when the process receives Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("could not install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("got SIGINT, shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::header::CONTENT_TYPE;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&FacadeError::MissingParameter("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&FacadeError::UpstreamUnreachable("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&FacadeError::UpstreamTimeout(10)),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&FacadeError::UpstreamError {
                status: 500,
                body: String::new()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&FacadeError::DecodeError("x".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_upstream_error_body_embeds_upstream_status() {
        let response = FacadeError::UpstreamError {
            status: 500,
            body: "boom".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let json = body_json(response).await;
        assert_eq!(json["error"], "upstream_error");
        assert_eq!(json["upstream_status"], 500);
        assert_eq!(json["message"], "upstream returned HTTP 500: boom");
    }

    #[test]
    fn test_blank_operation_segment_is_missing_parameter() {
        assert_eq!(
            unmatched_path_error("/api/getCurrentValues/"),
            FacadeError::MissingParameter("station_name".into())
        );
        assert_eq!(
            unmatched_path_error("/api/getRange/SMART16//2024-01-02"),
            FacadeError::MissingParameter("dt_from_string".into())
        );
        assert_eq!(
            unmatched_path_error("/api/getSingleDay/SMART16"),
            FacadeError::MissingParameter("dt_from_string".into())
        );
    }

    #[test]
    fn test_other_unmatched_paths_are_not_found() {
        for path in [
            "/api/getForecast/SMART16",
            "/api/getCurrentValues/SMART16/extra",
            "/api/getCurrentValues/SMART16/",
            "/getCurrentValues/SMART16",
            "/",
        ] {
            assert_eq!(
                unmatched_path_error(path),
                FacadeError::NotFound(path.to_string()),
                "{}",
                path
            );
        }
    }

    #[tokio::test]
    async fn test_missing_parameter_body_has_no_upstream_status() {
        let response = FacadeError::MissingParameter("station_name".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "missing_parameter");
        assert!(json.get("upstream_status").is_none());
    }
}
