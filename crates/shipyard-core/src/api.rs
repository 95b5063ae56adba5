//! HTTP API for the deployment pipeline.
//!
//! - `POST /deploy` runs one attempt and answers with the result
//! - `GET /health` reports liveness

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{PipelineError, Stage};
use crate::pipeline::Pipeline;
use crate::types::{DeploymentRequest, DeploymentResult};

/// Shared state for the deployment endpoint.
#[derive(Debug)]
pub struct AppState {
    pub pipeline: Pipeline,
    /// Used when a request carries no deploy token.
    pub deploy_token: Option<String>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, deploy_token: Option<String>) -> Self {
        Self {
            pipeline,
            deploy_token,
        }
    }
}

/// Creates the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/deploy", post(deploy))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn deploy(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeploymentRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let err = PipelineError::validation(format!("Invalid request body: {}", rejection.body_text()));
            return ApiError(err).into_response();
        }
    };
    let request = request.or_token(state.deploy_token.as_deref());

    match state.pipeline.deploy(&request).await {
        Ok(result) => {
            info!(url = ?result.url, "deployment completed via API");
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(err) => ApiError(err).into_response(),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Failure body: `{ "success": false, "error": "...", "stage": "build" }`.
#[derive(Serialize)]
pub struct ErrorResponse {
    #[serde(flatten)]
    pub result: DeploymentResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}

/// Pipeline error rendered with its mapped status code.
struct ApiError(PipelineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            result: DeploymentResult::from(&self.0),
            stage: self.0.stage(),
        };
        (status, Json(body)).into_response()
    }
}
