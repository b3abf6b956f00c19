//! HTTP surface: wire types and the axum router.

use crate::service::{AttendanceService, ServiceError};
use crate::store::AttendanceRecord;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body shared by `/register` and `/mark`.
#[derive(Debug, Deserialize)]
pub struct ImagePayload {
    /// Base64 image bytes, with or without a `data:...;base64,` prefix.
    pub image_base64: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub status: &'static str,
    pub message: String,
    /// Resolved name, which may differ from the request under auto-naming.
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct MarkResponse {
    pub status: &'static str,
    pub name: String,
    pub time: String,
}

#[derive(Debug, Serialize)]
pub struct AttendanceResponse {
    pub status: &'static str,
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub encoder: String,
    pub store_mode: &'static str,
    pub registered: usize,
    pub records: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

/// Operation failures ride the response body as `{"status": "error", ...}`;
/// the HTTP status line stays 200.
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self.0, "request rejected");
        let body = ErrorBody {
            status: "error",
            message: self.0.to_string(),
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

pub fn build_router(service: Arc<AttendanceService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/register", post(register))
        .route("/mark", post(mark))
        .route("/attendance", get(attendance))
        .with_state(service)
}

async fn health(
    State(service): State<Arc<AttendanceService>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let status = service.status()?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        encoder: status.encoder,
        store_mode: status.store_mode.as_str(),
        registered: status.registered,
        records: status.attendance_records,
    }))
}

async fn register(
    State(service): State<Arc<AttendanceService>>,
    Json(payload): Json<ImagePayload>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let outcome = service.register(payload.name, payload.image_base64).await?;
    Ok(Json(RegisterResponse {
        status: "ok",
        message: format!("Face registered for {}", outcome.name),
        name: outcome.name,
    }))
}

async fn mark(
    State(service): State<Arc<AttendanceService>>,
    Json(payload): Json<ImagePayload>,
) -> Result<Json<MarkResponse>, ApiError> {
    let outcome = service.mark(payload.image_base64).await?;
    Ok(Json(MarkResponse {
        status: "ok",
        name: outcome.name,
        time: outcome.time,
    }))
}

async fn attendance(
    State(service): State<Arc<AttendanceService>>,
) -> Result<Json<AttendanceResponse>, ApiError> {
    Ok(Json(AttendanceResponse {
        status: "ok",
        records: service.attendance()?,
    }))
}
