use axum::{
	Json, Router,
	extract::{Path, State, rejection::JsonRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;
use uuid::Uuid;

use roost_domain::{SearchRequest, SearchResult};
use roost_service::{
	CacheStatistics, Error, HealthReport, HealthStatus, IndexEvent, IndexKind, IndexesInfo,
	IndexingReport, MetricsSnapshot,
};

use crate::{
	events::{self, RetryExhausted},
	state::AppState,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search", post(search))
		.route("/v1/index/events", post(index_event))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/v1/admin/health", get(admin_health))
		.route("/v1/admin/metrics", get(metrics))
		.route("/v1/admin/indexes", get(indexes_info))
		.route("/v1/admin/indexes/ensure", post(ensure_indexes))
		.route("/v1/admin/indexes/recreate", post(recreate_indexes))
		.route("/v1/admin/units/{unit_id}/reindex", post(reindex_unit))
		.route("/v1/admin/cache", get(cache_statistics))
		.route("/v1/admin/cache/flush", post(flush_cache))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResult>, ApiError> {
	let Json(request) = payload?;
	let result = state.service.search(request).await?;

	Ok(Json(result))
}

async fn index_event(
	State(state): State<AppState>,
	payload: Result<Json<IndexEvent>, JsonRejection>,
) -> Result<Json<IndexingReport>, ApiError> {
	let Json(event) = payload?;
	let report =
		events::apply_with_retry(&state.service, event, &state.service.cfg.indexing.retry).await?;

	Ok(Json(report))
}

async fn admin_health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
	let report = state.service.check_health().await;
	let status = match report.status {
		HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
		HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
	};

	(status, Json(report))
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
	Json(state.service.metrics_snapshot())
}

async fn indexes_info(State(state): State<AppState>) -> Result<Json<IndexesInfo>, ApiError> {
	Ok(Json(state.service.indexes_info().await?))
}

#[derive(Debug, Serialize)]
struct EnsureResponse {
	built: Vec<IndexKind>,
}

async fn ensure_indexes(State(state): State<AppState>) -> Result<Json<EnsureResponse>, ApiError> {
	let built = state.service.ensure_indexes().await?;

	Ok(Json(EnsureResponse { built }))
}

async fn recreate_indexes(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
	state.service.recreate_indexes().await?;

	Ok(StatusCode::NO_CONTENT)
}

async fn reindex_unit(
	State(state): State<AppState>,
	Path(unit_id): Path<Uuid>,
) -> Result<Json<IndexingReport>, ApiError> {
	Ok(Json(state.service.reindex_unit(unit_id).await?))
}

async fn cache_statistics(State(state): State<AppState>) -> Json<CacheStatistics> {
	Json(state.service.cache_statistics().await)
}

async fn flush_cache(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
	state.service.flush_cache().await?;

	Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	entity: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
	entity: Option<String>,
}
impl ApiError {
	fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
		Self { status, error_code, message: message.into(), entity: None }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			Error::NotFound { message } => Self::new(StatusCode::NOT_FOUND, "not_found", message),
			Error::BackendUnavailable { message } =>
				Self::new(StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable", message),
			Error::Storage { message } | Error::Qdrant { message } | Error::Cache { message } => {
				tracing::error!(error = %message, "Request failed on backend error.");

				Self::new(StatusCode::SERVICE_UNAVAILABLE, "backend_error", message)
			},
		}
	}
}
impl From<RetryExhausted> for ApiError {
	fn from(err: RetryExhausted) -> Self {
		if err.last_error.is_caller_error() {
			return Self::from(err.last_error);
		}

		Self {
			status: StatusCode::SERVICE_UNAVAILABLE,
			error_code: "manual_reindex_required",
			message: format!("Indexing failed after {} attempts: {}", err.attempts, err.last_error),
			entity: Some(err.entity),
		}
	}
}
impl From<JsonRejection> for ApiError {
	fn from(err: JsonRejection) -> Self {
		Self::new(StatusCode::BAD_REQUEST, "invalid_request", err.body_text())
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody {
			error_code: self.error_code.to_string(),
			message: self.message,
			entity: self.entity,
		};

		(self.status, Json(body)).into_response()
	}
}
