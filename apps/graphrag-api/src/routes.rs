use axum::{
	Json, Router,
	extract::{State, rejection::JsonRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use graphrag_service::{AuthorityRefresh, Error as ServiceError, RetrieveRequest, RetrieveResponse};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/retrieve", post(retrieve))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/v1/admin/authority/refresh", post(refresh_authority))
		.route("/v1/admin/profiles/invalidate", post(invalidate_profiles))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn retrieve(
	State(state): State<AppState>,
	payload: Result<Json<RetrieveRequest>, JsonRejection>,
) -> Result<Json<RetrieveResponse>, ApiError> {
	let Json(request) = payload.map_err(|rejection| {
		json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", rejection.body_text(), None)
	})?;
	let response = state.service.retrieve(request).await?;

	Ok(Json(response))
}

async fn refresh_authority(
	State(state): State<AppState>,
) -> Result<Json<AuthorityRefresh>, ApiError> {
	let refresh = state.service.refresh_authority().await?;

	Ok(Json(refresh))
}

#[derive(Debug, Serialize)]
struct InvalidateResponse {
	evicted: usize,
}

async fn invalidate_profiles(State(state): State<AppState>) -> Json<InvalidateResponse> {
	let evicted = state.service.invalidate_profiles().await;

	tracing::info!(evicted, "Profile cache invalidated.");

	Json(InvalidateResponse { evicted })
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message, None),
			ServiceError::Provider { message } =>
				json_error(StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", message, None),
			ServiceError::Storage { message }
			| ServiceError::Qdrant { message }
			| ServiceError::Backend { message } =>
				json_error(StatusCode::SERVICE_UNAVAILABLE, "BACKEND_UNAVAILABLE", message, None),
			ServiceError::Config { message } =>
				json_error(StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR", message, None),
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn service_errors_map_to_status_codes() {
		let invalid = ApiError::from(ServiceError::InvalidRequest { message: "bad".to_string() });
		let config = ApiError::from(ServiceError::Config { message: "dictionary".to_string() });

		assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
		assert_eq!(invalid.error_code, "INVALID_REQUEST");
		assert_eq!(config.status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(config.error_code, "CONFIGURATION_ERROR");
	}
}
