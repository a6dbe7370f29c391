use std::collections::BTreeMap;

use axum::{
	Json, Router,
	extract::{Path, State, rejection::JsonRejection},
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;

use datahub_search::{BasicSearchResponse, Error, Principal, SearchResults};

use crate::state::AppState;

pub const HEADER_PERMISSIONS: &str = "X-DataHub-Permissions";
pub const HEADER_TEAM: &str = "X-DataHub-Team";

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v3/search", post(basic_search))
		.route("/v3/search/{entity}", post(entity_search))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn basic_search(
	State(state): State<AppState>,
	headers: HeaderMap,
	payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BasicSearchResponse>, ApiError> {
	let principal = principal(&headers)?;
	let Json(body) = payload?;
	let response = state.service.basic_search(&principal, &body).await?;

	Ok(Json(response))
}

async fn entity_search(
	State(state): State<AppState>,
	Path(entity): Path<String>,
	headers: HeaderMap,
	payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SearchResults>, ApiError> {
	let principal = principal(&headers)?;
	let Json(body) = payload?;
	let response = state.service.entity_search(&principal, &entity, &body).await?;

	Ok(Json(response))
}

/// The caller as described by its headers. Permissions are comma separated.
fn principal(headers: &HeaderMap) -> Result<Principal, ApiError> {
	let permissions = read_header(headers, HEADER_PERMISSIONS)?.unwrap_or_default();
	let principal = Principal::new(
		permissions.split(',').map(str::trim).filter(|permission| !permission.is_empty()),
	);

	match read_header(headers, HEADER_TEAM)?.filter(|team| !team.is_empty()) {
		Some(team) => Ok(principal.with_team(team)),
		None => Ok(principal),
	}
}

fn read_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
	let Some(raw) = headers.get(name) else {
		return Ok(None);
	};
	let value = raw.to_str().map_err(|_| {
		ApiError::new(
			StatusCode::BAD_REQUEST,
			"INVALID_REQUEST",
			format!("{name} must be valid ASCII."),
			None,
		)
	})?;

	Ok(Some(value.trim()))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<BTreeMap<String, Vec<String>>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<BTreeMap<String, Vec<String>>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message } => {
				ApiError::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message, None)
			},
			Error::Validation(errors) => ApiError::new(
				StatusCode::BAD_REQUEST,
				"VALIDATION_ERROR",
				"Request validation failed.",
				Some(errors.fields().clone()),
			),
			err @ Error::UnknownEntity { .. } => {
				ApiError::new(StatusCode::NOT_FOUND, "UNKNOWN_ENTITY", err.to_string(), None)
			},
			Error::PermissionDenied { message } => {
				ApiError::new(StatusCode::FORBIDDEN, "PERMISSION_DENIED", message, None)
			},
			err @ (Error::Backend { .. } | Error::MalformedResponse { .. }) => {
				tracing::error!(error = %err, "Search backend failed.");

				ApiError::new(
					StatusCode::BAD_GATEWAY,
					"BACKEND_ERROR",
					"Search backend request failed.",
					None,
				)
			},
		}
	}
}
impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		ApiError::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", rejection.body_text(), None)
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}
