use axum::{
	Json, Router,
	extract::{Path, State},
	http::{HeaderMap, Method, StatusCode, header::AUTHORIZATION},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};

use crate::state::AppState;
use dun_domain::EngineKind;
use dun_service::EngineError;

pub fn router(state: AppState) -> Router {
	let cors = CorsLayer::new()
		.allow_origin(Any)
		.allow_methods([Method::POST, Method::OPTIONS])
		.allow_headers(Any);

	Router::new()
		.route("/health", get(health))
		.route("/v1/reminders/{engine}/run", post(run_engine))
		.layer(cors)
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn run_engine(
	State(state): State<AppState>,
	Path(engine): Path<String>,
	headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
	authorize(&state, &headers)?;

	let kind: EngineKind = engine
		.parse()
		.map_err(|message: String| json_error(StatusCode::NOT_FOUND, "unknown_engine", message))?;
	let Some(engine) = state.service.engine(kind) else {
		return Err(json_error(
			StatusCode::NOT_FOUND,
			"engine_disabled",
			format!("The {kind} engine is disabled."),
		));
	};
	let outcome = engine.run().await?;
	let body = outcome.report().map_err(|err| {
		json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", err.to_string())
	})?;

	Ok(Json(body))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
	let Some(expected) = state.invoke_token.as_deref() else {
		return Ok(());
	};
	let provided = headers
		.get(AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
		.map(str::trim);

	if provided == Some(expected) {
		return Ok(());
	}

	Err(json_error(StatusCode::UNAUTHORIZED, "unauthorized", "A valid bearer token is required."))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	success: bool,
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<EngineError> for ApiError {
	fn from(err: EngineError) -> Self {
		match err {
			EngineError::Selector { .. } => json_error(
				StatusCode::INTERNAL_SERVER_ERROR,
				"selector_failed",
				err.to_string(),
			),
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { success: false, error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}
