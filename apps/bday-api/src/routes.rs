use axum::{
	Json, Router,
	extract::{
		Path, Query, State,
		rejection::{JsonRejection, QueryRejection},
	},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use bday_service::{
	DeleteYearResponse, DispatchReport, GenerateReport, NotificationItem, Page, QueryRequest,
	ResendResponse, SettingsResponse, SettingsUpdate, Statistics, WindowRequest,
};

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateParams {
	/// Overrides today's local date. Useful to backfill a missed day.
	#[serde(with = "bday_service::time_serde::date::option")]
	date: Option<Date>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatisticsParams {
	year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct DeleteYearParams {
	year: i32,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/birthday/generate", post(generate))
		.route("/v1/birthday/dispatch", post(dispatch))
		.route("/v1/birthday/notifications", get(list_notifications))
		.route("/v1/birthday/notifications/{id}", get(get_notification))
		.route("/v1/birthday/notifications/{id}/resend", post(resend))
		.route("/v1/birthday/notifications/{id}/exclude", post(exclude))
		.route("/v1/birthday/notifications/{id}/reinstate", post(reinstate))
		.route("/v1/birthday/upcoming", get(upcoming))
		.route("/v1/birthday/past", get(past))
		.route("/v1/birthday/statistics", get(statistics))
		.route("/v1/birthday/settings", get(get_settings).put(put_settings))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/v1/admin/birthday/notifications", delete(delete_year))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn generate(
	State(state): State<AppState>,
	params: Result<Query<GenerateParams>, QueryRejection>,
) -> Result<Json<GenerateReport>, ApiError> {
	let Query(params) = params?;
	let report = match params.date {
		Some(date) => state.service.generate_for_date(date).await?,
		None => state.service.generate_for_today().await?,
	};

	Ok(Json(report))
}

async fn dispatch(State(state): State<AppState>) -> Result<Json<DispatchReport>, ApiError> {
	let report = state.service.dispatch_due().await?;

	Ok(Json(report))
}

async fn list_notifications(
	State(state): State<AppState>,
	params: Result<Query<QueryRequest>, QueryRejection>,
) -> Result<Json<Page<NotificationItem>>, ApiError> {
	let Query(req) = params?;
	let page = state.service.query(req).await?;

	Ok(Json(page))
}

async fn get_notification(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<NotificationItem>, ApiError> {
	let item = state.service.get(id).await?;

	Ok(Json(item))
}

async fn resend(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<ResendResponse>, ApiError> {
	let response = state.service.resend(id).await?;

	Ok(Json(response))
}

async fn exclude(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<NotificationItem>, ApiError> {
	let item = state.service.exclude(id).await?;

	Ok(Json(item))
}

async fn reinstate(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<NotificationItem>, ApiError> {
	let item = state.service.reinstate(id).await?;

	Ok(Json(item))
}

async fn upcoming(
	State(state): State<AppState>,
	params: Result<Query<WindowRequest>, QueryRejection>,
) -> Result<Json<Page<NotificationItem>>, ApiError> {
	let Query(req) = params?;
	let page = state.service.upcoming(req).await?;

	Ok(Json(page))
}

async fn past(
	State(state): State<AppState>,
	params: Result<Query<WindowRequest>, QueryRejection>,
) -> Result<Json<Page<NotificationItem>>, ApiError> {
	let Query(req) = params?;
	let page = state.service.past(req).await?;

	Ok(Json(page))
}

async fn statistics(
	State(state): State<AppState>,
	params: Result<Query<StatisticsParams>, QueryRejection>,
) -> Result<Json<Statistics>, ApiError> {
	let Query(params) = params?;
	let stats = state.service.statistics(params.year).await?;

	Ok(Json(stats))
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<SettingsResponse>, ApiError> {
	let settings = state.service.settings().await?;

	Ok(Json(settings))
}

async fn put_settings(
	State(state): State<AppState>,
	payload: Result<Json<SettingsUpdate>, JsonRejection>,
) -> Result<Json<SettingsResponse>, ApiError> {
	let Json(update) = payload?;
	let settings = state.service.update_settings(update).await?;

	Ok(Json(settings))
}

async fn delete_year(
	State(state): State<AppState>,
	params: Result<Query<DeleteYearParams>, QueryRejection>,
) -> Result<Json<DeleteYearResponse>, ApiError> {
	let Query(params) = params?;
	let response = state.service.delete_year(params.year).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
		Self { status, error_code, message: message.into() }
	}
}
impl From<bday_service::Error> for ApiError {
	fn from(err: bday_service::Error) -> Self {
		use bday_service::Error;

		match err {
			Error::InvalidRequest { message } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			Error::NotFound { message } => Self::new(StatusCode::NOT_FOUND, "not_found", message),
			Error::Conflict { message } => Self::new(StatusCode::CONFLICT, "conflict", message),
			err @ Error::InvalidTransition { .. } =>
				Self::new(StatusCode::CONFLICT, "invalid_transition", err.to_string()),
			Error::Storage { message } => {
				tracing::error!(error = %message, "Storage failure while serving request.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal error.")
			},
		}
	}
}
impl From<QueryRejection> for ApiError {
	fn from(err: QueryRejection) -> Self {
		Self::new(StatusCode::BAD_REQUEST, "invalid_request", err.body_text())
	}
}
impl From<JsonRejection> for ApiError {
	fn from(err: JsonRejection) -> Self {
		Self::new(StatusCode::BAD_REQUEST, "invalid_request", err.body_text())
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code.to_string(), message: self.message };

		(self.status, Json(body)).into_response()
	}
}
