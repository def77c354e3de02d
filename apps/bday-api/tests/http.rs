use std::sync::Arc;

use axum::{
	Router,
	body::{self, Body},
	http::{Method, Request, StatusCode},
};
use serde_json::{Value, json};
use time::{
	Date,
	macros::{date, datetime},
};
use tower::util::ServiceExt;
use uuid::Uuid;

use bday_api::{routes, state::AppState};
use bday_config::{Dispatch, Reminder};
use bday_service::{BirthdayService, BoxFuture, FixedClock, MessageSender, Stores};
use bday_storage::{memory::MemoryStore, models::Member};

const FAILING_PHONE: &str = "+62899";

struct StubSender;
impl MessageSender for StubSender {
	fn send<'a>(&'a self, phone: &'a str, _text: &'a str) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			if phone == FAILING_PHONE {
				return Err(color_eyre::eyre::eyre!("Gateway timeout."));
			}

			Ok(())
		})
	}
}

fn member(full_name: &str, phone: &str, birth_date: Date, alumni_year: &str) -> Member {
	Member {
		member_id: Uuid::new_v4(),
		full_name: full_name.to_string(),
		phone: Some(phone.to_string()),
		birth_date: Some(birth_date),
		is_active: true,
		is_excluded: false,
		alumni_year: Some(alumni_year.to_string()),
		province: Some("Jawa Barat".to_string()),
		city: Some("Bandung".to_string()),
		district: None,
		subdistrict: None,
	}
}

/// Two members due today at 2025-06-03: one deliverable, one whose sends always fail.
fn state() -> AppState {
	let store = Arc::new(MemoryStore::with_members([
		member("Ayu Lestari", "+62811", date!(1990 - 06 - 10), "2012"),
		member("Dewi Anggraini", FAILING_PHONE, date!(1993 - 06 - 10), "2015"),
	]));
	let reminder = Reminder {
		enabled: true,
		send_time: "08:00".to_string(),
		timezone: "+07:00".to_string(),
		message: "Happy birthday, {name}!".to_string(),
		days_ahead: 7,
	};
	let service = BirthdayService::new(
		reminder,
		Dispatch { concurrency: 2, claim_lease_seconds: 120 },
		Stores::shared(store),
		Arc::new(StubSender),
	)
	.with_clock(Arc::new(FixedClock::new(datetime!(2025-06-03 01:00 UTC))));

	AppState::from_service(service)
}

async fn call(
	app: &Router,
	method: Method,
	uri: &str,
	body: Option<Value>,
) -> (StatusCode, Value) {
	let mut builder = Request::builder().method(method).uri(uri);
	let body = match body {
		Some(body) => {
			builder = builder.header("content-type", "application/json");

			Body::from(body.to_string())
		},
		None => Body::empty(),
	};
	let response = app
		.clone()
		.oneshot(builder.body(body).expect("Failed to build request."))
		.await
		.expect("Failed to call route.");
	let status = response.status();
	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("Failed to read body.");
	let json = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).expect("Response was not JSON.")
	};

	(status, json)
}

#[tokio::test]
async fn health_is_ok() {
	let app = routes::router(state());
	let (status, _) = call(&app, Method::GET, "/health", None).await;

	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn generate_dispatch_and_filter_failed_records() {
	let app = routes::router(state());
	let (status, report) = call(&app, Method::POST, "/v1/birthday/generate", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(report["created"], 2);

	let (status, report) = call(&app, Method::POST, "/v1/birthday/dispatch", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(report["today"], "2025-06-03");
	assert_eq!(report["sent"], 1);
	assert_eq!(report["failed"], 1);

	let (status, page) = call(
		&app,
		Method::GET,
		"/v1/birthday/notifications?status=FAILED&alumni_year=2015&page=0&size=10",
		None,
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(page["total"], 1);
	assert_eq!(page["items"][0]["full_name"], "Dewi Anggraini");
	assert_eq!(page["items"][0]["status"], "FAILED");
	assert_eq!(page["items"][0]["error_message"], "Gateway timeout.");
	assert_eq!(page["items"][0]["days_until_birthday"], 7);
}

#[tokio::test]
async fn resend_and_operator_actions_follow_the_state_machine() {
	let app = routes::router(state());

	call(&app, Method::POST, "/v1/birthday/generate", None).await;

	let (_, page) =
		call(&app, Method::GET, "/v1/birthday/notifications?name=ayu", None).await;
	let id = page["items"][0]["notification_id"].as_str().expect("Expected an id.").to_string();
	let (status, body) =
		call(&app, Method::POST, &format!("/v1/birthday/notifications/{id}/resend"), None).await;

	assert_eq!(status, StatusCode::CONFLICT);
	assert_eq!(body["error_code"], "invalid_transition");

	let (status, item) =
		call(&app, Method::POST, &format!("/v1/birthday/notifications/{id}/exclude"), None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(item["status"], "EXCLUDED");
	assert_eq!(item["is_excluded"], true);

	let (_, report) = call(&app, Method::POST, "/v1/birthday/dispatch", None).await;

	assert_eq!(report["sent"], 0);

	let (status, item) =
		call(&app, Method::POST, &format!("/v1/birthday/notifications/{id}/reinstate"), None)
			.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(item["status"], "PENDING");

	call(&app, Method::POST, "/v1/birthday/dispatch", None).await;

	let (status, response) =
		call(&app, Method::POST, &format!("/v1/birthday/notifications/{id}/resend"), None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(response["delivered"], true);
	assert_eq!(response["notification"]["status"], "RESENT");
}

#[tokio::test]
async fn errors_use_json_bodies() {
	let app = routes::router(state());
	let (status, body) = call(
		&app,
		Method::GET,
		&format!("/v1/birthday/notifications/{}", Uuid::new_v4()),
		None,
	)
	.await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["error_code"], "not_found");

	let (status, body) =
		call(&app, Method::GET, "/v1/birthday/notifications?size=500", None).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_request");

	let (status, body) =
		call(&app, Method::GET, "/v1/birthday/notifications?status=LOST", None).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_request");
}

#[tokio::test]
async fn upcoming_window_and_statistics() {
	let app = routes::router(state());

	call(&app, Method::POST, "/v1/birthday/generate", None).await;

	let (status, page) = call(&app, Method::GET, "/v1/birthday/upcoming?days=7", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(page["total"], 2);

	let (_, page) = call(&app, Method::GET, "/v1/birthday/upcoming?days=6", None).await;

	assert_eq!(page["total"], 0);

	let (status, stats) =
		call(&app, Method::GET, "/v1/birthday/statistics?year=2025", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(stats["total"], 2);
	assert_eq!(stats["pending"], 2);
}

#[tokio::test]
async fn settings_round_trip_and_validation() {
	let app = routes::router(state());
	let (status, settings) = call(&app, Method::GET, "/v1/birthday/settings", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(settings["timezone"], "+07:00");
	assert_eq!(settings["updated_at"], Value::Null);

	let update = json!({
		"enabled": false,
		"send_time": "09:30",
		"timezone": "+08:00",
		"message": "Selamat ulang tahun, {name}!",
		"days_ahead": 3,
	});
	let (status, settings) =
		call(&app, Method::PUT, "/v1/birthday/settings", Some(update)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(settings["send_time"], "09:30");
	assert_eq!(settings["days_ahead"], 3);
	assert!(settings["updated_at"].is_string());

	let invalid = json!({
		"enabled": true,
		"send_time": "09:30",
		"timezone": "Asia/Jakarta",
		"message": "Hi",
		"days_ahead": 3,
	});
	let (status, body) =
		call(&app, Method::PUT, "/v1/birthday/settings", Some(invalid)).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_request");

	let (_, report) = call(&app, Method::POST, "/v1/birthday/dispatch", None).await;

	assert_eq!(report["disabled"], true);
}

#[tokio::test]
async fn admin_router_deletes_a_year() {
	let state = state();
	let app = routes::router(state.clone());
	let admin = routes::admin_router(state);

	call(&app, Method::POST, "/v1/birthday/generate", None).await;

	let (status, body) =
		call(&admin, Method::DELETE, "/v1/admin/birthday/notifications?year=2025", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["deleted"], 2);

	let (status, _) =
		call(&app, Method::DELETE, "/v1/admin/birthday/notifications?year=2025", None).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
}
