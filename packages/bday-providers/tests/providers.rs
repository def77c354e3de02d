use std::sync::{Arc, Mutex};

use axum::{
	Json, Router,
	extract::State,
	http::{HeaderMap, StatusCode},
	routing::post,
};
use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};
use tokio::net::TcpListener;

use bday_config::SenderConfig;
use bday_providers::{Error, webhook::WebhookSender};

#[derive(Clone, Default)]
struct Captured {
	requests: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

async fn accept(
	State(captured): State<Captured>,
	headers: HeaderMap,
	Json(body): Json<Value>,
) -> Json<Value> {
	captured.requests.lock().unwrap_or_else(|err| err.into_inner()).push((headers, body));

	Json(serde_json::json!({ "id": "msg-1" }))
}

async fn refuse() -> (StatusCode, &'static str) {
	(StatusCode::BAD_GATEWAY, "upstream down")
}

async fn spawn(router: Router) -> String {
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind listener.");
	let addr = listener.local_addr().expect("Failed to read local address.");

	tokio::spawn(async move {
		let _ = axum::serve(listener, router).await;
	});

	format!("http://{addr}")
}

fn sender_config(api_base: String) -> SenderConfig {
	let mut default_headers = Map::new();

	default_headers.insert("X-Channel".to_string(), Value::String("whatsapp".to_string()));

	SenderConfig {
		provider_id: "webhook".to_string(),
		api_base,
		api_key: "secret".to_string(),
		path: "/send".to_string(),
		timeout_ms: 2_000,
		default_headers,
	}
}

#[test]
fn builds_bearer_auth_header() {
	let headers =
		bday_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn rejects_non_string_default_header() {
	let mut extra = Map::new();

	extra.insert("X-Retries".to_string(), Value::from(3));

	let err = bday_providers::auth_headers("secret", &extra).expect_err("Expected a config error.");

	assert!(matches!(err, Error::InvalidConfig { .. }));
}

#[tokio::test]
async fn posts_phone_and_text_with_headers() {
	let captured = Captured::default();
	let base = spawn(Router::new().route("/send", post(accept)).with_state(captured.clone())).await;
	let sender = WebhookSender::new(sender_config(base)).expect("Failed to build sender.");
	let receipt =
		sender.send_text("+628111", "Happy birthday, Ayu!").await.expect("Send should succeed.");

	assert_eq!(receipt.message_id.as_deref(), Some("msg-1"));

	let requests = captured.requests.lock().unwrap_or_else(|err| err.into_inner());
	let (headers, body) = requests.first().expect("Expected one request.");

	assert_eq!(requests.len(), 1);
	assert_eq!(headers.get("authorization").and_then(|v| v.to_str().ok()), Some("Bearer secret"));
	assert_eq!(headers.get("x-channel").and_then(|v| v.to_str().ok()), Some("whatsapp"));
	assert_eq!(body["to"], "+628111");
	assert_eq!(body["text"], "Happy birthday, Ayu!");
	assert_eq!(body["provider"], "webhook");
}

#[tokio::test]
async fn error_status_is_a_failure() {
	let base = spawn(Router::new().route("/send", post(refuse))).await;
	let sender = WebhookSender::new(sender_config(base)).expect("Failed to build sender.");
	let err = sender.send_text("+628111", "hi").await.expect_err("Expected a failure.");

	assert!(matches!(err, Error::Reqwest(_)), "Unexpected error: {err:?}");
}
