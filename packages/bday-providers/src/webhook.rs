//! Generic JSON webhook delivery.
//!
//! The request body is `{"provider": ..., "to": ..., "text": ...}`. Any 2xx answer counts as
//! delivered unless the body carries an explicit `"success": false` or `"ok": false`.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Serialize)]
struct SendBody<'a> {
	provider: &'a str,
	to: &'a str,
	text: &'a str,
}

/// Provider acknowledgement, when the provider returns one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
	pub message_id: Option<String>,
}

pub struct WebhookSender {
	cfg: bday_config::SenderConfig,
	client: Client,
}
impl WebhookSender {
	pub fn new(cfg: bday_config::SenderConfig) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self { cfg, client })
	}

	pub fn provider_id(&self) -> &str {
		&self.cfg.provider_id
	}

	pub async fn send_text(&self, phone: &str, text: &str) -> Result<Receipt> {
		let url = format!("{}{}", self.cfg.api_base.trim_end_matches('/'), self.cfg.path);
		let body = SendBody { provider: &self.cfg.provider_id, to: phone, text };
		let res = self
			.client
			.post(url)
			.headers(crate::auth_headers(&self.cfg.api_key, &self.cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let bytes = res.error_for_status()?.bytes().await?;

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(Receipt::default());
		}

		parse_receipt(serde_json::from_slice(&bytes)?)
	}
}

fn parse_receipt(json: Value) -> Result<Receipt> {
	let accepted = json.get("success").or_else(|| json.get("ok")).and_then(Value::as_bool);

	if accepted == Some(false) {
		let message = json
			.get("error")
			.or_else(|| json.get("message"))
			.and_then(Value::as_str)
			.unwrap_or("Provider rejected the message.");

		return Err(Error::Rejected { message: message.to_string() });
	}

	let message_id = json
		.get("message_id")
		.or_else(|| json.get("id"))
		.and_then(|v| match v {
			Value::String(id) => Some(id.clone()),
			Value::Number(id) => Some(id.to_string()),
			_ => None,
		});

	Ok(Receipt { message_id })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reads_message_id_from_either_key() {
		let receipt = parse_receipt(serde_json::json!({ "id": 42 })).expect("parse failed");

		assert_eq!(receipt.message_id.as_deref(), Some("42"));

		let receipt =
			parse_receipt(serde_json::json!({ "message_id": "wamid.1" })).expect("parse failed");

		assert_eq!(receipt.message_id.as_deref(), Some("wamid.1"));
	}

	#[test]
	fn explicit_rejection_is_an_error() {
		let err = parse_receipt(serde_json::json!({ "success": false, "error": "number blocked" }))
			.expect_err("Expected a rejection.");

		assert_eq!(err.to_string(), "number blocked");
	}
}
