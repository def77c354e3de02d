use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};
use uuid::Uuid;

use bday_domain::{NotificationStatus, StatusEvent, transition};
use bday_storage::models::{NotificationRecord, Settings, StatusUpdate};

use crate::{BirthdayService, Error, NotificationItem, Result};

const MAX_DELIVERY_ERROR_CHARS: usize = 1_024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReport {
	pub disabled: bool,
	#[serde(with = "crate::time_serde::date")]
	pub today: Date,
	pub candidates: usize,
	pub sent: usize,
	pub failed: usize,
	pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResendResponse {
	pub delivered: bool,
	pub error: Option<String>,
	pub notification: NotificationItem,
}

/// Which edges an attempt takes on success and on failure.
#[derive(Clone, Copy)]
struct AttemptEvents {
	success: StatusEvent,
	failure: StatusEvent,
}

const SCHEDULED: AttemptEvents =
	AttemptEvents { success: StatusEvent::Delivered, failure: StatusEvent::DeliveryFailed };
const MANUAL: AttemptEvents =
	AttemptEvents { success: StatusEvent::Resent, failure: StatusEvent::ResendFailed };

enum Attempt {
	Delivered,
	Failed(String),
	/// The claim or the final compare-and-set went to someone else.
	Lost,
}

impl BirthdayService {
	pub async fn dispatch_due(&self) -> Result<DispatchReport> {
		self.dispatch_due_at(self.clock.now()).await
	}

	pub async fn dispatch_due_at(&self, now: OffsetDateTime) -> Result<DispatchReport> {
		let settings = self.current_settings().await?;
		let today = settings.local_date(now);
		let mut report = DispatchReport {
			disabled: !settings.enabled,
			today,
			candidates: 0,
			sent: 0,
			failed: 0,
			skipped: 0,
		};

		if !settings.enabled {
			tracing::info!(%today, "Birthday reminders are disabled. Skipping dispatch.");

			return Ok(report);
		}

		let candidates = self.stores.notifications.list_due(today, now).await?;

		report.candidates = candidates.len();

		let settings = &settings;
		let outcomes = stream::iter(candidates)
			.map(|record| async move {
				let record_id = record.notification_id;

				(record_id, self.attempt(&record, settings, now, SCHEDULED).await)
			})
			.buffer_unordered(self.dispatch.concurrency.max(1))
			.collect::<Vec<_>>()
			.await;

		for (record_id, outcome) in outcomes {
			match outcome {
				Ok(Attempt::Delivered) => report.sent += 1,
				Ok(Attempt::Failed(_)) => report.failed += 1,
				Ok(Attempt::Lost) => report.skipped += 1,
				Err(err) => {
					tracing::error!(%record_id, error = %err, "Failed to dispatch birthday notification.");

					report.skipped += 1;
				},
			}
		}

		tracing::info!(
			%today,
			candidates = report.candidates,
			sent = report.sent,
			failed = report.failed,
			skipped = report.skipped,
			"Birthday dispatch pass finished."
		);

		Ok(report)
	}

	/// Manual resend of a delivered or failed notification. Works while reminders are disabled.
	pub async fn resend(&self, notification_id: Uuid) -> Result<ResendResponse> {
		let record = self.require_record(notification_id).await?;

		transition(record.status, MANUAL.success)?;

		let settings = self.current_settings().await?;
		let now = self.clock.now();
		let (delivered, error) = match self.attempt(&record, &settings, now, MANUAL).await? {
			Attempt::Delivered => (true, None),
			Attempt::Failed(error) => (false, Some(error)),
			Attempt::Lost =>
				return Err(Error::Conflict {
					message: format!("Notification {notification_id} is being delivered already."),
				}),
		};
		let notification = self.get(notification_id).await?;

		Ok(ResendResponse { delivered, error, notification })
	}

	async fn attempt(
		&self,
		record: &NotificationRecord,
		settings: &Settings,
		now: OffsetDateTime,
		events: AttemptEvents,
	) -> Result<Attempt> {
		let expected = record.status;
		let on_success = transition(expected, events.success)?;
		let on_failure = transition(expected, events.failure)?;
		let lease_until = now + Duration::seconds(self.dispatch.claim_lease_seconds);
		let notifications = &self.stores.notifications;

		if !notifications.claim(record.notification_id, expected, now, lease_until).await? {
			tracing::debug!(record_id = %record.notification_id, "Notification claimed elsewhere.");

			return Ok(Attempt::Lost);
		}

		let member = self.stores.members.find_member(record.member_id).await?;
		let (text, delivery) = match member.as_ref() {
			None => (record.message.clone(), Err("Member no longer exists.".to_string())),
			Some(member) => {
				let text = resolve_message(record, settings, &member.full_name);
				let delivery = match member.reachable_phone() {
					None => Err("Member has no phone number.".to_string()),
					Some(phone) => self
						.sender
						.send(phone, &text)
						.await
						.map_err(|err| sanitize_delivery_error(&format!("{err:#}"))),
				};

				(Some(text), delivery)
			},
		};
		let attempted = member.as_ref().and_then(|member| member.reachable_phone()).is_some();
		let update = StatusUpdate {
			status: if delivery.is_ok() { on_success } else { on_failure },
			is_excluded: false,
			message: text,
			sent_at: delivery.is_ok().then_some(now),
			error_message: delivery.as_ref().err().cloned(),
			count_attempt: attempted,
			updated_at: now,
			unclaimed_at: None,
		};
		let Some(updated) =
			notifications.apply_update(record.notification_id, expected, &update).await?
		else {
			tracing::warn!(
				record_id = %record.notification_id,
				expected = %expected,
				"Notification changed during delivery. Outcome was not recorded."
			);

			return Ok(Attempt::Lost);
		};

		match delivery {
			Ok(()) => {
				tracing::info!(
					record_id = %updated.notification_id,
					member_id = %updated.member_id,
					year = updated.year,
					status = %updated.status,
					"Birthday notification delivered."
				);

				Ok(Attempt::Delivered)
			},
			Err(error) => {
				tracing::warn!(
					record_id = %updated.notification_id,
					member_id = %updated.member_id,
					year = updated.year,
					error = %error,
					"Birthday notification delivery failed."
				);

				Ok(Attempt::Failed(error))
			},
		}
	}

	pub(crate) async fn require_record(&self, notification_id: Uuid) -> Result<NotificationRecord> {
		self.stores.notifications.get(notification_id).await?.ok_or_else(|| Error::NotFound {
			message: format!("Notification {notification_id} does not exist."),
		})
	}
}

/// The stored text wins so a resend repeats what was sent before.
fn resolve_message(record: &NotificationRecord, settings: &Settings, full_name: &str) -> String {
	match record.message.as_deref() {
		Some(message) if !message.trim().is_empty() => message.to_string(),
		_ => settings.message.replace("{name}", full_name.trim()),
	}
}

fn sanitize_delivery_error(text: &str) -> String {
	let mut parts = Vec::new();
	let mut redact_next = false;

	for raw in text.split_whitespace() {
		let mut word = raw.to_string();

		if redact_next {
			word = "[REDACTED]".to_string();
			redact_next = false;
		}
		if raw.eq_ignore_ascii_case("bearer") {
			redact_next = true;
		}

		let lowered = raw.to_ascii_lowercase();

		for key in ["api_key", "apikey", "password", "secret", "token"] {
			if lowered.contains(key) && (lowered.contains('=') || lowered.contains(':')) {
				let sep = if raw.contains('=') { '=' } else { ':' };
				let prefix = raw.split(sep).next().unwrap_or(raw);

				word = format!("{prefix}{sep}[REDACTED]");

				break;
			}
		}

		parts.push(word);
	}

	let mut out = parts.join(" ");

	if out.chars().count() > MAX_DELIVERY_ERROR_CHARS {
		out = out.chars().take(MAX_DELIVERY_ERROR_CHARS).collect();
		out.push_str("...");
	}
	if out.is_empty() {
		out = "Delivery failed.".to_string();
	}

	out
}

#[cfg(test)]
mod tests {
	use time::{
		UtcOffset,
		macros::{date, datetime, time},
	};

	use super::*;

	fn record(message: Option<&str>) -> NotificationRecord {
		NotificationRecord {
			notification_id: Uuid::new_v4(),
			member_id: Uuid::new_v4(),
			birthday_date: date!(2025 - 06 - 10),
			notification_date: date!(2025 - 06 - 03),
			year: 2025,
			status: NotificationStatus::Failed,
			message: message.map(str::to_string),
			sent_at: None,
			error_message: None,
			is_excluded: false,
			attempts: 1,
			claimed_until: None,
			created_at: datetime!(2025-05-01 00:00 UTC),
			updated_at: datetime!(2025-05-01 00:00 UTC),
		}
	}

	fn settings() -> Settings {
		Settings {
			enabled: true,
			send_time: time!(08:00),
			timezone: UtcOffset::UTC,
			message: "Happy birthday, {name}!".to_string(),
			days_ahead: 7,
			updated_at: None,
		}
	}

	#[test]
	fn template_fills_name_when_no_message_is_stored() {
		assert_eq!(resolve_message(&record(None), &settings(), " Ayu "), "Happy birthday, Ayu!");
		assert_eq!(resolve_message(&record(Some("Selamat!")), &settings(), "Ayu"), "Selamat!");
	}

	#[test]
	fn delivery_errors_hide_credentials() {
		let sanitized =
			sanitize_delivery_error("401 for Authorization: Bearer abc123 with api_key=xyz");

		assert!(!sanitized.contains("abc123"));
		assert!(!sanitized.contains("xyz"));
		assert!(sanitized.contains("api_key=[REDACTED]"));
	}

	#[test]
	fn delivery_errors_are_truncated() {
		let sanitized = sanitize_delivery_error(&"x".repeat(MAX_DELIVERY_ERROR_CHARS + 10));

		assert_eq!(sanitized.chars().count(), MAX_DELIVERY_ERROR_CHARS + 3);
	}
}
