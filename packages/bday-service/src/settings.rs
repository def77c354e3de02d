use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use bday_config::Reminder;
use bday_storage::models::Settings;

use crate::{BirthdayService, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsResponse {
	pub enabled: bool,
	/// `HH:MM` in `timezone`.
	pub send_time: String,
	pub timezone: String,
	pub message: String,
	pub days_ahead: u32,
	/// `None` while the configured defaults are in effect.
	#[serde(with = "crate::time_serde::option")]
	pub updated_at: Option<OffsetDateTime>,
}
impl SettingsResponse {
	fn from_settings(settings: &Settings) -> Self {
		Self {
			enabled: settings.enabled,
			send_time: bday_config::format_send_time(settings.send_time),
			timezone: bday_config::format_utc_offset(settings.timezone),
			message: settings.message.clone(),
			days_ahead: settings.days_ahead,
			updated_at: settings.updated_at,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsUpdate {
	pub enabled: bool,
	pub send_time: String,
	pub timezone: String,
	pub message: String,
	pub days_ahead: u32,
}

impl BirthdayService {
	pub async fn settings(&self) -> Result<SettingsResponse> {
		Ok(SettingsResponse::from_settings(&self.current_settings().await?))
	}

	/// Validated with the same rules as the `[reminder]` config section.
	pub async fn update_settings(&self, update: SettingsUpdate) -> Result<SettingsResponse> {
		let reminder = Reminder {
			enabled: update.enabled,
			send_time: update.send_time.trim().to_string(),
			timezone: update.timezone.trim().to_string(),
			message: update.message,
			days_ahead: update.days_ahead,
		};
		let settings = Settings::from_reminder(&reminder)?;
		let stored = self.stores.settings.put_settings(&settings, self.clock.now()).await?;

		tracing::info!(
			enabled = stored.enabled,
			days_ahead = stored.days_ahead,
			"Birthday reminder settings updated."
		);

		Ok(SettingsResponse::from_settings(&stored))
	}
}
