mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Dispatch, Postgres, Reminder, SenderConfig, Service, Storage, Worker};

use std::{fs, path::Path};

use time::{Time, UtcOffset, format_description::BorrowedFormatItem, macros::format_description};

pub const MAX_DAYS_AHEAD: u32 = 366;

const SEND_TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]");
const OFFSET_FORMAT: &[BorrowedFormatItem<'static>] =
	format_description!("[offset_hour sign:mandatory]:[offset_minute]");

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in [
		("service.http_bind", &cfg.service.http_bind),
		("service.admin_bind", &cfg.service.admin_bind),
		("storage.postgres.dsn", &cfg.storage.postgres.dsn),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	validate_reminder(&cfg.reminder)?;

	if cfg.sender.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "sender.api_base must be non-empty.".to_string(),
		});
	}
	if cfg.sender.api_key.trim().is_empty() {
		return Err(Error::Validation { message: "sender.api_key must be non-empty.".to_string() });
	}
	if cfg.sender.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "sender.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.sender.default_headers.values().any(|value| !value.is_string()) {
		return Err(Error::Validation {
			message: "sender.default_headers values must be strings.".to_string(),
		});
	}
	if cfg.dispatch.concurrency == 0 {
		return Err(Error::Validation {
			message: "dispatch.concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.dispatch.claim_lease_seconds <= 0 {
		return Err(Error::Validation {
			message: "dispatch.claim_lease_seconds must be greater than zero.".to_string(),
		});
	}
	// A lease that can expire mid-request lets a second dispatcher send the same record.
	if (cfg.dispatch.claim_lease_seconds as u64).saturating_mul(1_000) <= cfg.sender.timeout_ms {
		return Err(Error::Validation {
			message: "dispatch.claim_lease_seconds must exceed sender.timeout_ms.".to_string(),
		});
	}

	Ok(())
}

pub fn validate_reminder(reminder: &Reminder) -> Result<()> {
	if parse_send_time(&reminder.send_time).is_none() {
		return Err(Error::Validation {
			message: "reminder.send_time must use the HH:MM format.".to_string(),
		});
	}
	if parse_utc_offset(&reminder.timezone).is_none() {
		return Err(Error::Validation {
			message: "reminder.timezone must be a UTC offset such as +07:00.".to_string(),
		});
	}
	if reminder.message.trim().is_empty() {
		return Err(Error::Validation {
			message: "reminder.message must be non-empty.".to_string(),
		});
	}
	if reminder.days_ahead > MAX_DAYS_AHEAD {
		return Err(Error::Validation {
			message: format!("reminder.days_ahead must be {MAX_DAYS_AHEAD} or less."),
		});
	}

	Ok(())
}

pub fn parse_send_time(raw: &str) -> Option<Time> {
	Time::parse(raw.trim(), SEND_TIME_FORMAT).ok()
}

pub fn format_send_time(value: Time) -> String {
	format!("{:02}:{:02}", value.hour(), value.minute())
}

pub fn parse_utc_offset(raw: &str) -> Option<UtcOffset> {
	let trimmed = raw.trim();

	if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
		return Some(UtcOffset::UTC);
	}

	UtcOffset::parse(trimmed, OFFSET_FORMAT).ok()
}

pub fn format_utc_offset(value: UtcOffset) -> String {
	let (hours, minutes, _) = value.as_hms();
	let sign = if value.is_negative() { '-' } else { '+' };

	format!("{sign}{:02}:{:02}", hours.unsigned_abs(), minutes.unsigned_abs())
}

fn normalize(cfg: &mut Config) {
	cfg.reminder.send_time = cfg.reminder.send_time.trim().to_string();
	cfg.reminder.timezone = cfg.reminder.timezone.trim().to_string();

	if cfg.sender.path.trim().is_empty() {
		cfg.sender.path = "/".to_string();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_offsets_and_utc_aliases() {
		assert_eq!(parse_utc_offset("UTC"), Some(UtcOffset::UTC));
		assert_eq!(parse_utc_offset(" +07:00 ").map(|offset| offset.whole_hours()), Some(7));
		assert_eq!(parse_utc_offset("-03:30").map(|offset| offset.whole_minutes()), Some(-210));
		assert_eq!(parse_utc_offset("Asia/Jakarta"), None);
	}

	#[test]
	fn offsets_round_trip_through_text() {
		let offset = parse_utc_offset("-03:30").expect("Expected offset.");

		assert_eq!(format_utc_offset(offset), "-03:30");
		assert_eq!(format_utc_offset(UtcOffset::UTC), "+00:00");
	}

	#[test]
	fn parses_send_time() {
		let time = parse_send_time("08:05").expect("Expected send time.");

		assert_eq!((time.hour(), time.minute()), (8, 5));
		assert_eq!(format_send_time(time), "08:05");
		assert!(parse_send_time("8am").is_none());
	}
}
