use time::{Date, OffsetDateTime, Time, UtcOffset};
use uuid::Uuid;

use bday_domain::NotificationStatus;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Member {
	pub member_id: Uuid,
	pub full_name: String,
	pub phone: Option<String>,
	pub birth_date: Option<Date>,
	pub is_active: bool,
	pub is_excluded: bool,
	pub alumni_year: Option<String>,
	pub province: Option<String>,
	pub city: Option<String>,
	pub district: Option<String>,
	pub subdistrict: Option<String>,
}
impl Member {
	/// Phone number with surrounding whitespace removed, if any is left.
	pub fn reachable_phone(&self) -> Option<&str> {
		self.phone.as_deref().map(str::trim).filter(|phone| !phone.is_empty())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
	pub notification_id: Uuid,
	pub member_id: Uuid,
	pub birthday_date: Date,
	pub notification_date: Date,
	pub year: i32,
	pub status: NotificationStatus,
	pub message: Option<String>,
	pub sent_at: Option<OffsetDateTime>,
	pub error_message: Option<String>,
	pub is_excluded: bool,
	pub attempts: i32,
	pub claimed_until: Option<OffsetDateTime>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
	pub notification_id: Uuid,
	pub member_id: Uuid,
	pub birthday_date: Date,
	pub notification_date: Date,
	pub year: i32,
	pub status: NotificationStatus,
	pub created_at: OffsetDateTime,
}
impl NewNotification {
	pub fn into_record(self) -> NotificationRecord {
		NotificationRecord {
			notification_id: self.notification_id,
			member_id: self.member_id,
			birthday_date: self.birthday_date,
			notification_date: self.notification_date,
			year: self.year,
			status: self.status,
			message: None,
			sent_at: None,
			error_message: None,
			is_excluded: self.status == NotificationStatus::Excluded,
			attempts: 0,
			claimed_until: None,
			created_at: self.created_at,
			updated_at: self.created_at,
		}
	}
}

/// Status write applied with a compare-and-set on the expected status. Always releases the
/// delivery claim.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
	pub status: NotificationStatus,
	pub is_excluded: bool,
	/// `None` keeps the stored message.
	pub message: Option<String>,
	/// `None` keeps the stored timestamp.
	pub sent_at: Option<OffsetDateTime>,
	/// Replaces the stored error, so `None` clears it.
	pub error_message: Option<String>,
	pub count_attempt: bool,
	pub updated_at: OffsetDateTime,
	/// When set, the update applies only if no delivery claim is live at this instant.
	pub unclaimed_at: Option<OffsetDateTime>,
}
impl StatusUpdate {
	pub fn lease_allows(&self, record: &NotificationRecord) -> bool {
		self.unclaimed_at.is_none_or(|at| record.claimed_until.is_none_or(|until| until <= at))
	}

	pub fn apply_to(&self, record: &mut NotificationRecord) {
		record.status = self.status;
		record.is_excluded = self.is_excluded;

		if let Some(message) = self.message.as_ref() {
			record.message = Some(message.clone());
		}
		if let Some(sent_at) = self.sent_at {
			record.sent_at = Some(sent_at);
		}

		record.error_message = self.error_message.clone();

		if self.count_attempt {
			record.attempts = record.attempts.saturating_add(1);
		}

		record.claimed_until = None;
		record.updated_at = self.updated_at;
	}
}

/// Read model: a record with its member's fields flattened in by a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationView {
	pub record: NotificationRecord,
	pub full_name: String,
	pub phone: Option<String>,
	pub birth_date: Option<Date>,
	pub alumni_year: Option<String>,
	pub province: Option<String>,
	pub city: Option<String>,
	pub district: Option<String>,
	pub subdistrict: Option<String>,
}
impl NotificationView {
	pub fn join(record: NotificationRecord, member: Option<&Member>) -> Self {
		match member {
			Some(member) => Self {
				record,
				full_name: member.full_name.clone(),
				phone: member.phone.clone(),
				birth_date: member.birth_date,
				alumni_year: member.alumni_year.clone(),
				province: member.province.clone(),
				city: member.city.clone(),
				district: member.district.clone(),
				subdistrict: member.subdistrict.clone(),
			},
			None => Self {
				record,
				full_name: String::new(),
				phone: None,
				birth_date: None,
				alumni_year: None,
				province: None,
				city: None,
				district: None,
				subdistrict: None,
			},
		}
	}
}

/// Cheap predicates pushed down to storage before the full filter runs.
#[derive(Debug, Clone, Default)]
pub struct ViewPrefilter {
	pub year: Option<i32>,
	pub status: Option<NotificationStatus>,
}
impl ViewPrefilter {
	pub fn matches(&self, record: &NotificationRecord) -> bool {
		self.year.is_none_or(|year| record.year == year)
			&& self.status.is_none_or(|status| record.status == status)
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
	pub pending: u64,
	pub sent: u64,
	pub failed: u64,
	pub excluded: u64,
	pub resent: u64,
}
impl StatusCounts {
	pub fn add(&mut self, status: NotificationStatus, count: u64) {
		let slot = match status {
			NotificationStatus::Pending => &mut self.pending,
			NotificationStatus::Sent => &mut self.sent,
			NotificationStatus::Failed => &mut self.failed,
			NotificationStatus::Excluded => &mut self.excluded,
			NotificationStatus::Resent => &mut self.resent,
		};

		*slot = slot.saturating_add(count);
	}

	pub fn total(&self) -> u64 {
		self.pending + self.sent + self.failed + self.excluded + self.resent
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	pub enabled: bool,
	pub send_time: Time,
	pub timezone: UtcOffset,
	pub message: String,
	pub days_ahead: u32,
	pub updated_at: Option<OffsetDateTime>,
}
impl Settings {
	pub fn from_reminder(reminder: &bday_config::Reminder) -> Result<Self> {
		bday_config::validate_reminder(reminder)
			.map_err(|err| Error::InvalidArgument(err.to_string()))?;

		let send_time = bday_config::parse_send_time(&reminder.send_time)
			.ok_or_else(|| Error::InvalidArgument("reminder.send_time is invalid.".to_string()))?;
		let timezone = bday_config::parse_utc_offset(&reminder.timezone)
			.ok_or_else(|| Error::InvalidArgument("reminder.timezone is invalid.".to_string()))?;

		Ok(Self {
			enabled: reminder.enabled,
			send_time,
			timezone,
			message: reminder.message.clone(),
			days_ahead: reminder.days_ahead,
			updated_at: None,
		})
	}

	/// The calendar date of `now` in the configured timezone.
	pub fn local_date(&self, now: OffsetDateTime) -> Date {
		now.to_offset(self.timezone).date()
	}
}
