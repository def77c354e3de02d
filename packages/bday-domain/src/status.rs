use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
	Pending,
	Sent,
	Failed,
	Excluded,
	/// Delivered by a manual resend. Kept distinct from `Sent` for auditing.
	Resent,
}
impl NotificationStatus {
	pub const ALL: [Self; 5] = [Self::Pending, Self::Sent, Self::Failed, Self::Excluded, Self::Resent];

	/// Records are only ever created pending or excluded.
	pub fn initial(is_excluded: bool) -> Self {
		if is_excluded { Self::Excluded } else { Self::Pending }
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "PENDING",
			Self::Sent => "SENT",
			Self::Failed => "FAILED",
			Self::Excluded => "EXCLUDED",
			Self::Resent => "RESENT",
		}
	}
}
impl fmt::Display for NotificationStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for NotificationStatus {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		Self::ALL
			.into_iter()
			.find(|status| status.as_str().eq_ignore_ascii_case(raw.trim()))
			.ok_or_else(|| Error::UnknownStatus { value: raw.to_string() })
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusEvent {
	/// Scheduled delivery succeeded.
	Delivered,
	/// Scheduled delivery failed.
	DeliveryFailed,
	/// Operator excluded a pending reminder.
	Exclude,
	/// Operator reverted an exclusion.
	Reinstate,
	/// Manual resend succeeded.
	Resent,
	/// Manual resend failed.
	ResendFailed,
}
impl fmt::Display for StatusEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			Self::Delivered => "delivered",
			Self::DeliveryFailed => "delivery_failed",
			Self::Exclude => "exclude",
			Self::Reinstate => "reinstate",
			Self::Resent => "resent",
			Self::ResendFailed => "resend_failed",
		};

		f.write_str(label)
	}
}

/// The only place a status edge is decided. Callers persist the returned status.
pub fn transition(from: NotificationStatus, event: StatusEvent) -> Result<NotificationStatus> {
	use NotificationStatus::*;

	let next = match (from, event) {
		(Pending, StatusEvent::Delivered) => Sent,
		(Pending, StatusEvent::DeliveryFailed) => Failed,
		(Pending, StatusEvent::Exclude) => Excluded,
		(Excluded, StatusEvent::Reinstate) => Pending,
		(Failed | Sent | Resent, StatusEvent::Resent) => Resent,
		(Failed | Sent | Resent, StatusEvent::ResendFailed) => Failed,
		_ => return Err(Error::InvalidTransition { from, event }),
	};

	Ok(next)
}
