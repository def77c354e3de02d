//! Operator actions on single notifications and bulk maintenance.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bday_domain::{NotificationStatus, StatusEvent, transition};
use bday_storage::models::StatusUpdate;

use crate::{BirthdayService, Error, NotificationItem, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteYearResponse {
	pub year: i32,
	pub deleted: u64,
}

impl BirthdayService {
	pub async fn get(&self, notification_id: Uuid) -> Result<NotificationItem> {
		let view =
			self.stores.notifications.get_view(notification_id).await?.ok_or_else(|| {
				Error::NotFound { message: format!("Notification {notification_id} does not exist.") }
			})?;
		let today = self.current_settings().await?.local_date(self.clock.now());

		Ok(NotificationItem::from_view(view, today))
	}

	/// Takes a pending reminder out of dispatch.
	pub async fn exclude(&self, notification_id: Uuid) -> Result<NotificationItem> {
		self.apply_operator_event(notification_id, StatusEvent::Exclude).await
	}

	/// Returns an excluded reminder to the pending queue.
	pub async fn reinstate(&self, notification_id: Uuid) -> Result<NotificationItem> {
		self.apply_operator_event(notification_id, StatusEvent::Reinstate).await
	}

	pub async fn delete_year(&self, year: i32) -> Result<DeleteYearResponse> {
		if !(1..=9_999).contains(&year) {
			return Err(Error::InvalidRequest { message: format!("year {year} is out of range.") });
		}

		let deleted = self.stores.notifications.delete_year(year).await?;

		tracing::info!(year, deleted, "Deleted birthday notifications for year.");

		Ok(DeleteYearResponse { year, deleted })
	}

	async fn apply_operator_event(
		&self,
		notification_id: Uuid,
		event: StatusEvent,
	) -> Result<NotificationItem> {
		let record = self.require_record(notification_id).await?;
		let next = transition(record.status, event)?;
		let now = self.clock.now();
		let update = StatusUpdate {
			status: next,
			is_excluded: next == NotificationStatus::Excluded,
			message: None,
			sent_at: None,
			error_message: record.error_message.clone(),
			count_attempt: false,
			updated_at: now,
			unclaimed_at: Some(now),
		};

		if self
			.stores
			.notifications
			.apply_update(notification_id, record.status, &update)
			.await?
			.is_none()
		{
			let message = if update.lease_allows(&record) {
				format!("Notification {notification_id} changed concurrently.")
			} else {
				format!("Notification {notification_id} is being delivered.")
			};

			return Err(Error::Conflict { message });
		}

		tracing::info!(
			record_id = %notification_id,
			member_id = %record.member_id,
			from = %record.status,
			to = %next,
			%event,
			"Operator changed notification status."
		);

		self.get(notification_id).await
	}
}
