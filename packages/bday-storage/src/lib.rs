pub mod db;
pub mod memory;
pub mod models;
pub mod queries;
pub mod schema;

mod error;

pub use error::Error;

use std::{future::Future, pin::Pin};

use time::{Date, OffsetDateTime};
use uuid::Uuid;

use bday_domain::NotificationStatus;

use crate::models::{
	Member, NewNotification, NotificationRecord, NotificationView, Settings, StatusCounts,
	StatusUpdate, ViewPrefilter,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read-only access to the membership directory.
pub trait MemberDirectory
where
	Self: Send + Sync,
{
	fn list_active_members_with_birthdate<'a>(&'a self) -> BoxFuture<'a, Result<Vec<Member>>>;

	fn find_member<'a>(&'a self, member_id: Uuid) -> BoxFuture<'a, Result<Option<Member>>>;
}

pub trait SettingsSource
where
	Self: Send + Sync,
{
	/// `None` until an operator stores settings.
	fn get_settings<'a>(&'a self) -> BoxFuture<'a, Result<Option<Settings>>>;

	fn put_settings<'a>(
		&'a self,
		settings: &'a Settings,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Settings>>;
}

pub trait NotificationStore
where
	Self: Send + Sync,
{
	fn find_for_member_year<'a>(
		&'a self,
		member_id: Uuid,
		year: i32,
	) -> BoxFuture<'a, Result<Option<NotificationRecord>>>;

	/// Fails with [`Error::Conflict`] when the member already has a record for the year.
	fn insert<'a>(&'a self, new: NewNotification) -> BoxFuture<'a, Result<NotificationRecord>>;

	fn get<'a>(&'a self, notification_id: Uuid)
	-> BoxFuture<'a, Result<Option<NotificationRecord>>>;

	fn get_view<'a>(
		&'a self,
		notification_id: Uuid,
	) -> BoxFuture<'a, Result<Option<NotificationView>>>;

	/// Pending records scheduled on or before `today` whose delivery claim is free at `now`.
	/// Records whose birthday is already behind `today` are never due.
	fn list_due<'a>(
		&'a self,
		today: Date,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Vec<NotificationRecord>>>;

	/// Takes the delivery claim when the record still has `expected` status and no live claim.
	fn claim<'a>(
		&'a self,
		notification_id: Uuid,
		expected: NotificationStatus,
		now: OffsetDateTime,
		lease_until: OffsetDateTime,
	) -> BoxFuture<'a, Result<bool>>;

	/// Compare-and-set on `expected`, and on a free claim when `update.unclaimed_at` is set.
	/// `None` when the record moved on, is claimed, or does not exist.
	fn apply_update<'a>(
		&'a self,
		notification_id: Uuid,
		expected: NotificationStatus,
		update: &'a StatusUpdate,
	) -> BoxFuture<'a, Result<Option<NotificationRecord>>>;

	fn fetch_views<'a>(
		&'a self,
		prefilter: &'a ViewPrefilter,
	) -> BoxFuture<'a, Result<Vec<NotificationView>>>;

	fn status_counts<'a>(&'a self, year: i32) -> BoxFuture<'a, Result<StatusCounts>>;

	fn delete_year<'a>(&'a self, year: i32) -> BoxFuture<'a, Result<u64>>;
}
