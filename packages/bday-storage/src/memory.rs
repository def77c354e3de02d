//! Process-local store used by tests and single-node demos.

use std::{
	collections::BTreeMap,
	sync::{Mutex, MutexGuard},
};

use time::{Date, OffsetDateTime};
use uuid::Uuid;

use bday_domain::NotificationStatus;

use crate::{
	BoxFuture, Error, MemberDirectory, NotificationStore, Result, SettingsSource,
	models::{
		Member, NewNotification, NotificationRecord, NotificationView, Settings, StatusCounts,
		StatusUpdate, ViewPrefilter,
	},
};

#[derive(Default)]
struct MemoryState {
	members: BTreeMap<Uuid, Member>,
	settings: Option<Settings>,
	records: BTreeMap<Uuid, NotificationRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
	state: Mutex<MemoryState>,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_members(members: impl IntoIterator<Item = Member>) -> Self {
		let store = Self::new();

		for member in members {
			store.upsert_member(member);
		}

		store
	}

	/// Directory writes happen outside the engine. Tests use this to stand in for them.
	pub fn upsert_member(&self, member: Member) {
		self.lock().members.insert(member.member_id, member);
	}

	pub fn records(&self) -> Vec<NotificationRecord> {
		self.lock().records.values().cloned().collect()
	}

	fn lock(&self) -> MutexGuard<'_, MemoryState> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn view(state: &MemoryState, record: &NotificationRecord) -> NotificationView {
		NotificationView::join(record.clone(), state.members.get(&record.member_id))
	}
}

impl MemberDirectory for MemoryStore {
	fn list_active_members_with_birthdate<'a>(&'a self) -> BoxFuture<'a, Result<Vec<Member>>> {
		let members = self
			.lock()
			.members
			.values()
			.filter(|member| member.is_active && member.birth_date.is_some())
			.cloned()
			.collect();

		Box::pin(async move { Ok(members) })
	}

	fn find_member<'a>(&'a self, member_id: Uuid) -> BoxFuture<'a, Result<Option<Member>>> {
		let member = self.lock().members.get(&member_id).cloned();

		Box::pin(async move { Ok(member) })
	}
}

impl SettingsSource for MemoryStore {
	fn get_settings<'a>(&'a self) -> BoxFuture<'a, Result<Option<Settings>>> {
		let settings = self.lock().settings.clone();

		Box::pin(async move { Ok(settings) })
	}

	fn put_settings<'a>(
		&'a self,
		settings: &'a Settings,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Settings>> {
		let stored = Settings { updated_at: Some(now), ..settings.clone() };

		self.lock().settings = Some(stored.clone());

		Box::pin(async move { Ok(stored) })
	}
}

impl NotificationStore for MemoryStore {
	fn find_for_member_year<'a>(
		&'a self,
		member_id: Uuid,
		year: i32,
	) -> BoxFuture<'a, Result<Option<NotificationRecord>>> {
		let found = self
			.lock()
			.records
			.values()
			.find(|record| record.member_id == member_id && record.year == year)
			.cloned();

		Box::pin(async move { Ok(found) })
	}

	fn insert<'a>(&'a self, new: NewNotification) -> BoxFuture<'a, Result<NotificationRecord>> {
		let result = {
			let mut state = self.lock();
			let duplicate = state
				.records
				.values()
				.any(|record| record.member_id == new.member_id && record.year == new.year);

			if duplicate {
				Err(Error::Conflict(format!(
					"Member {} already has a notification for {}.",
					new.member_id, new.year
				)))
			} else if state.records.contains_key(&new.notification_id) {
				Err(Error::Conflict(format!("Notification {} already exists.", new.notification_id)))
			} else {
				let record = new.into_record();

				state.records.insert(record.notification_id, record.clone());

				Ok(record)
			}
		};

		Box::pin(async move { result })
	}

	fn get<'a>(
		&'a self,
		notification_id: Uuid,
	) -> BoxFuture<'a, Result<Option<NotificationRecord>>> {
		let record = self.lock().records.get(&notification_id).cloned();

		Box::pin(async move { Ok(record) })
	}

	fn get_view<'a>(
		&'a self,
		notification_id: Uuid,
	) -> BoxFuture<'a, Result<Option<NotificationView>>> {
		let view = {
			let state = self.lock();

			state.records.get(&notification_id).map(|record| Self::view(&state, record))
		};

		Box::pin(async move { Ok(view) })
	}

	fn list_due<'a>(
		&'a self,
		today: Date,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Vec<NotificationRecord>>> {
		let mut due: Vec<NotificationRecord> = self
			.lock()
			.records
			.values()
			.filter(|record| {
				record.status == NotificationStatus::Pending
					&& record.notification_date <= today
					&& record.birthday_date >= today
					&& record.claimed_until.is_none_or(|until| until <= now)
			})
			.cloned()
			.collect();

		due.sort_by_key(|record| (record.notification_date, record.notification_id));

		Box::pin(async move { Ok(due) })
	}

	fn claim<'a>(
		&'a self,
		notification_id: Uuid,
		expected: NotificationStatus,
		now: OffsetDateTime,
		lease_until: OffsetDateTime,
	) -> BoxFuture<'a, Result<bool>> {
		let claimed = {
			let mut state = self.lock();

			match state.records.get_mut(&notification_id) {
				Some(record)
					if record.status == expected
						&& record.claimed_until.is_none_or(|until| until <= now) =>
				{
					record.claimed_until = Some(lease_until);
					record.updated_at = now;

					true
				},
				_ => false,
			}
		};

		Box::pin(async move { Ok(claimed) })
	}

	fn apply_update<'a>(
		&'a self,
		notification_id: Uuid,
		expected: NotificationStatus,
		update: &'a StatusUpdate,
	) -> BoxFuture<'a, Result<Option<NotificationRecord>>> {
		let updated = {
			let mut state = self.lock();

			match state.records.get_mut(&notification_id) {
				Some(record) if record.status == expected && update.lease_allows(record) => {
					update.apply_to(record);

					Some(record.clone())
				},
				_ => None,
			}
		};

		Box::pin(async move { Ok(updated) })
	}

	fn fetch_views<'a>(
		&'a self,
		prefilter: &'a ViewPrefilter,
	) -> BoxFuture<'a, Result<Vec<NotificationView>>> {
		let mut views: Vec<NotificationView> = {
			let state = self.lock();

			state
				.records
				.values()
				.filter(|record| prefilter.matches(record))
				.map(|record| Self::view(&state, record))
				.collect()
		};

		views.sort_by_key(|view| (view.record.notification_date, view.record.notification_id));

		Box::pin(async move { Ok(views) })
	}

	fn status_counts<'a>(&'a self, year: i32) -> BoxFuture<'a, Result<StatusCounts>> {
		let mut counts = StatusCounts::default();

		for record in self.lock().records.values().filter(|record| record.year == year) {
			counts.add(record.status, 1);
		}

		Box::pin(async move { Ok(counts) })
	}

	fn delete_year<'a>(&'a self, year: i32) -> BoxFuture<'a, Result<u64>> {
		let deleted = {
			let mut state = self.lock();
			let before = state.records.len();

			state.records.retain(|_, record| record.year != year);

			(before - state.records.len()) as u64
		};

		Box::pin(async move { Ok(deleted) })
	}
}
