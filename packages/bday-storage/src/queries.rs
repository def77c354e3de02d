use sqlx::QueryBuilder;
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use bday_domain::NotificationStatus;

use crate::{
	BoxFuture, Error, MemberDirectory, NotificationStore, Result, SettingsSource,
	db::Db,
	models::{
		Member, NewNotification, NotificationRecord, NotificationView, Settings, StatusCounts,
		StatusUpdate, ViewPrefilter,
	},
};

const NOTIFICATION_COLUMNS: &str = "\
n.notification_id,
	n.member_id,
	n.birthday_date,
	n.notification_date,
	n.year,
	n.status,
	n.message,
	n.sent_at,
	n.error_message,
	n.is_excluded,
	n.attempts,
	n.claimed_until,
	n.created_at,
	n.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
	notification_id: Uuid,
	member_id: Uuid,
	birthday_date: Date,
	notification_date: Date,
	year: i32,
	status: String,
	message: Option<String>,
	sent_at: Option<OffsetDateTime>,
	error_message: Option<String>,
	is_excluded: bool,
	attempts: i32,
	claimed_until: Option<OffsetDateTime>,
	created_at: OffsetDateTime,
	updated_at: OffsetDateTime,
}
impl TryFrom<NotificationRow> for NotificationRecord {
	type Error = Error;

	fn try_from(row: NotificationRow) -> Result<Self> {
		Ok(Self {
			notification_id: row.notification_id,
			member_id: row.member_id,
			birthday_date: row.birthday_date,
			notification_date: row.notification_date,
			year: row.year,
			status: row.status.parse()?,
			message: row.message,
			sent_at: row.sent_at,
			error_message: row.error_message,
			is_excluded: row.is_excluded,
			attempts: row.attempts,
			claimed_until: row.claimed_until,
			created_at: row.created_at,
			updated_at: row.updated_at,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
struct NotificationViewRow {
	#[sqlx(flatten)]
	record: NotificationRow,
	full_name: String,
	phone: Option<String>,
	birth_date: Option<Date>,
	alumni_year: Option<String>,
	province: Option<String>,
	city: Option<String>,
	district: Option<String>,
	subdistrict: Option<String>,
}
impl TryFrom<NotificationViewRow> for NotificationView {
	type Error = Error;

	fn try_from(row: NotificationViewRow) -> Result<Self> {
		Ok(Self {
			record: row.record.try_into()?,
			full_name: row.full_name,
			phone: row.phone,
			birth_date: row.birth_date,
			alumni_year: row.alumni_year,
			province: row.province,
			city: row.city,
			district: row.district,
			subdistrict: row.subdistrict,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
struct SettingsRow {
	enabled: bool,
	send_time: Time,
	timezone: String,
	message: String,
	days_ahead: i32,
	updated_at: OffsetDateTime,
}
impl TryFrom<SettingsRow> for Settings {
	type Error = Error;

	fn try_from(row: SettingsRow) -> Result<Self> {
		let timezone = bday_config::parse_utc_offset(&row.timezone).ok_or_else(|| {
			Error::InvalidData(format!("Stored timezone {:?} is not a UTC offset.", row.timezone))
		})?;
		let days_ahead = u32::try_from(row.days_ahead).map_err(|_| {
			Error::InvalidData(format!("Stored days_ahead {} is negative.", row.days_ahead))
		})?;

		Ok(Self {
			enabled: row.enabled,
			send_time: row.send_time,
			timezone,
			message: row.message,
			days_ahead,
			updated_at: Some(row.updated_at),
		})
	}
}

pub async fn list_active_members_with_birthdate(db: &Db) -> Result<Vec<Member>> {
	let members = sqlx::query_as::<_, Member>(
		"\
SELECT
	member_id,
	full_name,
	phone,
	birth_date,
	is_active,
	is_excluded,
	alumni_year,
	province,
	city,
	district,
	subdistrict
FROM members
WHERE is_active AND birth_date IS NOT NULL
ORDER BY member_id",
	)
	.fetch_all(&db.pool)
	.await?;

	Ok(members)
}

pub async fn find_member(db: &Db, member_id: Uuid) -> Result<Option<Member>> {
	let member = sqlx::query_as::<_, Member>(
		"\
SELECT
	member_id,
	full_name,
	phone,
	birth_date,
	is_active,
	is_excluded,
	alumni_year,
	province,
	city,
	district,
	subdistrict
FROM members
WHERE member_id = $1",
	)
	.bind(member_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(member)
}

pub async fn get_settings(db: &Db) -> Result<Option<Settings>> {
	let row = sqlx::query_as::<_, SettingsRow>(
		"\
SELECT enabled, send_time, timezone, message, days_ahead, updated_at
FROM birthday_settings
WHERE settings_id = 1",
	)
	.fetch_optional(&db.pool)
	.await?;

	row.map(Settings::try_from).transpose()
}

pub async fn put_settings(db: &Db, settings: &Settings, now: OffsetDateTime) -> Result<Settings> {
	let days_ahead = i32::try_from(settings.days_ahead)
		.map_err(|_| Error::InvalidArgument("days_ahead is out of range.".to_string()))?;
	let row = sqlx::query_as::<_, SettingsRow>(
		"\
INSERT INTO birthday_settings (settings_id, enabled, send_time, timezone, message, days_ahead, updated_at)
VALUES (1, $1, $2, $3, $4, $5, $6)
ON CONFLICT (settings_id) DO UPDATE
SET
	enabled = EXCLUDED.enabled,
	send_time = EXCLUDED.send_time,
	timezone = EXCLUDED.timezone,
	message = EXCLUDED.message,
	days_ahead = EXCLUDED.days_ahead,
	updated_at = EXCLUDED.updated_at
RETURNING enabled, send_time, timezone, message, days_ahead, updated_at",
	)
	.bind(settings.enabled)
	.bind(settings.send_time)
	.bind(bday_config::format_utc_offset(settings.timezone))
	.bind(settings.message.as_str())
	.bind(days_ahead)
	.bind(now)
	.fetch_one(&db.pool)
	.await?;

	row.try_into()
}

pub async fn find_for_member_year(
	db: &Db,
	member_id: Uuid,
	year: i32,
) -> Result<Option<NotificationRecord>> {
	let sql = format!(
		"SELECT {NOTIFICATION_COLUMNS} FROM birthday_notifications n WHERE n.member_id = $1 AND n.year = $2"
	);
	let row = sqlx::query_as::<_, NotificationRow>(&sql)
		.bind(member_id)
		.bind(year)
		.fetch_optional(&db.pool)
		.await?;

	row.map(NotificationRecord::try_from).transpose()
}

pub async fn insert_notification(db: &Db, new: NewNotification) -> Result<NotificationRecord> {
	let record = new.into_record();
	let result = sqlx::query(
		"\
INSERT INTO birthday_notifications (
	notification_id,
	member_id,
	birthday_date,
	notification_date,
	year,
	status,
	is_excluded,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
	)
	.bind(record.notification_id)
	.bind(record.member_id)
	.bind(record.birthday_date)
	.bind(record.notification_date)
	.bind(record.year)
	.bind(record.status.as_str())
	.bind(record.is_excluded)
	.bind(record.created_at)
	.bind(record.updated_at)
	.execute(&db.pool)
	.await;

	match result {
		Ok(_) => Ok(record),
		Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Err(Error::Conflict(
			format!("Member {} already has a notification for {}.", record.member_id, record.year),
		)),
		Err(err) => Err(err.into()),
	}
}

pub async fn get_notification(
	db: &Db,
	notification_id: Uuid,
) -> Result<Option<NotificationRecord>> {
	let sql = format!(
		"SELECT {NOTIFICATION_COLUMNS} FROM birthday_notifications n WHERE n.notification_id = $1"
	);
	let row = sqlx::query_as::<_, NotificationRow>(&sql)
		.bind(notification_id)
		.fetch_optional(&db.pool)
		.await?;

	row.map(NotificationRecord::try_from).transpose()
}

pub async fn get_view(db: &Db, notification_id: Uuid) -> Result<Option<NotificationView>> {
	let mut builder = view_query();

	builder.push(" WHERE n.notification_id = ");
	builder.push_bind(notification_id);

	let row: Option<NotificationViewRow> =
		builder.build_query_as().fetch_optional(&db.pool).await?;

	row.map(NotificationView::try_from).transpose()
}

pub async fn list_due(
	db: &Db,
	today: Date,
	now: OffsetDateTime,
) -> Result<Vec<NotificationRecord>> {
	let sql = format!(
		"\
SELECT {NOTIFICATION_COLUMNS}
FROM birthday_notifications n
WHERE n.status = 'PENDING'
	AND n.notification_date <= $1
	AND n.birthday_date >= $1
	AND (n.claimed_until IS NULL OR n.claimed_until <= $2)
ORDER BY n.notification_date ASC, n.notification_id ASC"
	);
	let rows = sqlx::query_as::<_, NotificationRow>(&sql)
		.bind(today)
		.bind(now)
		.fetch_all(&db.pool)
		.await?;

	rows.into_iter().map(NotificationRecord::try_from).collect()
}

pub async fn claim(
	db: &Db,
	notification_id: Uuid,
	expected: NotificationStatus,
	now: OffsetDateTime,
	lease_until: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE birthday_notifications
SET claimed_until = $1, updated_at = $2
WHERE notification_id = $3
	AND status = $4
	AND (claimed_until IS NULL OR claimed_until <= $2)",
	)
	.bind(lease_until)
	.bind(now)
	.bind(notification_id)
	.bind(expected.as_str())
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}

pub async fn apply_update(
	db: &Db,
	notification_id: Uuid,
	expected: NotificationStatus,
	update: &StatusUpdate,
) -> Result<Option<NotificationRecord>> {
	let sql = format!(
		"\
UPDATE birthday_notifications n
SET
	status = $1,
	is_excluded = $2,
	message = COALESCE($3, n.message),
	sent_at = COALESCE($4, n.sent_at),
	error_message = $5,
	attempts = n.attempts + $6,
	claimed_until = NULL,
	updated_at = $7
WHERE n.notification_id = $8
	AND n.status = $9
	AND ($10::timestamptz IS NULL OR n.claimed_until IS NULL OR n.claimed_until <= $10)
RETURNING {NOTIFICATION_COLUMNS}"
	);
	let row = sqlx::query_as::<_, NotificationRow>(&sql)
		.bind(update.status.as_str())
		.bind(update.is_excluded)
		.bind(update.message.as_deref())
		.bind(update.sent_at)
		.bind(update.error_message.as_deref())
		.bind(i32::from(update.count_attempt))
		.bind(update.updated_at)
		.bind(notification_id)
		.bind(expected.as_str())
		.bind(update.unclaimed_at)
		.fetch_optional(&db.pool)
		.await?;

	row.map(NotificationRecord::try_from).transpose()
}

pub async fn fetch_views(db: &Db, prefilter: &ViewPrefilter) -> Result<Vec<NotificationView>> {
	let mut builder = view_query();

	builder.push(" WHERE TRUE");

	if let Some(year) = prefilter.year {
		builder.push(" AND n.year = ");
		builder.push_bind(year);
	}
	if let Some(status) = prefilter.status {
		builder.push(" AND n.status = ");
		builder.push_bind(status.as_str());
	}

	builder.push(" ORDER BY n.notification_date ASC, n.notification_id ASC");

	let rows: Vec<NotificationViewRow> = builder.build_query_as().fetch_all(&db.pool).await?;

	rows.into_iter().map(NotificationView::try_from).collect()
}

pub async fn status_counts(db: &Db, year: i32) -> Result<StatusCounts> {
	let rows: Vec<(String, i64)> = sqlx::query_as(
		"\
SELECT status, COUNT(*)
FROM birthday_notifications
WHERE year = $1
GROUP BY status",
	)
	.bind(year)
	.fetch_all(&db.pool)
	.await?;
	let mut counts = StatusCounts::default();

	for (status, count) in rows {
		counts.add(status.parse()?, u64::try_from(count).unwrap_or_default());
	}

	Ok(counts)
}

pub async fn delete_year(db: &Db, year: i32) -> Result<u64> {
	let result = sqlx::query("DELETE FROM birthday_notifications WHERE year = $1")
		.bind(year)
		.execute(&db.pool)
		.await?;

	tracing::info!(year, deleted = result.rows_affected(), "Deleted birthday notifications.");

	Ok(result.rows_affected())
}

fn view_query() -> QueryBuilder<'static, sqlx::Postgres> {
	QueryBuilder::new(format!(
		"\
SELECT
	{NOTIFICATION_COLUMNS},
	COALESCE(m.full_name, '') AS full_name,
	m.phone,
	m.birth_date,
	m.alumni_year,
	m.province,
	m.city,
	m.district,
	m.subdistrict
FROM birthday_notifications n
LEFT JOIN members m ON m.member_id = n.member_id"
	))
}

impl MemberDirectory for Db {
	fn list_active_members_with_birthdate<'a>(&'a self) -> BoxFuture<'a, Result<Vec<Member>>> {
		Box::pin(list_active_members_with_birthdate(self))
	}

	fn find_member<'a>(&'a self, member_id: Uuid) -> BoxFuture<'a, Result<Option<Member>>> {
		Box::pin(find_member(self, member_id))
	}
}

impl SettingsSource for Db {
	fn get_settings<'a>(&'a self) -> BoxFuture<'a, Result<Option<Settings>>> {
		Box::pin(get_settings(self))
	}

	fn put_settings<'a>(
		&'a self,
		settings: &'a Settings,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Settings>> {
		Box::pin(put_settings(self, settings, now))
	}
}

impl NotificationStore for Db {
	fn find_for_member_year<'a>(
		&'a self,
		member_id: Uuid,
		year: i32,
	) -> BoxFuture<'a, Result<Option<NotificationRecord>>> {
		Box::pin(find_for_member_year(self, member_id, year))
	}

	fn insert<'a>(&'a self, new: NewNotification) -> BoxFuture<'a, Result<NotificationRecord>> {
		Box::pin(insert_notification(self, new))
	}

	fn get<'a>(
		&'a self,
		notification_id: Uuid,
	) -> BoxFuture<'a, Result<Option<NotificationRecord>>> {
		Box::pin(get_notification(self, notification_id))
	}

	fn get_view<'a>(
		&'a self,
		notification_id: Uuid,
	) -> BoxFuture<'a, Result<Option<NotificationView>>> {
		Box::pin(get_view(self, notification_id))
	}

	fn list_due<'a>(
		&'a self,
		today: Date,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Vec<NotificationRecord>>> {
		Box::pin(list_due(self, today, now))
	}

	fn claim<'a>(
		&'a self,
		notification_id: Uuid,
		expected: NotificationStatus,
		now: OffsetDateTime,
		lease_until: OffsetDateTime,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(claim(self, notification_id, expected, now, lease_until))
	}

	fn apply_update<'a>(
		&'a self,
		notification_id: Uuid,
		expected: NotificationStatus,
		update: &'a StatusUpdate,
	) -> BoxFuture<'a, Result<Option<NotificationRecord>>> {
		Box::pin(apply_update(self, notification_id, expected, update))
	}

	fn fetch_views<'a>(
		&'a self,
		prefilter: &'a ViewPrefilter,
	) -> BoxFuture<'a, Result<Vec<NotificationView>>> {
		Box::pin(fetch_views(self, prefilter))
	}

	fn status_counts<'a>(&'a self, year: i32) -> BoxFuture<'a, Result<StatusCounts>> {
		Box::pin(status_counts(self, year))
	}

	fn delete_year<'a>(&'a self, year: i32) -> BoxFuture<'a, Result<u64>> {
		Box::pin(delete_year(self, year))
	}
}
