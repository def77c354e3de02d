use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use bday_domain::{Birthday, NotificationStatus};
use bday_storage::models::{NotificationView, ViewPrefilter};

use crate::{
	BirthdayService, Error, Result,
	filter::{self, NotificationFilter},
};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 200;
pub const DEFAULT_WINDOW_DAYS: u32 = 7;
pub const MAX_WINDOW_DAYS: u32 = 366;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
	#[default]
	NotificationDate,
	BirthdayDate,
	FullName,
	Status,
	Year,
	CreatedAt,
	SentAt,
	DaysUntilBirthday,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
	#[default]
	Asc,
	Desc,
}

/// Filters are AND-combined. Absent fields do not constrain the result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
	pub status: Option<NotificationStatus>,
	#[serde(with = "crate::time_serde::date::option")]
	pub notification_date_from: Option<Date>,
	#[serde(with = "crate::time_serde::date::option")]
	pub notification_date_to: Option<Date>,
	pub excluded: Option<bool>,
	pub year: Option<i32>,
	pub alumni_year: Option<String>,
	pub name: Option<String>,
	pub province: Option<String>,
	pub city: Option<String>,
	pub district: Option<String>,
	pub subdistrict: Option<String>,
	/// `MM-DD`. A range whose start is after its end wraps over New Year.
	pub birth_date_from: Option<Birthday>,
	pub birth_date_to: Option<Birthday>,
	pub max_days_until_birthday: Option<u32>,
	pub sort_by: Option<SortField>,
	pub sort_direction: Option<SortDirection>,
	pub page: Option<u32>,
	pub size: Option<u32>,
}

/// Parameters for the upcoming and past views.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowRequest {
	pub days: Option<u32>,
	pub sort_by: Option<SortField>,
	pub sort_direction: Option<SortDirection>,
	pub page: Option<u32>,
	pub size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
	pub items: Vec<T>,
	pub page: u32,
	pub size: u32,
	pub total: u64,
	pub total_pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationItem {
	pub notification_id: Uuid,
	pub member_id: Uuid,
	pub full_name: String,
	pub phone: Option<String>,
	#[serde(with = "crate::time_serde::date::option")]
	pub birth_date: Option<Date>,
	pub alumni_year: Option<String>,
	pub province: Option<String>,
	pub city: Option<String>,
	pub district: Option<String>,
	pub subdistrict: Option<String>,
	#[serde(with = "crate::time_serde::date")]
	pub birthday_date: Date,
	#[serde(with = "crate::time_serde::date")]
	pub notification_date: Date,
	pub year: i32,
	pub status: NotificationStatus,
	pub message: Option<String>,
	#[serde(with = "crate::time_serde::option")]
	pub sent_at: Option<OffsetDateTime>,
	pub error_message: Option<String>,
	pub is_excluded: bool,
	pub attempts: i32,
	pub days_until_birthday: Option<i64>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}
impl NotificationItem {
	pub(crate) fn from_view(view: NotificationView, today: Date) -> Self {
		let days_until_birthday = filter::days_until_birthday(&view, today);
		let NotificationView {
			record,
			full_name,
			phone,
			birth_date,
			alumni_year,
			province,
			city,
			district,
			subdistrict,
		} = view;

		Self {
			notification_id: record.notification_id,
			member_id: record.member_id,
			full_name,
			phone,
			birth_date,
			alumni_year,
			province,
			city,
			district,
			subdistrict,
			birthday_date: record.birthday_date,
			notification_date: record.notification_date,
			year: record.year,
			status: record.status,
			message: record.message,
			sent_at: record.sent_at,
			error_message: record.error_message,
			is_excluded: record.is_excluded,
			attempts: record.attempts,
			days_until_birthday,
			created_at: record.created_at,
			updated_at: record.updated_at,
		}
	}
}

struct Paging {
	page: u32,
	size: u32,
}
impl Paging {
	fn parse(page: Option<u32>, size: Option<u32>) -> Result<Self> {
		let size = size.unwrap_or(DEFAULT_PAGE_SIZE);

		if size == 0 || size > MAX_PAGE_SIZE {
			return Err(Error::InvalidRequest {
				message: format!("size must be between 1 and {MAX_PAGE_SIZE}."),
			});
		}

		Ok(Self { page: page.unwrap_or(0), size })
	}
}

struct Order {
	field: SortField,
	direction: SortDirection,
}

impl BirthdayService {
	pub async fn query(&self, req: QueryRequest) -> Result<Page<NotificationItem>> {
		let paging = Paging::parse(req.page, req.size)?;
		let filter = NotificationFilter::parse(&req)?;
		let today = self.today().await?;
		let views = self.stores.notifications.fetch_views(filter.prefilter()).await?;
		let kept = views.into_iter().filter(|view| filter.matches(view, today)).collect();
		let order = Order {
			field: req.sort_by.unwrap_or_default(),
			direction: req.sort_direction.unwrap_or_default(),
		};

		Ok(paginate(sort(kept, Some(&order), today), &paging, today))
	}

	/// Records whose birthday is today or within the next `days` days, soonest first.
	pub async fn upcoming(&self, req: WindowRequest) -> Result<Page<NotificationItem>> {
		self.window(req, filter::upcoming_days).await
	}

	/// Records whose birthday was between one and `days` days ago, most recent first.
	pub async fn past(&self, req: WindowRequest) -> Result<Page<NotificationItem>> {
		self.window(req, |view, today| filter::past_days(view, today).filter(|days| *days >= 1))
			.await
	}

	/// Keeps records whose `distance` from today is within the window, nearest first unless the
	/// request names a sort field.
	async fn window<F>(&self, req: WindowRequest, distance: F) -> Result<Page<NotificationItem>>
	where
		F: Fn(&NotificationView, Date) -> Option<i64>,
	{
		let paging = Paging::parse(req.page, req.size)?;
		let days = req.days.unwrap_or(DEFAULT_WINDOW_DAYS);

		if days > MAX_WINDOW_DAYS {
			return Err(Error::InvalidRequest {
				message: format!("days must be at most {MAX_WINDOW_DAYS}."),
			});
		}

		let today = self.today().await?;
		let views = self.stores.notifications.fetch_views(&ViewPrefilter::default()).await?;
		let mut kept: Vec<(i64, NotificationView)> = views
			.into_iter()
			.filter_map(|view| {
				distance(&view, today)
					.filter(|distance| *distance <= i64::from(days))
					.map(|distance| (distance, view))
			})
			.collect();
		let explicit = req.sort_by.map(|field| Order {
			field,
			direction: req.sort_direction.unwrap_or_default(),
		});

		if explicit.is_none() {
			kept.sort_by(|(a_distance, a), (b_distance, b)| {
				a_distance
					.cmp(b_distance)
					.then_with(|| a.record.notification_id.cmp(&b.record.notification_id))
			});
		}

		let kept = kept.into_iter().map(|(_, view)| view).collect();

		Ok(paginate(sort(kept, explicit.as_ref(), today), &paging, today))
	}

	async fn today(&self) -> Result<Date> {
		let settings = self.current_settings().await?;

		Ok(settings.local_date(self.clock.now()))
	}
}

/// Sorts by `order` with the record id as the tie breaker. `None` keeps the incoming order.
fn sort(
	mut views: Vec<NotificationView>,
	order: Option<&Order>,
	today: Date,
) -> Vec<NotificationView> {
	let Some(order) = order else {
		return views;
	};

	views.sort_by(|a, b| {
		directed(compare(a, b, order.field, today), order.direction)
			.then_with(|| a.record.notification_id.cmp(&b.record.notification_id))
	});

	views
}

fn compare(a: &NotificationView, b: &NotificationView, field: SortField, today: Date) -> Ordering {
	match field {
		SortField::NotificationDate => a.record.notification_date.cmp(&b.record.notification_date),
		SortField::BirthdayDate => a.record.birthday_date.cmp(&b.record.birthday_date),
		SortField::FullName => a.full_name.to_lowercase().cmp(&b.full_name.to_lowercase()),
		SortField::Status => a.record.status.as_str().cmp(b.record.status.as_str()),
		SortField::Year => a.record.year.cmp(&b.record.year),
		SortField::CreatedAt => a.record.created_at.cmp(&b.record.created_at),
		SortField::SentAt => a.record.sent_at.cmp(&b.record.sent_at),
		SortField::DaysUntilBirthday =>
			filter::days_until_birthday(a, today).cmp(&filter::days_until_birthday(b, today)),
	}
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
	match direction {
		SortDirection::Asc => ordering,
		SortDirection::Desc => ordering.reverse(),
	}
}

fn paginate(views: Vec<NotificationView>, paging: &Paging, today: Date) -> Page<NotificationItem> {
	let total = views.len() as u64;
	let size = u64::from(paging.size);
	let total_pages = u32::try_from(total.div_ceil(size)).unwrap_or(u32::MAX);
	let skip = usize::try_from(u64::from(paging.page) * size).unwrap_or(usize::MAX);
	let items = views
		.into_iter()
		.skip(skip)
		.take(paging.size as usize)
		.map(|view| NotificationItem::from_view(view, today))
		.collect();

	Page { items, page: paging.page, size: paging.size, total, total_pages }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_out_of_range_page_sizes() {
		assert!(Paging::parse(None, Some(0)).is_err());
		assert!(Paging::parse(None, Some(MAX_PAGE_SIZE + 1)).is_err());

		let paging = Paging::parse(None, None).expect("Expected default paging.");

		assert_eq!((paging.page, paging.size), (0, DEFAULT_PAGE_SIZE));
	}

	#[test]
	fn sort_fields_use_snake_case_names() {
		let field: SortField =
			serde_json::from_value(serde_json::json!("days_until_birthday")).expect("parse failed");

		assert_eq!(field, SortField::DaysUntilBirthday);
	}
}
