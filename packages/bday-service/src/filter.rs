//! Predicates evaluated in process after the storage prefilter.

use time::{Date, macros::date};

use bday_domain::{Birthday, MonthDayRange, days_since_last_occurrence, days_until_next_occurrence};
use bday_storage::models::{NotificationView, ViewPrefilter};

use crate::{Error, QueryRequest, Result};

/// Case-insensitive substring match on an optional column.
#[derive(Clone, Debug)]
struct Contains(String);
impl Contains {
	fn parse(raw: Option<&str>) -> Option<Self> {
		raw.map(str::trim).filter(|value| !value.is_empty()).map(|value| Self(value.to_lowercase()))
	}

	fn matches(&self, value: Option<&str>) -> bool {
		value.is_some_and(|value| value.to_lowercase().contains(&self.0))
	}
}

#[derive(Clone, Debug, Default)]
pub(crate) struct NotificationFilter {
	prefilter: ViewPrefilter,
	notification_from: Option<Date>,
	notification_to: Option<Date>,
	excluded: Option<bool>,
	alumni_year: Option<String>,
	name: Option<Contains>,
	province: Option<Contains>,
	city: Option<Contains>,
	district: Option<Contains>,
	subdistrict: Option<Contains>,
	birthday_range: Option<MonthDayRange>,
	max_days_until_birthday: Option<u32>,
}
impl NotificationFilter {
	pub(crate) fn parse(req: &QueryRequest) -> Result<Self> {
		if let (Some(from), Some(to)) = (req.notification_date_from, req.notification_date_to)
			&& from > to
		{
			return Err(Error::InvalidRequest {
				message: "notification_date_from must not be after notification_date_to."
					.to_string(),
			});
		}

		let birthday_range = match (req.birth_date_from, req.birth_date_to) {
			(Some(from), Some(to)) => Some(MonthDayRange { from, to }),
			(Some(from), None) => Some(MonthDayRange { from, to: last_day_of_year() }),
			(None, Some(to)) => Some(MonthDayRange { from: first_day_of_year(), to }),
			(None, None) => None,
		};

		Ok(Self {
			prefilter: ViewPrefilter { year: req.year, status: req.status },
			notification_from: req.notification_date_from,
			notification_to: req.notification_date_to,
			excluded: req.excluded,
			alumni_year: req
				.alumni_year
				.as_deref()
				.map(str::trim)
				.filter(|value| !value.is_empty())
				.map(str::to_string),
			name: Contains::parse(req.name.as_deref()),
			province: Contains::parse(req.province.as_deref()),
			city: Contains::parse(req.city.as_deref()),
			district: Contains::parse(req.district.as_deref()),
			subdistrict: Contains::parse(req.subdistrict.as_deref()),
			birthday_range,
			max_days_until_birthday: req.max_days_until_birthday,
		})
	}

	pub(crate) fn prefilter(&self) -> &ViewPrefilter {
		&self.prefilter
	}

	pub(crate) fn matches(&self, view: &NotificationView, today: Date) -> bool {
		let record = &view.record;

		if !self.prefilter.matches(record) {
			return false;
		}
		if self.notification_from.is_some_and(|from| record.notification_date < from)
			|| self.notification_to.is_some_and(|to| record.notification_date > to)
		{
			return false;
		}
		if self.excluded.is_some_and(|excluded| record.is_excluded != excluded) {
			return false;
		}
		if let Some(alumni_year) = self.alumni_year.as_deref()
			&& view.alumni_year.as_deref().map(str::trim) != Some(alumni_year)
		{
			return false;
		}

		let text_filters = [
			(&self.name, Some(view.full_name.as_str())),
			(&self.province, view.province.as_deref()),
			(&self.city, view.city.as_deref()),
			(&self.district, view.district.as_deref()),
			(&self.subdistrict, view.subdistrict.as_deref()),
		];

		if text_filters
			.iter()
			.any(|(filter, value)| filter.as_ref().is_some_and(|filter| !filter.matches(*value)))
		{
			return false;
		}

		let birthday = view_birthday(view);

		if let Some(range) = self.birthday_range
			&& !range.contains(birthday)
		{
			return false;
		}
		if let Some(max_days) = self.max_days_until_birthday {
			match days_until_birthday(view, today) {
				Some(days) if days <= i64::from(max_days) => {},
				_ => return false,
			}
		}

		true
	}
}

/// The member's recurring birthday, falling back to the record's occurrence when the member is
/// gone or has no birth date.
pub(crate) fn view_birthday(view: &NotificationView) -> Birthday {
	Birthday::from_date(view.birth_date.unwrap_or(view.record.birthday_date))
}

pub(crate) fn days_until_birthday(view: &NotificationView, today: Date) -> Option<i64> {
	days_until_next_occurrence(view_birthday(view), today).ok().map(|occurrence| occurrence.days)
}

/// Days until the record's own occurrence, when it is the next one.
pub(crate) fn upcoming_days(view: &NotificationView, today: Date) -> Option<i64> {
	let occurrence = days_until_next_occurrence(view_birthday(view), today).ok()?;

	(occurrence.date.year() == view.record.year).then_some(occurrence.days)
}

/// Days since the record's own occurrence, when it is the last one.
pub(crate) fn past_days(view: &NotificationView, today: Date) -> Option<i64> {
	let occurrence = days_since_last_occurrence(view_birthday(view), today).ok()?;

	(occurrence.date.year() == view.record.year).then_some(occurrence.days)
}

fn first_day_of_year() -> Birthday {
	Birthday::from_date(date!(2000 - 01 - 01))
}

fn last_day_of_year() -> Birthday {
	Birthday::from_date(date!(2000 - 12 - 31))
}
