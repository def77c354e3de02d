//! Recurring birthday arithmetic.
//!
//! A birthday is a month/day pair. It is projected onto a concrete year on demand, and a Feb 29
//! birthday falls on Feb 28 in years without a leap day.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};
use time::{Date, Month};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Birthday {
	month: Month,
	day: u8,
}
impl Birthday {
	/// Validates the pair against the longest possible month, so Feb 29 is accepted.
	pub fn new(month: u8, day: u8) -> Result<Self> {
		let month = Month::try_from(month).map_err(|_| Error::MalformedBirthdate {
			message: format!("month {month} is out of range."),
		})?;

		if day == 0 || day > max_day_in(month) {
			return Err(Error::MalformedBirthdate {
				message: format!("day {day} does not exist in {month}."),
			});
		}

		Ok(Self { month, day })
	}

	pub fn from_date(date: Date) -> Self {
		Self { month: date.month(), day: date.day() }
	}

	/// Parses `MM-DD`.
	pub fn parse(raw: &str) -> Result<Self> {
		let malformed =
			|| Error::MalformedBirthdate { message: format!("{raw:?} is not in MM-DD form.") };
		let (month, day) = raw.trim().split_once('-').ok_or_else(malformed)?;
		let month = month.parse::<u8>().map_err(|_| malformed())?;
		let day = day.parse::<u8>().map_err(|_| malformed())?;

		Self::new(month, day)
	}

	pub fn month(self) -> Month {
		self.month
	}

	pub fn day(self) -> u8 {
		self.day
	}

	pub fn is_leap_day(self) -> bool {
		self.month == Month::February && self.day == 29
	}

	fn key(self) -> (u8, u8) {
		(u8::from(self.month), self.day)
	}
}
impl Ord for Birthday {
	fn cmp(&self, other: &Self) -> Ordering {
		self.key().cmp(&other.key())
	}
}
impl PartialOrd for Birthday {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}
impl fmt::Display for Birthday {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:02}-{:02}", u8::from(self.month), self.day)
	}
}
impl Serialize for Birthday {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.collect_str(self)
	}
}
impl<'de> Deserialize<'de> for Birthday {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		Self::parse(&raw).map_err(serde::de::Error::custom)
	}
}

fn max_day_in(month: Month) -> u8 {
	match month {
		Month::February => 29,
		Month::April | Month::June | Month::September | Month::November => 30,
		_ => 31,
	}
}

/// Inclusive month/day range. A range whose start is after its end wraps over New Year.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonthDayRange {
	pub from: Birthday,
	pub to: Birthday,
}
impl MonthDayRange {
	pub fn contains(&self, value: Birthday) -> bool {
		if self.from <= self.to {
			self.from <= value && value <= self.to
		} else {
			value >= self.from || value <= self.to
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Occurrence {
	pub date: Date,
	pub days: i64,
}

pub fn occurrence_in_year(birthday: Birthday, year: i32) -> Result<Date> {
	let day =
		if birthday.is_leap_day() && !time::util::is_leap_year(year) { 28 } else { birthday.day };

	Date::from_calendar_date(year, birthday.month, day).map_err(|_| Error::MalformedBirthdate {
		message: format!("year {year} is outside the supported calendar range."),
	})
}

/// The first occurrence on or after `reference`.
pub fn days_until_next_occurrence(birthday: Birthday, reference: Date) -> Result<Occurrence> {
	let this_year = occurrence_in_year(birthday, reference.year())?;
	let date = if this_year >= reference {
		this_year
	} else {
		occurrence_in_year(birthday, reference.year() + 1)?
	};

	Ok(Occurrence { date, days: (date - reference).whole_days() })
}

/// The last occurrence on or before `reference`.
pub fn days_since_last_occurrence(birthday: Birthday, reference: Date) -> Result<Occurrence> {
	let this_year = occurrence_in_year(birthday, reference.year())?;
	let date = if this_year <= reference {
		this_year
	} else {
		occurrence_in_year(birthday, reference.year() - 1)?
	};

	Ok(Occurrence { date, days: (reference - date).whole_days() })
}

#[cfg(test)]
mod tests {
	use time::macros::date;

	use super::*;

	#[test]
	fn rejects_impossible_pairs() {
		assert!(Birthday::new(13, 1).is_err());
		assert!(Birthday::new(4, 31).is_err());
		assert!(Birthday::new(1, 0).is_err());
		assert!(Birthday::new(2, 29).is_ok());
	}

	#[test]
	fn parses_month_day_text() {
		let birthday = Birthday::parse("02-29").expect("Expected a birthday.");

		assert!(birthday.is_leap_day());
		assert_eq!(birthday.to_string(), "02-29");
		assert!(Birthday::parse("0229").is_err());
	}

	#[test]
	fn leap_day_projects_onto_feb_28() {
		let birthday = Birthday::new(2, 29).expect("Expected a birthday.");

		assert_eq!(occurrence_in_year(birthday, 2025), Ok(date!(2025 - 02 - 28)));
		assert_eq!(occurrence_in_year(birthday, 2024), Ok(date!(2024 - 02 - 29)));
	}

	#[test]
	fn wrapping_range_spans_new_year() {
		let range = MonthDayRange {
			from: Birthday::new(12, 15).expect("Expected a birthday."),
			to: Birthday::new(1, 15).expect("Expected a birthday."),
		};

		assert!(range.contains(Birthday::new(12, 31).expect("Expected a birthday.")));
		assert!(range.contains(Birthday::new(1, 1).expect("Expected a birthday.")));
		assert!(!range.contains(Birthday::new(6, 1).expect("Expected a birthday.")));
	}
}
