use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};
use uuid::Uuid;

use bday_domain::{Birthday, NotificationStatus, occurrence_in_year};
use bday_storage::models::{Member, NewNotification, Settings};

use crate::{BirthdayService, Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationFailure {
	pub member_id: Uuid,
	pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateReport {
	pub year: i32,
	pub members_seen: usize,
	pub created: usize,
	pub created_excluded: usize,
	pub skipped_existing: usize,
	pub skipped_ineligible: usize,
	pub failures: Vec<GenerationFailure>,
}

enum Ensured {
	Created { excluded: bool },
	Existing,
}

impl BirthdayService {
	pub async fn generate_for_today(&self) -> Result<GenerateReport> {
		let settings = self.current_settings().await?;
		let today = settings.local_date(self.clock.now());

		self.generate_with(&settings, today).await
	}

	pub async fn generate_for_date(&self, today: Date) -> Result<GenerateReport> {
		let settings = self.current_settings().await?;

		self.generate_with(&settings, today).await
	}

	async fn generate_with(&self, settings: &Settings, today: Date) -> Result<GenerateReport> {
		let members = self.stores.members.list_active_members_with_birthdate().await?;
		let now = self.clock.now();
		let mut report = GenerateReport { year: today.year(), ..Default::default() };

		for member in &members {
			report.members_seen += 1;

			let Some(birth_date) = member.birth_date else {
				report.skipped_ineligible += 1;

				continue;
			};

			if !member.is_active || member.reachable_phone().is_none() {
				report.skipped_ineligible += 1;

				continue;
			}
			if birth_date > today {
				let err = bday_domain::Error::MalformedBirthdate {
					message: format!("birth date {birth_date} is after {today}."),
				};

				report
					.failures
					.push(GenerationFailure { member_id: member.member_id, reason: err.to_string() });

				continue;
			}

			let birthday = Birthday::from_date(birth_date);

			if let Err(err) =
				self.generate_member(member, birthday, settings, today, now, &mut report).await
			{
				tracing::warn!(
					member_id = %member.member_id,
					error = %err,
					"Failed to generate birthday notification."
				);

				report
					.failures
					.push(GenerationFailure { member_id: member.member_id, reason: err.to_string() });
			}
		}

		tracing::info!(
			year = report.year,
			members_seen = report.members_seen,
			created = report.created,
			created_excluded = report.created_excluded,
			skipped_existing = report.skipped_existing,
			skipped_ineligible = report.skipped_ineligible,
			failures = report.failures.len(),
			"Birthday generation pass finished."
		);

		Ok(report)
	}

	async fn generate_member(
		&self,
		member: &Member,
		birthday: Birthday,
		settings: &Settings,
		today: Date,
		now: OffsetDateTime,
		report: &mut GenerateReport,
	) -> Result<()> {
		for (year, occurrence, notification_date) in target_years(birthday, today, settings)? {
			match self.ensure_record(member, year, occurrence, notification_date, now).await? {
				Ensured::Created { excluded: true } => {
					report.created += 1;
					report.created_excluded += 1;
				},
				Ensured::Created { excluded: false } => report.created += 1,
				Ensured::Existing => report.skipped_existing += 1,
			}
		}

		Ok(())
	}

	async fn ensure_record(
		&self,
		member: &Member,
		year: i32,
		occurrence: Date,
		notification_date: Date,
		now: OffsetDateTime,
	) -> Result<Ensured> {
		let notifications = &self.stores.notifications;

		if notifications.find_for_member_year(member.member_id, year).await?.is_some() {
			return Ok(Ensured::Existing);
		}

		let status = NotificationStatus::initial(member.is_excluded);
		let new = NewNotification {
			notification_id: Uuid::new_v4(),
			member_id: member.member_id,
			birthday_date: occurrence,
			notification_date,
			year,
			status,
			created_at: now,
		};

		match notifications.insert(new).await {
			Ok(record) => {
				tracing::debug!(
					record_id = %record.notification_id,
					member_id = %member.member_id,
					year,
					status = %record.status,
					"Birthday notification created."
				);

				Ok(Ensured::Created { excluded: status == NotificationStatus::Excluded })
			},
			// Another pass created the record between the lookup and the insert.
			Err(bday_storage::Error::Conflict(_)) => Ok(Ensured::Existing),
			Err(err) => Err(err.into()),
		}
	}
}

/// The current year always, plus next year once its reminder date has arrived.
fn target_years(
	birthday: Birthday,
	today: Date,
	settings: &Settings,
) -> Result<Vec<(i32, Date, Date)>> {
	let mut targets = Vec::with_capacity(2);

	for year in [today.year(), today.year() + 1] {
		let occurrence = occurrence_in_year(birthday, year)?;
		let notification_date = notification_date_for(occurrence, settings.days_ahead)?;

		if year == today.year() || notification_date <= today {
			targets.push((year, occurrence, notification_date));
		}
	}

	Ok(targets)
}

pub(crate) fn notification_date_for(occurrence: Date, days_ahead: u32) -> Result<Date> {
	occurrence.checked_sub(Duration::days(i64::from(days_ahead))).ok_or_else(|| {
		Error::InvalidRequest {
			message: format!("{days_ahead} days before {occurrence} is out of range."),
		}
	})
}

#[cfg(test)]
mod tests {
	use time::{
		UtcOffset,
		macros::{date, time},
	};

	use super::*;

	fn settings(days_ahead: u32) -> Settings {
		Settings {
			enabled: true,
			send_time: time!(08:00),
			timezone: UtcOffset::UTC,
			message: "Happy birthday, {name}!".to_string(),
			days_ahead,
			updated_at: None,
		}
	}

	#[test]
	fn targets_only_current_year_mid_year() {
		let birthday = Birthday::new(6, 10).expect("Expected a birthday.");
		let targets =
			target_years(birthday, date!(2025 - 05 - 01), &settings(7)).expect("Expected targets.");

		assert_eq!(targets, vec![(2025, date!(2025 - 06 - 10), date!(2025 - 06 - 03))]);
	}

	#[test]
	fn lookahead_reaches_into_next_year() {
		let birthday = Birthday::new(1, 2).expect("Expected a birthday.");
		let targets =
			target_years(birthday, date!(2025 - 12 - 28), &settings(7)).expect("Expected targets.");

		assert_eq!(
			targets,
			vec![
				(2025, date!(2025 - 01 - 02), date!(2024 - 12 - 26)),
				(2026, date!(2026 - 01 - 02), date!(2025 - 12 - 26)),
			]
		);
	}
}
