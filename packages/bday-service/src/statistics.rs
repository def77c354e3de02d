use serde::{Deserialize, Serialize};

use crate::{BirthdayService, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
	pub year: i32,
	pub total: u64,
	pub pending: u64,
	pub sent: u64,
	pub resent: u64,
	pub failed: u64,
	pub excluded: u64,
}

impl BirthdayService {
	/// Counts per status for `year`, defaulting to the current local year.
	pub async fn statistics(&self, year: Option<i32>) -> Result<Statistics> {
		let year = match year {
			Some(year) => year,
			None => self.current_settings().await?.local_date(self.clock.now()).year(),
		};
		let counts = self.stores.notifications.status_counts(year).await?;

		Ok(Statistics {
			year,
			total: counts.total(),
			pending: counts.pending,
			sent: counts.sent,
			resent: counts.resent,
			failed: counts.failed,
			excluded: counts.excluded,
		})
	}
}
