use std::{sync::Arc, time::Duration as StdDuration};

use color_eyre::Result;
use time::{Duration, OffsetDateTime, Time, UtcOffset};
use tokio::time as tokio_time;
use tokio_util::sync::CancellationToken;

use bday_service::BirthdayService;

/// Longest sleep before the settings row is read again, so a changed send time is picked up.
const SETTINGS_REFRESH_SECONDS: u64 = 900;
const SETTINGS_RETRY_SECONDS: u64 = 60;

pub struct WorkerState {
	pub service: Arc<BirthdayService>,
	pub run_on_startup: bool,
}

pub async fn run_worker(state: WorkerState, shutdown: CancellationToken) -> Result<()> {
	tracing::info!(run_on_startup = state.run_on_startup, "Birthday worker started.");

	if state.run_on_startup {
		run_pass(&state.service).await;
	}

	loop {
		let (wait, due) = match state.service.current_settings().await {
			Ok(settings) => {
				let next = duration_until_next_run(
					state.service.clock.now(),
					settings.send_time,
					settings.timezone,
				);
				let refresh = StdDuration::from_secs(SETTINGS_REFRESH_SECONDS);

				if next > refresh { (refresh, false) } else { (next, true) }
			},
			Err(err) => {
				tracing::error!(error = %err, "Failed to read reminder settings.");

				(StdDuration::from_secs(SETTINGS_RETRY_SECONDS), false)
			},
		};

		if due {
			tracing::info!(wait_seconds = wait.as_secs(), "Next birthday pass scheduled.");
		}

		tokio::select! {
			_ = tokio_time::sleep(wait) => {},
			_ = shutdown.cancelled() => {
				tracing::info!("Birthday worker stopped.");

				return Ok(());
			},
		}

		if due {
			run_pass(&state.service).await;
		}
	}
}

/// Generation first so today's new records are dispatched in the same pass.
pub async fn run_pass(service: &BirthdayService) {
	if let Err(err) = service.generate_for_today().await {
		tracing::error!(error = %err, "Birthday generation pass failed.");
	}
	if let Err(err) = service.dispatch_due().await {
		tracing::error!(error = %err, "Birthday dispatch pass failed.");
	}
}

/// Time until the next `send_time` in `offset`. Exactly at the send time waits a full day.
pub fn duration_until_next_run(
	now: OffsetDateTime,
	send_time: Time,
	offset: UtcOffset,
) -> StdDuration {
	let local = now.to_offset(offset);
	let today = local.replace_time(send_time);
	let target = if local >= today {
		today.checked_add(Duration::days(1)).unwrap_or(today)
	} else {
		today
	};

	StdDuration::try_from(target - local).unwrap_or(StdDuration::ZERO)
}

#[cfg(test)]
mod tests {
	use time::macros::{datetime, offset, time};

	use super::*;

	#[test]
	fn waits_for_send_time_later_today() {
		let wait =
			duration_until_next_run(datetime!(2025-06-03 00:30 UTC), time!(08:00), offset!(+7));

		assert_eq!(wait, StdDuration::from_secs(30 * 60));
	}

	#[test]
	fn send_time_already_passed_waits_until_tomorrow() {
		let wait =
			duration_until_next_run(datetime!(2025-06-03 01:00 UTC), time!(08:00), offset!(+7));

		assert_eq!(wait, StdDuration::from_secs(24 * 3_600));
	}

	#[test]
	fn negative_offsets_use_the_local_calendar_day() {
		// 02:00 UTC is 23:00 on the previous local day at -03:00.
		let wait =
			duration_until_next_run(datetime!(2025-06-03 02:00 UTC), time!(08:00), offset!(-3));

		assert_eq!(wait, StdDuration::from_secs(9 * 3_600));
	}
}
