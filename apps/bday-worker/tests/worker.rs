use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};

use time::macros::{date, datetime};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use bday_config::{Dispatch, Reminder};
use bday_domain::NotificationStatus;
use bday_service::{BirthdayService, BoxFuture, FixedClock, MessageSender, Stores};
use bday_storage::{memory::MemoryStore, models::Member};
use bday_worker::worker::{self, WorkerState};

#[derive(Default)]
struct CountingSender {
	calls: AtomicUsize,
}
impl MessageSender for CountingSender {
	fn send<'a>(&'a self, _phone: &'a str, _text: &'a str) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Ok(())
		})
	}
}

fn service(store: Arc<MemoryStore>, sender: Arc<CountingSender>) -> BirthdayService {
	let reminder = Reminder {
		enabled: true,
		send_time: "08:00".to_string(),
		timezone: "+07:00".to_string(),
		message: "Selamat ulang tahun, {name}!".to_string(),
		days_ahead: 0,
	};

	BirthdayService::new(
		reminder,
		Dispatch { concurrency: 2, claim_lease_seconds: 120 },
		Stores::shared(store),
		sender,
	)
	.with_clock(Arc::new(FixedClock::new(datetime!(2025-06-10 02:00 UTC))))
}

#[tokio::test]
async fn startup_pass_generates_and_dispatches_before_shutdown() {
	let member = Member {
		member_id: Uuid::new_v4(),
		full_name: "Budi Santoso".to_string(),
		phone: Some("+62812".to_string()),
		birth_date: Some(date!(1988 - 06 - 10)),
		is_active: true,
		is_excluded: false,
		alumni_year: Some("2010".to_string()),
		province: None,
		city: None,
		district: None,
		subdistrict: None,
	};
	let store = Arc::new(MemoryStore::with_members([member]));
	let sender = Arc::new(CountingSender::default());
	let state = WorkerState {
		service: Arc::new(service(store.clone(), sender.clone())),
		run_on_startup: true,
	};
	let shutdown = CancellationToken::new();

	shutdown.cancel();

	worker::run_worker(state, shutdown).await.expect("Worker failed.");

	let records = store.records();

	assert_eq!(records.len(), 1);
	assert_eq!(records[0].status, NotificationStatus::Sent);
	assert_eq!(sender.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancelled_worker_without_startup_pass_does_nothing() {
	let store = Arc::new(MemoryStore::new());
	let sender = Arc::new(CountingSender::default());
	let state =
		WorkerState { service: Arc::new(service(store.clone(), sender.clone())), run_on_startup: false };
	let shutdown = CancellationToken::new();

	shutdown.cancel();

	worker::run_worker(state, shutdown).await.expect("Worker failed.");

	assert!(store.records().is_empty());
	assert_eq!(sender.calls.load(Ordering::SeqCst), 0);
}
