pub mod dispatch;
pub mod filter;
pub mod generate;
pub mod manage;
pub mod query;
pub mod settings;
pub mod statistics;
pub mod time_serde;

mod error;

pub use dispatch::{DispatchReport, ResendResponse};
pub use error::{Error, Result};
pub use generate::{GenerateReport, GenerationFailure};
pub use manage::DeleteYearResponse;
pub use query::{NotificationItem, Page, QueryRequest, SortDirection, SortField, WindowRequest};
pub use settings::{SettingsResponse, SettingsUpdate};
pub use statistics::Statistics;

use std::{
	future::Future,
	pin::Pin,
	sync::{Arc, Mutex},
};

use time::OffsetDateTime;

use bday_config::{Config, Dispatch, Reminder};
use bday_providers::webhook::WebhookSender;
use bday_storage::{MemberDirectory, NotificationStore, SettingsSource, models::Settings};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait MessageSender
where
	Self: Send + Sync,
{
	fn send<'a>(&'a self, phone: &'a str, text: &'a str) -> BoxFuture<'a, color_eyre::Result<()>>;
}

pub trait Clock
where
	Self: Send + Sync,
{
	fn now(&self) -> OffsetDateTime;
}

pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// A clock that only moves when told to.
pub struct FixedClock {
	now: Mutex<OffsetDateTime>,
}
impl FixedClock {
	pub fn new(now: OffsetDateTime) -> Self {
		Self { now: Mutex::new(now) }
	}

	pub fn set(&self, now: OffsetDateTime) {
		*self.now.lock().unwrap_or_else(|err| err.into_inner()) = now;
	}
}
impl Clock for FixedClock {
	fn now(&self) -> OffsetDateTime {
		*self.now.lock().unwrap_or_else(|err| err.into_inner())
	}
}

#[derive(Clone)]
pub struct Stores {
	pub members: Arc<dyn MemberDirectory>,
	pub settings: Arc<dyn SettingsSource>,
	pub notifications: Arc<dyn NotificationStore>,
}
impl Stores {
	/// One backend serving every store role.
	pub fn shared<T>(store: Arc<T>) -> Self
	where
		T: MemberDirectory + SettingsSource + NotificationStore + 'static,
	{
		Self { members: store.clone(), settings: store.clone(), notifications: store }
	}
}

pub struct BirthdayService {
	pub reminder: Reminder,
	pub dispatch: Dispatch,
	pub stores: Stores,
	pub sender: Arc<dyn MessageSender>,
	pub clock: Arc<dyn Clock>,
}
impl BirthdayService {
	pub fn new(
		reminder: Reminder,
		dispatch: Dispatch,
		stores: Stores,
		sender: Arc<dyn MessageSender>,
	) -> Self {
		Self { reminder, dispatch, stores, sender, clock: Arc::new(SystemClock) }
	}

	pub fn from_config(cfg: &Config, stores: Stores, sender: Arc<dyn MessageSender>) -> Self {
		Self::new(cfg.reminder.clone(), cfg.dispatch.clone(), stores, sender)
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// The stored settings row, or the configured defaults until one is stored.
	pub async fn current_settings(&self) -> Result<Settings> {
		match self.stores.settings.get_settings().await? {
			Some(settings) => Ok(settings),
			None => Ok(Settings::from_reminder(&self.reminder)?),
		}
	}
}

/// Delivers through the configured JSON webhook.
pub struct DefaultSender {
	webhook: WebhookSender,
}
impl DefaultSender {
	pub fn new(cfg: &Config) -> color_eyre::Result<Self> {
		Ok(Self { webhook: WebhookSender::new(cfg.sender.clone())? })
	}
}
impl MessageSender for DefaultSender {
	fn send<'a>(&'a self, phone: &'a str, text: &'a str) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			let receipt = self.webhook.send_text(phone, text).await?;

			tracing::debug!(
				provider_id = %self.webhook.provider_id(),
				message_id = ?receipt.message_id,
				"Message accepted by provider."
			);

			Ok(())
		})
	}
}
