use std::sync::Arc;

use bday_service::{BirthdayService, DefaultSender, Stores};
use bday_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<BirthdayService>,
}
impl AppState {
	pub async fn new(config: &bday_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let sender = DefaultSender::new(config)?;
		let service =
			BirthdayService::from_config(config, Stores::shared(Arc::new(db)), Arc::new(sender));

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: BirthdayService) -> Self {
		Self { service: Arc::new(service) }
	}
}
