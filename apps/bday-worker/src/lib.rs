pub mod worker;

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use bday_service::{BirthdayService, DefaultSender, Stores};
use bday_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = bday_cli::VERSION,
	rename_all = "kebab",
	styles = bday_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = bday_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let sender = DefaultSender::new(&config)?;
	let service =
		BirthdayService::from_config(&config, Stores::shared(Arc::new(db)), Arc::new(sender));
	let shutdown = CancellationToken::new();

	tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

	let state = worker::WorkerState {
		service: Arc::new(service),
		run_on_startup: config.worker.run_on_startup,
	};

	worker::run_worker(state, shutdown).await
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
	match tokio::signal::ctrl_c().await {
		Ok(()) => {
			tracing::info!("Shutdown signal received.");

			shutdown.cancel();
		},
		Err(err) => tracing::error!(error = %err, "Failed to listen for the shutdown signal."),
	}
}
