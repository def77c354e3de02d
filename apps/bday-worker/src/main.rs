use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = bday_worker::Args::parse();

	bday_worker::run(args).await
}
