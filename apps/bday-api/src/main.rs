use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = bday_api::Args::parse();

	bday_api::run(args).await
}
