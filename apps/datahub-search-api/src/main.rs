use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = datahub_search_api::Args::parse();

	datahub_search_api::run(args).await
}
