use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = dun_api::Args::parse();

	dun_api::run(args).await
}
