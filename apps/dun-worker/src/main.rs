use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = dun_worker::Args::parse();

	dun_worker::run(args).await
}
