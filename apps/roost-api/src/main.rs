use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = roost_api::Args::parse();

	roost_api::run(args).await
}
