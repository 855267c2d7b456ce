use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = graphrag_api::Args::parse();

	graphrag_api::run(args).await
}
