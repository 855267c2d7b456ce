pub mod routes;
pub mod state;

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;
use color_eyre::eyre;
use tokio::{net::TcpListener, task::JoinHandle, time::MissedTickBehavior};
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(
	version = graphrag_cli::VERSION,
	rename_all = "kebab",
	styles = graphrag_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = graphrag_config::load(&args.config)?;

	init_tracing(&config)?;

	let http_addr: SocketAddr = config.service.http_bind.parse()?;
	let admin_addr: SocketAddr = config.service.admin_bind.parse()?;

	if config.security.bind_localhost_only && !http_addr.ip().is_loopback() {
		return Err(eyre::eyre!(
			"http_bind must be a loopback address when bind_localhost_only is true."
		));
	}
	if !admin_addr.ip().is_loopback() {
		return Err(eyre::eyre!("admin_bind must be a loopback address."));
	}

	let refresh_every = Duration::from_secs(config.authority.refresh_interval_secs);
	let state = AppState::connect(config).await?;
	let refresher = spawn_authority_refresh(state.clone(), refresh_every);
	let app = routes::router(state.clone());
	let admin_app = routes::admin_router(state);
	let http_listener = TcpListener::bind(http_addr).await?;

	tracing::info!(%http_addr, "HTTP server listening.");

	let http_server = axum::serve(http_listener, app);
	let admin_listener = TcpListener::bind(admin_addr).await?;

	tracing::info!(%admin_addr, "Admin server listening.");

	let admin_server = axum::serve(admin_listener, admin_app);
	let served = tokio::try_join!(http_server, admin_server);

	refresher.abort();
	served?;

	Ok(())
}

/// Reloads authority weights on a fixed interval. The first tick is skipped because the
/// service loads the tables once on connect.
pub fn spawn_authority_refresh(state: AppState, every: Duration) -> JoinHandle<()> {
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(every);

		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		ticker.tick().await;

		loop {
			ticker.tick().await;

			match state.service.refresh_authority().await {
				Ok(refresh) => tracing::debug!(
					sources = refresh.sources,
					document_types = refresh.document_types,
					"Authority weights refreshed."
				),
				Err(err) => tracing::warn!(
					error = %err,
					"Authority refresh failed. Keeping the previous table."
				),
			}
		}
	})
}

fn init_tracing(config: &graphrag_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	Ok(())
}
