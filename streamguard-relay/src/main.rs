mod config;
mod control;
mod distributor;
mod error;
mod mux;
mod pump;
mod state;
mod transcoder;

use std::net::SocketAddr;

use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use state::RelayState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    info!(slug = %config.channel_slug, port = config.port, "starting relay");

    let state = RelayState::start(config.clone()).await?;
    let app = control::router(state.clone()).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown_state = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("relay received shutdown signal");
            shutdown_state.shutdown().await;
        })
        .await?;

    Ok(())
}
