//! Binary entry point for the control-plane server; see the crate root
//! docs (`lib.rs`) for the architecture overview.

use std::sync::{Arc, Mutex};

use clap::Parser;
use streamguard_core::crypto::CredentialCipher;
use streamguard_core::state::ControllerState;
use streamguard_core::store::memory::MemoryStore;
use streamguard_core::store::postgres::PostgresStore;
use streamguard_core::store::Store;
use streamguard_model::log_buffer::LogBuffer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamguard_server::app_state::AppState;
use streamguard_server::config::Config;
use streamguard_server::ms_client::MsClient;
use streamguard_server::reconciler;
use streamguard_server::routes;
use streamguard_server::supervisor::{Supervisor, SupervisorConfig};

/// Command line overrides for the control-plane server.
#[derive(Parser, Debug)]
#[command(name = "streamguard-server")]
#[command(about = "Reconciler, supervisor, and admin API for live-stream failover")]
struct Args {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(port) = args.port {
        config.server_port = port;
    }
    if let Some(host) = args.host {
        config.server_host = host;
    }
    let config = Arc::new(config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamguard_server=debug,streamguard_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("server configuration loaded");

    let cipher = CredentialCipher::from_hex_key(&config.encryption_key_hex)?;

    // A DATABASE_URL selects Postgres; its absence is only tolerated in
    // dev_mode, where an in-process MemoryStore stands in (no durability
    // across restarts, no multi-instance deployment to coordinate with).
    let store: Arc<dyn Store> = if let Some(database_url) = &config.database_url {
        info!("connecting to PostgreSQL");
        let pg = PostgresStore::connect(database_url, 10, cipher.clone()).await?;
        pg.migrate().await?;
        Arc::new(pg)
    } else if config.dev_mode {
        warn!("DATABASE_URL not set; running against an in-memory store (dev_mode only)");
        Arc::new(MemoryStore::new())
    } else {
        return Err(anyhow::anyhow!(
            "DATABASE_URL is required outside of dev_mode"
        ));
    };

    tokio::fs::create_dir_all(&config.media_root).await.ok();

    let supervisor = Arc::new(Supervisor::new(SupervisorConfig {
        loop_image: config.loop_image.clone(),
        relay_image: config.relay_image.clone(),
        ms_api_url: config.ms_api_url.clone(),
        media_path: config.media_root.clone(),
    }));

    let ms_client = MsClient::new(config.ms_api_url.clone(), config.ms_request_timeout)?;

    let state = AppState {
        store,
        controller: Arc::new(ControllerState::new()),
        log_buffer: Arc::new(Mutex::new(LogBuffer::default())),
        cipher,
        supervisor,
        ms_client,
        config: config.clone(),
        tick_stats: Arc::new(Mutex::new(None)),
    };

    let reconciler_state = state.clone();
    tokio::spawn(async move {
        reconciler::run(reconciler_state).await;
    });

    let app = routes::build(state.clone());

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

/// Waits for Ctrl+C (or SIGTERM) and kills every supervised child before
/// returning, so a restart never leaves orphaned `loop-*`/`relay-*`
/// processes behind (spec §5: "graceful shutdown kills all supervised
/// children").
async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, stopping supervised children");
    state.supervisor.shutdown_all().await;
}
