mod config;
mod live;
mod routes;
mod state;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use config::{generate_config_template, Config};
use live::clock::SystemClock;
use live::feed::{LiveFeed, LiveTimeouts};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "neurogrid_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "neurogrid_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!(
        "NeuroGrid telemetry server v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    // Build the live feed: the single authoritative owner of session state
    let live = Arc::new(LiveFeed::new(
        Arc::new(SystemClock),
        LiveTimeouts::from_config(&config),
    ));

    // Spawn the stale-session reaper
    live::reaper::spawn_reaper(live.clone());

    // Build application state and router
    let app_state = state::AppState { live };
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
