use std::env;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use shuttle_sim_server::config::SimConfig;
use shuttle_sim_server::routes::{AppState, create_router};
use shuttle_sim_server::simulator::Simulator;
use shuttle_sim_server::source::FileOrHttpFetcher;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = SimConfig::from_env();
    let simulator = Simulator::new(config, Arc::new(FileOrHttpFetcher::new()));
    let state = AppState {
        simulator,
        weather_url: env::var("SIMULATOR_WEATHER_URL").ok(),
        http: reqwest::Client::new(),
    };

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "control surface listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
