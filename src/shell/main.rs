use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, fmt};

use eventstore::shell::config::Config;
use eventstore::shell::http::router;
use eventstore::shell::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::from_env()?;
    let state = AppState::from_config(&config)?;
    tracing::info!(
        backend = ?config.backend,
        data_dir = %config.data_dir.display(),
        timeout_ms = config.request_timeout.as_millis() as u64,
        "event store configured"
    );

    let app = router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!("Event store endpoint: http://{}/streams", config.addr);
    axum::serve(listener, app).await?;
    Ok(())
}
