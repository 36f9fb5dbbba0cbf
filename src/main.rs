use airqino_service::config::{self, DEFAULT_CONFIG_PATH};
use airqino_service::logging;
use airqino_service::server::{self, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = config::load_config(&config_path)?;
    logging::init_logging(&config.log_level, config.log_file.as_deref())?;

    let state = AppState::from_config(&config)?;
    let app = server::create_router(state);

    let addr = config.socket_addr()?;
    info!(
        upstream = %config.upstream_base_url,
        timeout_secs = config.request_timeout_secs,
        "Server listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    info!("shut down");
    Ok(())
}
