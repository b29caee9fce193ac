use fx_chart_gateway::{AppState, backend::BackendClient, build_app, config::AppConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fx_chart_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    let backend = BackendClient::new(&config.api_url, config.backend_timeout)?;
    tracing::info!(
        api_url = %backend.base_url(),
        poll_interval_ms = config.poll.interval.as_millis() as u64,
        poll_timeout_ms = config.poll.timeout.as_millis() as u64,
        "Analysis backend configured"
    );

    let app = build_app(AppState::new(backend, config.poll), &config);

    // Run the server
    tracing::info!("Gateway running on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
