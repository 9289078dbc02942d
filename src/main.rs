use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tradewatch::config::Config;
use tradewatch::services::Database;
use tradewatch::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradewatch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!("Starting Tradewatch server on {}:{}", config.host, config.port);

    let database = Database::open(&config.database_path)?;
    info!("Database ready at {}", config.database_path);

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, database);
    state.start_background_tasks();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Tradewatch server listening on {}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
