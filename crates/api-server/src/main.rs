//! API Server binary entrypoint.

use api_server::{ApiServer, AppState, ServerConfig};
use relay_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const DEFAULT_FILTER: &str = "api_server=debug,relay_engine=debug,relay_core=info,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Relay configuration (relayer.toml + RELAYER_* env)
    let relay_config = Config::load()?;

    // Create server config from environment
    let config = ServerConfig::from_env();

    let state = AppState::from_config(&relay_config, config.min_relayer_balance).await?;

    // Create and run server
    ApiServer::new(config, state).run().await?;

    Ok(())
}
