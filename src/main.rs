use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use adminboard::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let cfg = Config::from_env();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "adminboard mock API starting: RUST_LOG='{}', http_port={}, latency_ms={}",
        rust_log, cfg.http_port, cfg.latency.as_millis()
    );

    adminboard::server::run(&cfg).await
}
