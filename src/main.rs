use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let cfg = flowgate::config::Config::from_env();
    info!(
        target: "flowgate",
        "flowgate starting: RUST_LOG='{}', http_port={}, upstream='{}', principals='{}', token_ttl_secs={}",
        rust_log, cfg.http_port, cfg.upstream_url, cfg.principals_path, cfg.token_ttl_secs
    );

    flowgate::server::run(cfg).await
}
