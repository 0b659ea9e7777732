mod config;
mod error;
mod server;

use axum::serve;
use config::Config;
use error::{InjectError, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志，RUST_LOG优先于配置中的级别
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| InjectError::Internal(format!("Failed to set tracing subscriber: {}", e)))?;

    info!("Starting inject server...");
    info!(
        data_dir = %config.storage.data_dir.display(),
        files_dir = %config.storage.files_dir.display(),
        cache = %config.cache.cache_type,
        "Configuration loaded"
    );

    let app_state = server::init_app_state(&config).await?;
    info!("Application state initialized");

    let app = server::create_router(app_state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    // IP白名单需要对端地址
    serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
