use clap::Parser;

use image_audit_api::api::{router, AppState};
use image_audit_api::config::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::parse();
    let bind = config.bind;

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(bind).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind {}: {}", bind, e);
            std::process::exit(1);
        }
    };
    tracing::info!("listening on {}", bind);

    if let Err(e) = axum::serve(listener, router(state)).await {
        tracing::error!("server error: {}", e);
        std::process::exit(1);
    }
}
