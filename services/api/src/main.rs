mod config;
mod routes;

use anyhow::Context;
use config::Config;
use globo_providers::OpenAiChat;
use routes::AppState;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load relay configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let openai_config = globo_providers::Config::builder()
        .with_base_url(&config.openai_base_url)
        .with_api_key(&config.openai_api_key)
        .with_chat_model(&config.chat_model)
        .with_vision_model(&config.vision_model)
        .build();
    let state = AppState {
        chat: Arc::new(OpenAiChat::new(openai_config)),
    };

    // Browser clients call the relay from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state).layer(cors);

    info!("Starting relay, listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Ctrl-C received, shutting down.");
        })
        .await?;

    Ok(())
}
