//! HTTP surface: `POST /gemini/chat`.

use crate::config::{Config, ServerConfig};
use crate::error::{Error, MISSING_MESSAGES, Result};
use crate::relay::{ChatRelay, ChatRequest, ModelReply};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, Method, header};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

async fn chat(
    State(relay): State<Arc<ChatRelay>>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<ModelReply>> {
    let Json(body) = body.map_err(|rejection| {
        debug!("rejected chat body: {rejection}");
        Error::validation(MISSING_MESSAGES)
    })?;
    let request = ChatRequest::from_json(&body)?;
    let reply = relay.handle(&request).await?;
    Ok(Json(reply))
}

/// Only POST, only from the configured origins.
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

pub fn router(relay: Arc<ChatRelay>, config: &ServerConfig) -> Router {
    let gemini = Router::new().route("/chat", post(chat));

    Router::new()
        .nest("/gemini", gemini)
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .with_state(relay)
}

pub async fn serve(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    let relay = Arc::new(ChatRelay::from_config(&config)?);
    if config.gemini.resolve_api_key().is_none() {
        warn!(
            env = %config.gemini.api_key_env,
            "no Gemini API key set; forwarded requests will fail until one is provided"
        );
    }

    let app = router(relay, &config.server);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local = listener.local_addr()?;

    info!("Server running at http://localhost:{}", local.port());
    info!(
        model = %config.gemini.model,
        "Gemini chat endpoint: http://localhost:{}/gemini/chat",
        local.port()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
