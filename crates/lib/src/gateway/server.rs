//! Gateway HTTP server: webhook endpoint, health probe, graceful shutdown.

use crate::agent::Agent;
use crate::channels::{
    render_reply, ChannelError, MediaFetcher, TwilioWhatsAppChannel, WhatsAppChannel,
    FALLBACK_REPLY,
};
use crate::config::{self, Config};
use crate::runtime::LangGraphClient;
use crate::signature::RequestValidator;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Route the provider posts message webhooks to.
pub const WEBHOOK_PATH: &str = "/whatsapp";

/// Shared state for the gateway (config, channel, signature validator).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub channel: Arc<dyn WhatsAppChannel>,
    pub validator: Arc<RequestValidator>,
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Fails fast when provider credentials are missing or the graph config JSON
/// is malformed. Blocks until shutdown (Ctrl+C or SIGTERM).
pub async fn run_gateway(config: Config) -> Result<()> {
    let credentials = config::require_twilio_credentials(&config)?;
    let graph_config = config::resolve_graph_config(&config)?;

    let client = LangGraphClient::new(config::resolve_runtime_url(&config));
    log::info!("agent runtime at {}", client.base_url());
    let agent = Arc::new(Agent::new(
        client,
        config::resolve_assistant_id(&config),
        graph_config,
    ));
    let media = MediaFetcher::new(
        credentials.account_sid.clone(),
        credentials.auth_token.clone(),
    );
    let channel: Arc<dyn WhatsAppChannel> = Arc::new(TwilioWhatsAppChannel::new(agent, media));
    let validator = Arc::new(RequestValidator::new(credentials.auth_token));

    let state = GatewayState {
        config: Arc::new(config.clone()),
        channel,
        validator,
    };

    let app = Router::new()
        .route("/", get(health_http))
        .route(WEBHOOK_PATH, post(whatsapp_webhook))
        .with_state(state);

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "channel": "whatsapp",
        "port": state.config.gateway.port,
    }))
}

/// Reconstruct the public URL the provider signed. Behind a proxy the
/// forwarded headers carry the external scheme and host.
fn signed_url(headers: &HeaderMap, uri: &Uri) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    format!("{}://{}{}", proto, host, uri.path())
}

fn xml_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

/// POST /whatsapp — verifies the provider signature, then hands the form to
/// the channel. Downstream failures still answer the sender with a fallback
/// reply; only client errors surface as error statuses.
async fn whatsapp_webhook(
    State(state): State<GatewayState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let form: Vec<(String, String)> = match serde_urlencoded::from_bytes(&body) {
        Ok(form) => form,
        Err(_) => return (StatusCode::BAD_REQUEST, "invalid form body").into_response(),
    };

    let signature = headers
        .get("X-Twilio-Signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let url = signed_url(&headers, &uri);
    if !state.validator.validate(&url, &form, signature) {
        log::warn!("invalid webhook signature for {}", url);
        return (StatusCode::UNAUTHORIZED, "invalid signature").into_response();
    }

    match state.channel.handle_message(&form).await {
        Ok(xml) => xml_response(StatusCode::OK, xml),
        Err(ChannelError::MissingSender) => {
            (StatusCode::BAD_REQUEST, "missing 'From' in request form").into_response()
        }
        Err(e) => {
            log::error!("webhook handling failed: {}", e);
            xml_response(StatusCode::OK, render_reply(FALLBACK_REPLY))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_url_prefers_forwarded_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "127.0.0.1:8081".parse().expect("host"));
        let uri: Uri = "/whatsapp".parse().expect("uri");
        assert_eq!(signed_url(&headers, &uri), "http://127.0.0.1:8081/whatsapp");

        headers.insert("x-forwarded-proto", "https".parse().expect("proto"));
        headers.insert("x-forwarded-host", "bot.example.com".parse().expect("fwd host"));
        assert_eq!(
            signed_url(&headers, &uri),
            "https://bot.example.com/whatsapp"
        );
    }
}
