//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.whatsgraph/config.json`);
//! credentials and runtime settings can also come from the environment,
//! which always wins over the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Twilio credentials for webhook validation and media download.
    #[serde(default)]
    pub twilio: TwilioConfig,

    /// Hosted graph runtime settings (URL, assistant, graph config).
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Gateway bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// HTTP port for the webhook endpoint (default 8081).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0" — the webhook must be reachable by the
    /// provider; authenticity is enforced by the request signature).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    8081
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Twilio account credentials. Overridden by TWILIO_ACCOUNT_SID and
/// TWILIO_AUTH_TOKEN env when set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
}

/// Hosted graph runtime settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Base URL of the runtime deployment. Overridden by LANGGRAPH_URL env.
    pub url: Option<String>,
    /// Assistant (graph) id to invoke. Overridden by LANGGRAPH_ASSISTANT_ID env.
    pub assistant_id: Option<String>,
    /// Configuration JSON forwarded with every run. Overridden by CONFIG env
    /// (a JSON string; malformed values fail startup).
    pub config: Option<serde_json::Value>,
}

/// Both Twilio credentials, once presence has been checked.
#[derive(Debug, Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn env_or(var: &str, fallback: Option<&String>) -> Option<String> {
    std::env::var(var)
        .ok()
        .and_then(non_empty)
        .or_else(|| fallback.cloned().and_then(non_empty))
}

/// Resolve the Twilio account SID: env TWILIO_ACCOUNT_SID overrides config.
pub fn resolve_twilio_account_sid(config: &Config) -> Option<String> {
    env_or("TWILIO_ACCOUNT_SID", config.twilio.account_sid.as_ref())
}

/// Resolve the Twilio auth token: env TWILIO_AUTH_TOKEN overrides config.
pub fn resolve_twilio_auth_token(config: &Config) -> Option<String> {
    env_or("TWILIO_AUTH_TOKEN", config.twilio.auth_token.as_ref())
}

/// Resolve the runtime base URL: env LANGGRAPH_URL overrides config.
pub fn resolve_runtime_url(config: &Config) -> Option<String> {
    env_or("LANGGRAPH_URL", config.runtime.url.as_ref())
}

/// Resolve the assistant id: env LANGGRAPH_ASSISTANT_ID overrides config;
/// defaults to "agent".
pub fn resolve_assistant_id(config: &Config) -> String {
    env_or("LANGGRAPH_ASSISTANT_ID", config.runtime.assistant_id.as_ref())
        .unwrap_or_else(|| "agent".to_string())
}

/// Resolve the graph config JSON forwarded with every run. The CONFIG env var
/// (a JSON string) overrides the config file; a malformed value is an error,
/// not a silent empty config.
pub fn resolve_graph_config(config: &Config) -> Result<serde_json::Value> {
    if let Some(raw) = std::env::var("CONFIG").ok().and_then(non_empty) {
        return serde_json::from_str(&raw).context("parsing CONFIG env var as JSON");
    }
    Ok(config
        .runtime
        .config
        .clone()
        .unwrap_or_else(|| serde_json::json!({})))
}

/// Both Twilio credentials, or a startup error naming what is missing.
pub fn require_twilio_credentials(config: &Config) -> Result<TwilioCredentials> {
    let account_sid = resolve_twilio_account_sid(config);
    let auth_token = resolve_twilio_auth_token(config);
    match (account_sid, auth_token) {
        (Some(account_sid), Some(auth_token)) => Ok(TwilioCredentials {
            account_sid,
            auth_token,
        }),
        _ => anyhow::bail!(
            "Twilio credentials are not configured (set TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN, or twilio.accountSid and twilio.authToken in the config file)"
        ),
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("WHATSGRAPH_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".whatsgraph").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or WHATSGRAPH_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
