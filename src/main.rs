//! Beacon gate
//!
//! Front door of a privacy-focused analytics service:
//! - Dual-key (client address and site key) rate limiting of beacons
//! - Collect-all validation and sanitization of beacon payloads
//! - Short-lived caching of dashboard reports and public widgets

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tokio::signal;
use tracing::info;

use api::{router, AdminAccess, AppState, MemoryStore, ProxyTrust};
use gate_core::{RedirectPolicy, Role};
use rate_limiter::RateLimitConfig;
use telemetry::{health, init_tracing_from_env};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
struct Config {
    host: String,
    port: u16,

    /// Thresholds have no defaults; a missing value aborts startup
    rate_limit: RateLimitConfig,

    /// Origins allowed on administrative routes; empty allows all
    #[serde(default)]
    allowed_origins: Vec<String>,

    /// `token:role` entries for administrative routes. Tokens live in
    /// values because the loader lowercases map keys.
    #[serde(default)]
    admin_tokens: Vec<String>,

    #[serde(default)]
    redirect: RedirectPolicy,

    /// Whether forwarding headers may name the client address
    #[serde(default)]
    proxy: ProxyTrust,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting beacon gate v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    config
        .rate_limit
        .check()
        .context("Invalid rate limit configuration")?;
    let admin_tokens = parse_admin_tokens(&config.admin_tokens)?;

    info!(
        max_tokens_per_ip = config.rate_limit.max_tokens_per_ip,
        max_tokens_per_api_key = config.rate_limit.max_tokens_per_api_key,
        allowed_origins = config.allowed_origins.len(),
        admin_tokens = admin_tokens.len(),
        trust_forwarded_headers = config.proxy.trust_forwarded_headers,
        "Loaded configuration"
    );

    let store = Arc::new(MemoryStore::new());
    health().event_sink.set_healthy();
    health().report_source.set_healthy();

    let state = AppState::new(store.clone(), store, config.rate_limit.clone())
        .context("Failed to build application state")?
        .with_access(AdminAccess::new(
            config.allowed_origins.clone(),
            admin_tokens,
        ))
        .with_redirect(config.redirect.clone())
        .with_proxy_trust(config.proxy.clone());

    let housekeeping = state.start_housekeeping();

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Connect info lets the limiter fall back to the socket address.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Shutting down...");
    housekeeping.abort();

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from defaults, `config/default.toml` and `BEACON_*`
/// environment variables, in that order.
fn load_config() -> Result<Config> {
    read_config(
        config::File::with_name("config/default")
            .required(false)
            .format(config::FileFormat::Toml),
    )
}

fn read_config<F>(file: F) -> Result<Config>
where
    F: config::Source + Send + Sync + 'static,
{
    let config = config::Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("rate_limit.idle_timeout_secs", 300)?
        .set_default("rate_limit.max_ips", 10_000)?
        .set_default("rate_limit.max_api_keys", 1_000)?
        .add_source(file)
        // e.g. BEACON_PORT, BEACON_RATE_LIMIT__MAX_TOKENS_PER_IP
        .add_source(
            config::Environment::with_prefix("BEACON")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("allowed_origins")
                .with_list_parse_key("admin_tokens")
                .with_list_parse_key("redirect.allowed")
                .with_list_parse_key("proxy.trusted_proxies")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration (rate_limit thresholds are required)")
}

/// Build the bearer token table from `token:role` entries.
///
/// The role follows the last `:`. Errors never echo the token.
fn parse_admin_tokens(entries: &[String]) -> Result<HashMap<String, Role>> {
    let mut tokens = HashMap::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let Some((token, role)) = entry.trim().rsplit_once(':') else {
            bail!("admin_tokens[{}] must have the form token:role", index);
        };
        if token.is_empty() {
            bail!("admin_tokens[{}] has an empty token", index);
        }
        let role: Role = role
            .parse()
            .with_context(|| format!("admin_tokens[{}] has an unknown role", index))?;
        tokens.insert(token.to_string(), role);
    }
    Ok(tokens)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
