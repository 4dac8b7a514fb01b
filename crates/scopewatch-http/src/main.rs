//! scopewatch demo service
//!
//! - GET /v1/orders/:id: nested, concurrent scopes per request
//! - GET /health: skipped via `ignore_path_prefix`
//! - Collected report logged per request at `collect_level`
//!
//! Config path: `$SCOPEWATCH_CONFIG`, default `scopewatch.yaml`.

use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};

use scopewatch_core::error::ScopeError;
use scopewatch_http::{app_state, config, router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = config::config_path();
    let cfg = config::load_from_file(&path)?;
    tracing::debug!(path = %path.display(), "config loaded");
    let listen: SocketAddr = cfg
        .listen
        .parse()
        .map_err(|e| ScopeError::InvalidConfig(format!("listen must be a valid SocketAddr: {e}")))?;

    let state = app_state::AppState::new(&cfg)?;
    let app = router::build_router(state);

    tracing::info!(%listen, "scopewatch demo starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;

    axum::serve(listener, app).await?;
    Ok(())
}
