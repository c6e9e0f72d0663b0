// src/server.rs

//! Keep-alive endpoint for external uptime monitors.
//!
//! A trivial always-200 responder on its own task. It shares no state with
//! the scheduler; it exists only so hosting platforms and uptime probes see
//! the process as alive.

use axum::{Router, routing::get};

use crate::config::ServerConfig;
use crate::error::Result;

async fn alive() -> &'static str {
    "alive"
}

/// Serve the liveness endpoint until the process exits.
pub async fn run_liveness(config: &ServerConfig) -> Result<()> {
    let router = Router::new().route("/", get(alive));
    let addr = format!("{}:{}", config.bind, config.port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Liveness endpoint listening on {}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn alive_handler_returns_body() {
        assert_eq!(alive().await, "alive");
    }
}
