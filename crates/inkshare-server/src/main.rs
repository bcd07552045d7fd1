//! InkShare WebSocket Sync Server
//!
//! Hosts a single shared canvas. Every connection gets the full operation log
//! on join, live relays of other participants' strokes and cursors, and a
//! fresh copy of the log whenever anyone undoes or redoes.
//!
//! ## Protocol
//!
//! JSON text frames tagged by `type`:
//! ```json
//! { "type": "draw_point", "x": 10, "y": 20, "color": "#000000", "width": 4, "tool": "brush" }
//! { "type": "end_stroke", "stroke": [ ... ] }
//! { "type": "remote_undo", "operations": [ ... ] }
//! ```

mod config;
mod hub;
mod routes;
mod ws;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::config::ServerConfig;
use crate::hub::HubHandle;
use crate::routes::{AppState, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "inkshare_server=info,inkshare_core=info,tower_http=info".into()
            }),
        )
        .init();

    let config = ServerConfig::parse();

    let state = AppState {
        hub: HubHandle::spawn(config.hub_capacity),
        outbox_capacity: config.outbox_capacity,
    };
    let app = router(state, config.static_dir.as_deref());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("InkShare sync server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);
    if let Some(dir) = &config.static_dir {
        info!("Serving client assets from {}", dir.display());
    }

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
