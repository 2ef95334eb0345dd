use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::stats::{StatsRegister, StatsSnapshot};

/// State shared with the route handlers.
#[derive(Clone)]
pub struct Responder {
    pub endpoint: String,
    pub message: String,
    pub ping_interval: Duration,
    pub timezone: String,
    pub external_url: String,
    pub stats: Arc<StatsRegister>,
}

pub fn router(responder: Responder) -> Router
{
    let liveness_path = format!("/{}", responder.endpoint);
    Router::new()
        .route(&liveness_path, get(alive))
        .route("/keepalive/stats", get(stats))
        .with_state(responder)
}

/// Runs the accept loop on an already-bound listener until the shutdown
/// token fires. Binding is the caller's concern, so a bind failure can be
/// handled without tearing down the rest of the service.
pub async fn serve(listener: TcpListener, responder: Responder, shutdown: CancellationToken) -> Result<()>
{
    axum::serve(listener, router(responder))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

async fn alive(responder: State<Responder>) -> String
{
    debug!("received ping request");
    responder.message.clone()
}

async fn stats(responder: State<Responder>) -> Json<StatsSnapshot>
{
    let snapshot = responder.stats
        .snapshot(responder.ping_interval, &responder.timezone, &responder.external_url)
        .await;
    Json(snapshot)
}
