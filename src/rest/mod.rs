// rest/mod.rs — HTTP surface of the gateway.
//
// Axum server bound to the configured address (loopback by default).
//
// Endpoints:
//   GET  /api/v1/health
//   *    /api/proxy/{...path}   (GET/POST/PATCH/DELETE/PUT — backend relay)

pub mod routes;

use anyhow::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("gateway listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let proxy = get(routes::proxy::relay)
        .post(routes::proxy::relay)
        .patch(routes::proxy::relay)
        .delete(routes::proxy::relay)
        .put(routes::proxy::relay);

    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(routes::health::health))
        // Backend relay — session cookies ride along, so the browser can
        // call the backend without reading its own HttpOnly cookie.
        .route("/api/proxy/{*path}", proxy)
        // The frontend dev server runs on a different origin.
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
