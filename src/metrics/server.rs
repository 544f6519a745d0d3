//! HTTP endpoint for Prometheus scrapes.

use std::net::SocketAddr;

use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{TextEncoder, TEXT_FORMAT};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Routes for the configured metrics path, plus a landing page on `/`.
pub fn router(metrics_path: &str) -> Router {
    let router = Router::new().route(metrics_path, get(metrics_handler));
    if metrics_path == "/" {
        return router;
    }

    let landing = landing_page(metrics_path);
    router.route(
        "/",
        get(move || {
            let body = landing.clone();
            async move { Html(body) }
        }),
    )
}

fn landing_page(metrics_path: &str) -> String {
    format!(
        "<html><head><title>GCP SSL Exporter</title></head><body>\
         <h1>GCP SSL Exporter</h1><p><a href=\"{}\">Metrics</a></p></body></html>",
        metrics_path
    )
}

// Collection does blocking network I/O, so the registry is gathered off the
// async workers.
async fn metrics_handler() -> Response {
    match tokio::task::spawn_blocking(gather_text).await {
        Ok(Ok(body)) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Ok(Err(e)) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            error!("Metrics collection task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// The default registry in the Prometheus text format.
pub fn gather_text() -> prometheus::Result<String> {
    TextEncoder::new().encode_to_string(&prometheus::gather())
}

/// Serves scrapes on `addr` until Ctrl-C.
pub async fn serve(addr: SocketAddr, metrics_path: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Beginning to serve {} on {}", metrics_path, addr);

    axum::serve(listener, router(metrics_path))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
    }
}
