// Server module - exposes the scrape endpoint over HTTP
//
// This module is responsible for:
// 1. Routing GET /metrics to a fresh collection pass and encoding the
//    result in the Prometheus text exposition format
// 2. Serving a small landing page on GET /
//
// A failed provider fetch still answers 200 with zero samples; the
// monitoring system sees an empty scrape and tries again next interval.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::collector::Collector;

const LANDING_PAGE: &str = r#"<html>
<head><title>SendGrid Exporter</title></head>
<body>
<h1>SendGrid Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
</body>
</html>"#;

/// Builds the exporter router
pub fn router(collector: Arc<Collector>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/metrics", get(metrics))
        .with_state(collector)
}

/// Binds the listen address and serves scrapes until the process stops
pub async fn serve(listen_address: SocketAddr, collector: Arc<Collector>) -> std::io::Result<()> {
    let listener = TcpListener::bind(listen_address).await?;
    info!("Listening on http://{}/metrics", listen_address);

    axum::serve(listener, router(collector)).await
}

async fn index() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

/// Runs one collection pass and encodes the families it produced
async fn metrics(State(collector): State<Arc<Collector>>) -> Response {
    let families = collector.collect().await;

    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&families) {
        Ok(body) => (
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metric families: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
