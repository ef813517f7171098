use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::error::HubError;
use crate::hub::handler::HubHandler;

/// Builds the hub's HTTP surface. Method checks and everything below
/// the transport live in the handler; the body limit is enforced here
/// so oversized requests are refused before being buffered.
pub fn router(handler: Arc<HubHandler>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/publish", any(publish))
        .route("/subscribe", any(subscribe))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(handler)
}

/// Serves the hub until the shutdown token fires.
pub async fn run(
    addr: &str,
    handler: Arc<HubHandler>,
    max_body_bytes: usize,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let app = router(handler, max_body_bytes);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Hub listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn publish(
    State(handler): State<Arc<HubHandler>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = header_str(&headers, &header::CONTENT_TYPE);
    let link_header = header_str(&headers, &header::LINK);

    match handler
        .handle_publish(&method, content_type, link_header, body)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

async fn subscribe(
    State(handler): State<Arc<HubHandler>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = header_str(&headers, &header::CONTENT_TYPE);

    match handler.handle_subscribe(&method, content_type, body).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Requested resource not found.").into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// User-visible failures are a plain-text message next to the status
/// code; there is no structured error body.
fn error_response(err: HubError) -> Response {
    let status = err.status();
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        warn!("HTTP {}: {}", status.as_u16(), err);
    }
    (status, err.to_string()).into_response()
}
