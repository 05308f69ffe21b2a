use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

/// Header carrying the authenticated author UUID, set by the fronting auth proxy.
pub const ACTOR_HEADER: &str = "x-author-id";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Log failed responses with the diagnostic chain handlers attached as an [`ErrorReport`].
///
/// 5xx logs at error, 4xx other than 404 at warn. Successful responses and 404s are
/// only visible at debug.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    const TARGET: &str = "toggleboard::http::response";

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let actor = request
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_default();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let latency_ms = started.elapsed().as_millis() as u64;

    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        debug!(
            target = TARGET,
            status = status.as_u16(),
            method = %method,
            path = %path,
            latency_ms,
            request_id = %request_id,
            "request completed"
        );
        return response;
    };

    let detail = report
        .messages
        .first()
        .map(String::as_str)
        .unwrap_or("no diagnostic available");

    if status.is_server_error() {
        error!(
            target = TARGET,
            status = status.as_u16(),
            method = %method,
            path = %path,
            latency_ms,
            origin = report.source,
            detail,
            chain = ?report.messages,
            request_id = %request_id,
            actor = %actor,
            "request failed"
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            target = TARGET,
            method = %method,
            path = %path,
            origin = report.source,
            request_id = %request_id,
            "not found"
        );
    } else {
        warn!(
            target = TARGET,
            status = status.as_u16(),
            method = %method,
            path = %path,
            latency_ms,
            origin = report.source,
            detail,
            chain = ?report.messages,
            request_id = %request_id,
            actor = %actor,
            "request rejected"
        );
    }

    response
}
