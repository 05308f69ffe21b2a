use axum::{
    Json,
    body::Bytes,
    extract::{Extension, State},
    response::IntoResponse,
};
use tracing::info;

use crate::infra::http::error::ApiError;

use super::AdminState;
use super::actor::Actor;
use super::models::{CachePurgeRequest, CachePurgeResponse};

/// Evict the named keys from the in-process tier, or clear it when no keys are given.
/// The edge tier is untouched; it is reconciled by writes.
pub(super) async fn purge_cache(
    State(state): State<AdminState>,
    Extension(actor): Extension<Actor>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CachePurgeRequest::default()
    } else {
        serde_json::from_slice::<CachePurgeRequest>(&body)
            .map_err(|err| ApiError::bad_request("Invalid purge request", Some(err.to_string())))?
    };

    let keys = request.keys.filter(|keys| !keys.is_empty());
    let scope = if keys.is_some() { "keys" } else { "all" };
    let purged = state.resolver.purge_memory(keys.as_deref());

    info!(
        target = "toggleboard::http::admin::cache",
        actor = %actor.id(),
        scope,
        purged,
        "in-process cache purged"
    );

    Ok(Json(CachePurgeResponse { purged, scope }))
}
