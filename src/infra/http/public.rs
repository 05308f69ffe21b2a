use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH, LOCATION},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::error;
use url::Url;

use crate::{
    application::{
        evaluation::EvaluationService,
        repos::TogglesRepo,
        resolver::{Resolution, Resolver},
    },
    cache::{CacheConfig, JSON_CONTENT_TYPE},
    domain::{keys::validate_key, types::ValueType},
};

use super::{
    db_health_response,
    error::PublicError,
    middleware::{log_responses, set_request_context},
};

pub const TIER_HEADER: &str = "x-toggle-tier";
pub const CACHE_HEADER: &str = "x-toggle-cache";

#[derive(Clone)]
pub struct PublicState {
    pub resolver: Arc<Resolver>,
    pub evaluation: Arc<EvaluationService>,
    pub toggles: Arc<dyn TogglesRepo>,
    pub cache: CacheConfig,
    pub cdn: Option<CdnOrigin>,
}

/// Public location of edge objects behind the CDN.
#[derive(Debug, Clone)]
pub struct CdnOrigin {
    base: Url,
    namespace: String,
}

impl CdnOrigin {
    pub fn new(base: Url, namespace: impl Into<String>) -> Self {
        Self {
            base,
            namespace: namespace.into().trim_matches('/').to_string(),
        }
    }

    pub fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{key}.json",
            self.base.as_str().trim_end_matches('/'),
            self.namespace
        )
    }
}

pub fn build_public_router(state: PublicState) -> Router {
    Router::new()
        .route("/toggles", get(list_toggles))
        .route("/toggles/{key}", get(get_toggle))
        .route("/toggles/{key}/evaluate", get(evaluate_toggle))
        .route("/cdn/toggles/{key}", get(cdn_redirect))
        .route("/_health/db", get(public_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn get_toggle(
    State(state): State<PublicState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Response {
    const SOURCE: &str = "infra::http::public::get_toggle";

    match state.resolver.resolve(&key).await {
        Ok(resolution) => toggle_response(&state.cache, &resolution, &headers),
        Err(err) => {
            error!(target = SOURCE, key = %key, error = %err, "toggle resolution failed");
            PublicError::unavailable(SOURCE, &err).into_response()
        }
    }
}

fn toggle_response(cache: &CacheConfig, resolution: &Resolution, headers: &HeaderMap) -> Response {
    let body = match serde_json::to_vec(&resolution.view) {
        Ok(body) => body,
        Err(err) => {
            return PublicError::unavailable("infra::http::public::toggle_response", &err)
                .into_response();
        }
    };
    let etag = entity_tag(&body);
    let status = if resolution.view.is_enabled() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };

    let not_modified = status == StatusCode::OK
        && headers
            .get(IF_NONE_MATCH)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|candidate| candidate.split(',').any(|tag| tag.trim() == etag));

    let mut response = if not_modified {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        response
    };

    let response_headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&cache.cache_control()) {
        response_headers.insert(CACHE_CONTROL, value);
    }
    if let Ok(value) = HeaderValue::from_str(&etag) {
        response_headers.insert(ETAG, value);
    }
    response_headers.insert(
        TIER_HEADER,
        HeaderValue::from_static(resolution.tier.as_str()),
    );
    if let Some(status) = resolution.tier.cache_status() {
        response_headers.insert(CACHE_HEADER, HeaderValue::from_static(status));
    }
    response
}

fn entity_tag(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("\"{}\"", hex::encode(hasher.finalize()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToggleSummary {
    key: String,
    name: String,
    #[serde(rename = "type")]
    value_type: ValueType,
    is_active: bool,
}

#[derive(Debug, Serialize)]
struct ToggleListing {
    success: bool,
    count: usize,
    toggles: Vec<ToggleSummary>,
}

async fn list_toggles(State(state): State<PublicState>) -> Response {
    const SOURCE: &str = "infra::http::public::list_toggles";

    match state.toggles.list_active().await {
        Ok(records) => {
            let toggles: Vec<ToggleSummary> = records
                .into_iter()
                .map(|record| ToggleSummary {
                    key: record.key,
                    name: record.name,
                    value_type: record.value_type,
                    is_active: record.is_active,
                })
                .collect();
            Json(ToggleListing {
                success: true,
                count: toggles.len(),
                toggles,
            })
            .into_response()
        }
        Err(err) => {
            error!(target = SOURCE, error = %err, "failed to list toggles");
            PublicError::unavailable(SOURCE, &err).into_response()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EvaluateQuery {
    identity: Option<String>,
}

async fn evaluate_toggle(
    State(state): State<PublicState>,
    Path(key): Path<String>,
    Query(query): Query<EvaluateQuery>,
) -> Response {
    const SOURCE: &str = "infra::http::public::evaluate_toggle";

    let Some(identity) = query
        .identity
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    else {
        return PublicError::bad_request(SOURCE, "identity query parameter is required")
            .into_response();
    };

    match state.evaluation.evaluate(&key, &identity).await {
        Ok(evaluation) => {
            let mut response = Json(&evaluation).into_response();
            if let Some(tier) = evaluation.tier {
                response
                    .headers_mut()
                    .insert(TIER_HEADER, HeaderValue::from_static(tier.as_str()));
            }
            response
        }
        Err(err) => {
            error!(target = SOURCE, key = %key, error = %err, "toggle evaluation failed");
            PublicError::unavailable(SOURCE, &err).into_response()
        }
    }
}

async fn cdn_redirect(State(state): State<PublicState>, Path(key): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::cdn_redirect";

    let Some(origin) = state.cdn.as_ref() else {
        return PublicError::not_found(SOURCE, "CDN origin is not configured").into_response();
    };
    if validate_key(&key).is_err() {
        return PublicError::not_found(SOURCE, "Toggle not found").into_response();
    }

    match HeaderValue::from_str(&origin.object_url(&key)) {
        Ok(location) => (StatusCode::FOUND, [(LOCATION, location)]).into_response(),
        Err(_) => PublicError::not_found(SOURCE, "Toggle not found").into_response(),
    }
}

async fn public_health(State(state): State<PublicState>) -> Response {
    db_health_response(state.toggles.health_check().await)
}
