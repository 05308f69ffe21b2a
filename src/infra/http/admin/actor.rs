use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::infra::http::error::ApiError;
use crate::infra::http::middleware::ACTOR_HEADER;

/// Author performing an admin request, as asserted by the auth proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub Uuid);

impl Actor {
    pub fn id(self) -> Uuid {
        self.0
    }
}

pub async fn require_actor(mut request: Request<Body>, next: Next) -> Response {
    let actor = request
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value.trim()).ok());

    match actor {
        Some(id) => {
            request.extensions_mut().insert(Actor(id));
            next.run(request).await
        }
        None => ApiError::unauthorized().into_response(),
    }
}
