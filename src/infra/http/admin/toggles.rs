use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::admin::toggles::{
    AdminToggleError, CreateToggleCommand, UpdateToggleCommand,
};
use crate::application::repos::PageRequest;
use crate::infra::http::error::ApiError;
use crate::infra::http::repo_error_to_api;

use super::AdminState;
use super::actor::Actor;
use super::models::{
    ListQuery, ToggleActiveRequest, ToggleCreateRequest, ToggleListResponse, ToggleUpdateRequest,
    stored_value,
};

pub(super) async fn list_toggles(
    State(state): State<AdminState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .toggles
        .list(PageRequest::new(query.page, query.limit))
        .await
        .map_err(toggle_to_api)?;
    Ok(Json(ToggleListResponse::from(page)))
}

pub(super) async fn get_toggle(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let toggle = state.toggles.find_by_id(id).await.map_err(toggle_to_api)?;
    Ok(Json(toggle))
}

pub(super) async fn create_toggle(
    State(state): State<AdminState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<ToggleCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateToggleCommand {
        key: payload.key,
        name: payload.name,
        description: payload.description,
        value: stored_value(&payload.value, payload.value_type),
        value_type: payload.value_type,
        is_active: payload.is_active,
    };

    let toggle = state
        .toggles
        .create_toggle(actor.id(), command)
        .await
        .map_err(toggle_to_api)?;
    Ok((StatusCode::CREATED, Json(toggle)))
}

pub(super) async fn update_toggle(
    State(state): State<AdminState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ToggleUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdateToggleCommand {
        id,
        name: payload.name,
        description: payload.description,
        value: stored_value(&payload.value, payload.value_type),
        value_type: payload.value_type,
    };

    let toggle = state
        .toggles
        .update_toggle(actor.id(), command)
        .await
        .map_err(toggle_to_api)?;
    Ok(Json(toggle))
}

pub(super) async fn set_toggle_active(
    State(state): State<AdminState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ToggleActiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let toggle = state
        .toggles
        .set_active(actor.id(), id, payload.is_active)
        .await
        .map_err(toggle_to_api)?;
    Ok(Json(toggle))
}

pub(super) async fn delete_toggle(
    State(state): State<AdminState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .toggles
        .delete_toggle(actor.id(), id)
        .await
        .map_err(toggle_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

fn toggle_to_api(err: AdminToggleError) -> ApiError {
    match err {
        AdminToggleError::Invalid(domain) => {
            ApiError::invalid_input(domain.field_name(), domain.to_string())
        }
        AdminToggleError::NotFound => ApiError::not_found("toggle not found"),
        AdminToggleError::Repo(repo) => repo_error_to_api(repo),
    }
}
