use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::admin::rollouts::{
    AdminRolloutError, CreateRolloutCommand, UpdateRolloutCommand,
};
use crate::domain::rollout::{Percentage, affected_users};
use crate::infra::http::error::ApiError;
use crate::infra::http::repo_error_to_api;

use super::AdminState;
use super::actor::Actor;
use super::models::{
    ImpactQuery, ImpactResponse, PercentageRequest, RolloutCreateRequest, RolloutUpdateRequest,
    RolloutView,
};

pub(super) async fn list_toggle_rollouts(
    State(state): State<AdminState>,
    Path(toggle_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let rollouts = state
        .rollouts
        .list_for_toggle(toggle_id)
        .await
        .map_err(rollout_to_api)?;
    let views: Vec<RolloutView> = rollouts.into_iter().map(RolloutView::from).collect();
    Ok(Json(views))
}

pub(super) async fn get_rollout(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let rollout = state.rollouts.find_by_id(id).await.map_err(rollout_to_api)?;
    Ok(Json(RolloutView::from(rollout)))
}

pub(super) async fn create_rollout(
    State(state): State<AdminState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<RolloutCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateRolloutCommand {
        toggle_id: payload.toggle_id,
        strategy: payload.strategy,
        percentage: payload.percentage,
        is_active: payload.is_active,
    };
    let rollout = state
        .rollouts
        .create_rollout(actor.id(), command)
        .await
        .map_err(rollout_to_api)?;
    Ok((StatusCode::CREATED, Json(RolloutView::from(rollout))))
}

pub(super) async fn update_rollout(
    State(state): State<AdminState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RolloutUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdateRolloutCommand {
        id,
        strategy: payload.strategy,
        percentage: payload.percentage,
        is_active: payload.is_active,
    };
    let rollout = state
        .rollouts
        .update_rollout(actor.id(), command)
        .await
        .map_err(rollout_to_api)?;
    Ok(Json(RolloutView::from(rollout)))
}

pub(super) async fn set_rollout_percentage(
    State(state): State<AdminState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PercentageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rollout = state
        .rollouts
        .set_percentage(actor.id(), id, payload.percentage)
        .await
        .map_err(rollout_to_api)?;
    Ok(Json(RolloutView::from(rollout)))
}

pub(super) async fn delete_rollout(
    State(state): State<AdminState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .rollouts
        .delete_rollout(actor.id(), id)
        .await
        .map_err(rollout_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn rollout_impact(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ImpactQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(total_users) = query.total_users else {
        return Err(ApiError::bad_request(
            "totalUsers is required",
            Some("pass ?totalUsers=<count>".to_string()),
        ));
    };

    let rollout = state.rollouts.find_by_id(id).await.map_err(rollout_to_api)?;
    let percentage = Percentage::try_from(rollout.percentage)
        .map_err(|err| ApiError::invalid_input(err.field_name(), err.to_string()))?;

    Ok(Json(ImpactResponse {
        rollout_id: rollout.id,
        percentage: percentage.get(),
        total_users,
        affected_users: affected_users(total_users, percentage),
    }))
}

fn rollout_to_api(err: AdminRolloutError) -> ApiError {
    match err {
        AdminRolloutError::Invalid(domain) => {
            ApiError::invalid_input(domain.field_name(), domain.to_string())
        }
        AdminRolloutError::NotFound => ApiError::not_found("rollout not found"),
        AdminRolloutError::ToggleNotFound => ApiError::not_found("toggle not found"),
        AdminRolloutError::Repo(repo) => repo_error_to_api(repo),
    }
}
