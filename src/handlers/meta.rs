use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};

use super::{AppState, json_body};
use crate::db::{CategoryStore, TeamStore};
use crate::error::VoteError;
use crate::models::{CategoryUpdateRequest, Team, TeamUpdateRequest, VotingCategory};
use crate::voting::admin;

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<VotingCategory>>, VoteError> {
    Ok(Json(state.db.all_categories().await?))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<VotingCategory>, VoteError> {
    Ok(Json(admin::get_category(&*state.db, id).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    payload: Result<Json<VotingCategory>, JsonRejection>,
) -> Result<(StatusCode, Json<VotingCategory>), VoteError> {
    let category = json_body(payload)?;
    admin::create_category(&*state.db, &category).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<CategoryUpdateRequest>, JsonRejection>,
) -> Result<Json<VotingCategory>, VoteError> {
    let request = json_body(payload)?;
    let category = VotingCategory {
        id,
        name: request.name,
        description: request.description,
        weight: request.weight,
    };
    admin::update_category(&*state.db, &category).await?;
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, VoteError> {
    state.db.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_teams(State(state): State<AppState>) -> Result<Json<Vec<Team>>, VoteError> {
    Ok(Json(state.db.all_teams().await?))
}

pub async fn get_team(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Team>, VoteError> {
    Ok(Json(admin::get_team(&*state.db, id).await?))
}

pub async fn create_team(
    State(state): State<AppState>,
    payload: Result<Json<Team>, JsonRejection>,
) -> Result<(StatusCode, Json<Team>), VoteError> {
    let team = json_body(payload)?;
    admin::create_team(&*state.db, &team).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn update_team(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<TeamUpdateRequest>, JsonRejection>,
) -> Result<Json<Team>, VoteError> {
    let request = json_body(payload)?;
    let team = Team {
        id,
        name: request.name,
        description: request.description,
        members: request.members,
    };
    admin::update_team(&*state.db, &team).await?;
    Ok(Json(team))
}

pub async fn delete_team(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, VoteError> {
    state.db.delete_team(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
