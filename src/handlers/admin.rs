use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use log::info;
use serde_json::{Value, json};

use super::{AppState, json_body, well_formed_code};
use crate::db::CodeStore;
use crate::error::VoteError;
use crate::models::{CreateCodesRequest, VoterCategory, VotingCode};
use crate::voting::admin::{self, VoterCategoryInfo};

pub async fn list_codes(State(state): State<AppState>) -> Result<Json<Vec<VotingCode>>, VoteError> {
    Ok(Json(state.db.all_codes().await?))
}

pub async fn create_codes(
    State(state): State<AppState>,
    payload: Result<Json<CreateCodesRequest>, JsonRejection>,
) -> Result<Json<Vec<VotingCode>>, VoteError> {
    let request = json_body(payload)?;
    let category: VoterCategory = request.category.parse()?;

    let codes = admin::create_codes(
        &*state.db,
        category,
        request.count,
        state.config.code_length,
    )
    .await?;
    Ok(Json(codes))
}

pub async fn codes_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<VotingCode>>, VoteError> {
    let category: VoterCategory = category.parse()?;
    Ok(Json(admin::codes_by_category(&*state.db, category).await?))
}

pub async fn delete_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Value>, VoteError> {
    well_formed_code(&code)?;
    state.db.delete_code(&code).await?;
    info!("ADMIN: deleted code: {}", code);
    Ok(Json(json!({ "deleted": code })))
}

pub async fn reset_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Value>, VoteError> {
    well_formed_code(&code)?;
    admin::reset_code(&*state.db, &code).await?;
    Ok(Json(json!({ "reset": code })))
}

pub async fn reset_all_codes(State(state): State<AppState>) -> Result<Json<Value>, VoteError> {
    let updated = admin::reset_all_codes(&*state.db).await?;
    Ok(Json(json!({ "message": "All codes reset", "updatedCount": updated })))
}

pub async fn attach_team(
    State(state): State<AppState>,
    Path((code, team_id)): Path<(String, i64)>,
) -> Result<Json<Value>, VoteError> {
    well_formed_code(&code)?;
    admin::attach_team(&*state.db, &code, team_id).await?;
    Ok(Json(json!({ "message": "team attached", "code": code, "teamId": team_id })))
}

pub async fn voter_categories() -> Json<Vec<VoterCategoryInfo>> {
    Json(admin::voter_categories())
}
