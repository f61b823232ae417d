use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use log::info;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{AppState, json_body, well_formed_code};
use crate::db::VoteStore;
use crate::error::VoteError;
use crate::models::{BallotView, CodeValidation, SubmitBallotRequest};
use crate::voting::{VoteResults, ballot, results::compute_results};

#[derive(Deserialize)]
pub struct VerifyQuery {
    code: Option<String>,
}

pub async fn verify_code(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<CodeValidation>, VoteError> {
    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| VoteError::InvalidInput("code is required".to_string()))?;
    well_formed_code(&code)?;

    let validation = ballot::validate_code(&*state.db, &code).await?;
    Ok(Json(validation))
}

pub async fn submit_ballot(
    State(state): State<AppState>,
    payload: Result<Json<SubmitBallotRequest>, JsonRejection>,
) -> Result<Json<Value>, VoteError> {
    let request = json_body(payload)?;
    ballot::submit_ballot(&*state.db, &request.code, &request.votes).await?;
    Ok(Json(json!({ "message": "votes recorded" })))
}

pub async fn get_ballot(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<BallotView>, VoteError> {
    well_formed_code(&code)?;
    let view = ballot::get_ballot(&*state.db, &code).await?;
    Ok(Json(view))
}

pub async fn results(State(state): State<AppState>) -> Result<Json<VoteResults>, VoteError> {
    let results = compute_results(&*state.db).await?;
    Ok(Json(results))
}

pub async fn delete_all_votes(State(state): State<AppState>) -> Result<Json<Value>, VoteError> {
    let deleted = state.db.delete_all_votes().await?;
    info!("ADMIN: deleted {} votes", deleted);
    Ok(Json(json!({ "deleted": deleted })))
}
