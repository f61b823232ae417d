mod admin;
mod meta;
mod vote;

use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Request, State, rejection::JsonRejection},
    http::{HeaderName, Method, StatusCode, header::CONTENT_TYPE},
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use log::warn;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db::Database;
use crate::error::VoteError;
use crate::voting::admin::is_well_formed;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(ADMIN_TOKEN_HEADER)])
        .max_age(Duration::from_secs(60 * 60));

    let public = Router::new()
        .route("/api/verify", get(vote::verify_code))
        .route("/api/vote", post(vote::submit_ballot))
        .route("/api/vote/{code}", get(vote::get_ballot))
        .route("/api/meta/categories", get(meta::list_categories))
        .route("/api/meta/teams", get(meta::list_teams));

    let admin = Router::new()
        .route("/api/admin/results", get(vote::results))
        .route("/api/admin/votes", delete(vote::delete_all_votes))
        .route("/api/admin/codes", get(admin::list_codes).post(admin::create_codes))
        .route("/api/admin/codes/reset", post(admin::reset_all_codes))
        .route("/api/admin/codes/{code}", delete(admin::delete_code))
        .route("/api/admin/codes/{code}/reset", post(admin::reset_code))
        .route("/api/admin/codes/{code}/attach-team/{team_id}", post(admin::attach_team))
        .route("/api/admin/codes/category/{category}", get(admin::codes_by_category))
        .route("/api/admin/categories", get(admin::voter_categories))
        .route("/api/meta/categories", post(meta::create_category))
        .route(
            "/api/meta/categories/{id}",
            get(meta::get_category)
                .put(meta::update_category)
                .delete(meta::delete_category),
        )
        .route("/api/meta/teams", post(meta::create_team))
        .route(
            "/api/meta/teams/{id}",
            get(meta::get_team).put(meta::update_team).delete(meta::delete_team),
        )
        .route_layer(from_fn_with_state(state.clone(), admin_auth));

    public
        .merge(admin)
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

async fn admin_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|token| token == state.config.admin_token);

    if !authorized {
        warn!("rejected admin request to {}", request.uri().path());
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response();
    }
    next.run(request).await
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "code": "PAGE_NOT_FOUND", "message": "Page not found" })),
    )
}

// Codes taken from a path or query string
fn well_formed_code(code: &str) -> Result<(), VoteError> {
    if !is_well_formed(code) {
        warn!("rejected malformed code: {:?}", code);
        return Err(VoteError::InvalidInput("invalid code format".to_string()));
    }
    Ok(())
}

// Malformed bodies are reported in the same shape as every other error.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, VoteError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| VoteError::InvalidInput(rejection.body_text()))
}
