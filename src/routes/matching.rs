use axum::{Json, Router, extract::State, routing::{get, post}};
use validator::Validate;

use crate::{
    dto::{
        battle::BattleView,
        identity::CurrentUser,
        matching::{MatchRunRequest, MatchRunResponse, MatchingStatistics},
    },
    error::AppError,
    services::matchmaker::{self, MatchConstraints, MatchRequest},
    state::SharedState,
};

/// Matchmaker endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matching/run", post(run_matching))
        .route("/matching/stats", get(matching_statistics))
}

#[utoipa::path(
    post,
    path = "/matching/run",
    tag = "matching",
    params(("X-User-Id" = String, Header, description = "Identifier of the user starting the run")),
    request_body = MatchRunRequest,
    responses(
        (status = 200, description = "Battles created", body = MatchRunResponse),
        (status = 400, description = "Invalid quota"),
        (status = 401, description = "Missing identity"),
        (status = 409, description = "No pair could be formed"),
        (status = 503, description = "Storage unavailable")
    )
)]
/// Pair available contents into new battles.
pub async fn run_matching(
    State(state): State<SharedState>,
    initiator: CurrentUser,
    payload: Option<Json<MatchRunRequest>>,
) -> Result<Json<MatchRunResponse>, AppError> {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    payload.validate()?;

    let request = MatchRequest {
        quota: payload
            .quota
            .unwrap_or(state.config().matching.default_quota),
        constraints: MatchConstraints {
            allow_same_creator: payload.allow_same_creator,
            allow_cross_category: payload.allow_cross_category,
        },
    };
    let outcome = matchmaker::run_matching(&state, &initiator, request).await?;

    let created = outcome.battles.len();
    Ok(Json(MatchRunResponse {
        success: true,
        message: format!("created {created} battle(s)"),
        matches_created: created,
        used_fallback: outcome.used_fallback,
        battles: outcome.battles.iter().map(BattleView::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/matching/stats",
    tag = "matching",
    responses(
        (status = 200, description = "Pool and battle counts", body = MatchingStatistics),
        (status = 503, description = "Storage unavailable")
    )
)]
/// Counts of available contents, ongoing battles and categories.
pub async fn matching_statistics(
    State(state): State<SharedState>,
) -> Result<Json<MatchingStatistics>, AppError> {
    Ok(Json(matchmaker::matching_statistics(&state).await?))
}
