use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        battle::{
            BattleDetailResponse, BattleListResponse, CreateBattleRequest, CreateBattleResponse,
            HasVotedResponse, LiveStandingsResponse, RelatedParams, SearchParams, VoteRequest,
            VoteResponse,
        },
        common::LimitParams,
        identity::CurrentUser,
    },
    error::AppError,
    services::{battle_service, vote_service},
    state::SharedState,
};

/// Battle creation, voting and read endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/battles", post(create_battle))
        .route("/battles/trending", get(trending))
        .route("/battles/popular", get(popular))
        .route("/battles/search", get(search))
        .route("/battles/{id}", get(battle_detail))
        .route("/battles/{id}/related", get(related))
        .route("/battles/{id}/live", get(live_standings))
        .route("/battles/{id}/vote", get(has_voted).post(cast_vote))
        .route("/users/{id}/battles", get(user_battles))
}

#[utoipa::path(
    post,
    path = "/battles",
    tag = "battles",
    params(("X-User-Id" = String, Header, description = "Identifier of the creator")),
    request_body = CreateBattleRequest,
    responses(
        (status = 201, description = "Battle created", body = CreateBattleResponse),
        (status = 400, description = "Contents differ in category or share a creator"),
        (status = 404, description = "Content not found"),
        (status = 409, description = "Content no longer available")
    )
)]
/// Create a battle between two chosen contents.
pub async fn create_battle(
    State(state): State<SharedState>,
    user: CurrentUser,
    Json(payload): Json<CreateBattleRequest>,
) -> Result<(StatusCode, Json<CreateBattleResponse>), AppError> {
    let response = battle_service::create_battle(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/battles/trending",
    tag = "battles",
    params(LimitParams),
    responses((status = 200, description = "Ongoing battles by votes", body = BattleListResponse))
)]
/// Ongoing battles with the most votes.
pub async fn trending(
    State(state): State<SharedState>,
    Valid(Query(params)): Valid<Query<LimitParams>>,
) -> Json<BattleListResponse> {
    Json(battle_service::trending(&state, params.limit).await)
}

#[utoipa::path(
    get,
    path = "/battles/popular",
    tag = "battles",
    params(LimitParams),
    responses((status = 200, description = "All battles by votes", body = BattleListResponse))
)]
/// All battles with the most votes.
pub async fn popular(
    State(state): State<SharedState>,
    Valid(Query(params)): Valid<Query<LimitParams>>,
) -> Json<BattleListResponse> {
    Json(battle_service::popular(&state, params.limit).await)
}

#[utoipa::path(
    get,
    path = "/battles/search",
    tag = "battles",
    params(SearchParams),
    responses((status = 200, description = "Matching battles, newest first", body = BattleListResponse))
)]
/// Search battles by title.
pub async fn search(
    State(state): State<SharedState>,
    Valid(Query(params)): Valid<Query<SearchParams>>,
) -> Json<BattleListResponse> {
    Json(battle_service::search(&state, params.q, params.category, params.limit).await)
}

#[utoipa::path(
    get,
    path = "/battles/{id}",
    tag = "battles",
    params(("id" = Uuid, Path, description = "Battle identifier")),
    responses(
        (status = 200, description = "Battle detail", body = BattleDetailResponse),
        (status = 404, description = "Battle not found")
    )
)]
/// Load a battle; the view is counted shortly afterwards.
pub async fn battle_detail(
    State(state): State<SharedState>,
    viewer: Option<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<BattleDetailResponse>, AppError> {
    Ok(Json(
        battle_service::battle_detail(&state, viewer.as_ref(), id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/battles/{id}/related",
    tag = "battles",
    params(("id" = Uuid, Path, description = "Reference battle"), RelatedParams),
    responses((status = 200, description = "Battles of the same category", body = BattleListResponse))
)]
/// Battles sharing a category with the given one.
pub async fn related(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Query(params)): Valid<Query<RelatedParams>>,
) -> Json<BattleListResponse> {
    Json(battle_service::related(&state, id, params.category, params.limit).await)
}

#[utoipa::path(
    get,
    path = "/battles/{id}/live",
    tag = "battles",
    params(("id" = Uuid, Path, description = "Battle identifier")),
    responses(
        (status = 200, description = "Cached live standings", body = LiveStandingsResponse),
        (status = 404, description = "Battle not found")
    )
)]
/// Live standings including votes still being processed.
pub async fn live_standings(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LiveStandingsResponse>, AppError> {
    Ok(Json(battle_service::live_standings(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/battles/{id}/vote",
    tag = "battles",
    params(
        ("id" = Uuid, Path, description = "Battle identifier"),
        ("X-User-Id" = String, Header, description = "Identifier of the voter")
    ),
    responses(
        (status = 200, description = "Whether the caller voted", body = HasVotedResponse),
        (status = 404, description = "Battle not found")
    )
)]
/// Whether the caller already voted on the battle.
pub async fn has_voted(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<HasVotedResponse>, AppError> {
    Ok(Json(vote_service::has_voted(&state, &user, id).await?))
}

#[utoipa::path(
    post,
    path = "/battles/{id}/vote",
    tag = "battles",
    params(
        ("id" = Uuid, Path, description = "Battle identifier"),
        ("X-User-Id" = String, Header, description = "Identifier of the voter")
    ),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = VoteResponse),
        (status = 404, description = "Battle not found"),
        (status = 409, description = "Battle ended or caller already voted")
    )
)]
/// Cast the caller's single vote on a battle.
pub async fn cast_vote(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, AppError> {
    Ok(Json(
        vote_service::cast_vote(&state, &user, id, payload.choice).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/users/{id}/battles",
    tag = "battles",
    params(("id" = String, Path, description = "Creator identifier"), LimitParams),
    responses((status = 200, description = "Battles created by the user", body = BattleListResponse))
)]
/// Battles created by a user, newest first.
pub async fn user_battles(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Valid(Query(params)): Valid<Query<LimitParams>>,
) -> Json<BattleListResponse> {
    Json(battle_service::user_battles(&state, user_id, params.limit).await)
}
