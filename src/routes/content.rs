use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        common::LimitParams,
        content::{
            ContentListParams, ContentListResponse, DeleteContentResponse, UploadContentRequest,
            UploadContentResponse,
        },
        identity::CurrentUser,
    },
    error::AppError,
    services::content_service,
    state::SharedState,
};

/// Content upload, deletion and listing endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/contents", post(upload_content))
        .route("/contents/available", get(list_available_contents))
        .route("/contents/{id}", delete(delete_content))
        .route("/users/{id}/contents", get(list_user_contents))
}

#[utoipa::path(
    post,
    path = "/contents",
    tag = "contents",
    params(("X-User-Id" = String, Header, description = "Identifier of the uploader")),
    request_body = UploadContentRequest,
    responses(
        (status = 201, description = "Content stored and queued for matching", body = UploadContentResponse),
        (status = 400, description = "Invalid content metadata"),
        (status = 401, description = "Missing identity")
    )
)]
/// Store a content item whose media is already hosted.
pub async fn upload_content(
    State(state): State<SharedState>,
    user: CurrentUser,
    Json(payload): Json<UploadContentRequest>,
) -> Result<(StatusCode, Json<UploadContentResponse>), AppError> {
    let response = content_service::upload_content(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/contents/available",
    tag = "contents",
    params(ContentListParams),
    responses((status = 200, description = "Contents waiting for a battle", body = ContentListResponse))
)]
/// List contents still waiting for a battle.
pub async fn list_available_contents(
    State(state): State<SharedState>,
    Valid(Query(params)): Valid<Query<ContentListParams>>,
) -> Json<ContentListResponse> {
    Json(content_service::list_available_contents(&state, params.category, params.limit).await)
}

#[utoipa::path(
    delete,
    path = "/contents/{id}",
    tag = "contents",
    params(
        ("id" = Uuid, Path, description = "Content identifier"),
        ("X-User-Id" = String, Header, description = "Identifier of the owner")
    ),
    responses(
        (status = 200, description = "Content deleted", body = DeleteContentResponse),
        (status = 401, description = "Caller does not own the content"),
        (status = 404, description = "Content not found"),
        (status = 409, description = "Content is part of a battle")
    )
)]
/// Soft-delete one of the caller's contents.
pub async fn delete_content(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteContentResponse>, AppError> {
    Ok(Json(content_service::delete_content(&state, &user, id).await?))
}

#[utoipa::path(
    get,
    path = "/users/{id}/contents",
    tag = "contents",
    params(("id" = String, Path, description = "Creator identifier"), LimitParams),
    responses((status = 200, description = "Contents uploaded by the user", body = ContentListResponse))
)]
/// List the contents uploaded by a user, newest first.
pub async fn list_user_contents(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Valid(Query(params)): Valid<Query<LimitParams>>,
) -> Json<ContentListResponse> {
    Json(content_service::list_user_contents(&state, user_id, params.limit).await)
}
