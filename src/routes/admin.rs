use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::admin::{ContentStatusResponse, ForcePairingRequest, ForcePairingResponse},
    error::AppError,
    services::admin_service,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-only maintenance endpoints.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/matching/force", post(force_pairing))
        .route("/admin/contents/status", get(content_status))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Pair contents regardless of category and, as a last resort, creator.
#[utoipa::path(
    post,
    path = "/admin/matching/force",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    request_body = ForcePairingRequest,
    responses(
        (status = 200, description = "Battles forced", body = ForcePairingResponse),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 409, description = "Fewer than two available contents")
    )
)]
pub async fn force_pairing(
    State(state): State<SharedState>,
    payload: Option<Json<ForcePairingRequest>>,
) -> Result<Json<ForcePairingResponse>, AppError> {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    payload.validate()?;
    Ok(Json(admin_service::force_pairing(&state, payload).await?))
}

/// Content totals per status.
#[utoipa::path(
    get,
    path = "/admin/contents/status",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    responses(
        (status = 200, description = "Content totals", body = ContentStatusResponse),
        (status = 401, description = "Missing or invalid admin token")
    )
)]
pub async fn content_status(
    State(state): State<SharedState>,
) -> Result<Json<ContentStatusResponse>, AppError> {
    Ok(Json(admin_service::content_status(&state).await?))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    match state.config().admin_token.as_deref() {
        Some(token) if token == provided => Ok(next.run(req).await),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized(
            "admin endpoints are disabled: no admin token configured".into(),
        )),
    }
}
