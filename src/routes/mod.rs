use axum::Router;

use crate::state::SharedState;

/// Token-protected admin routes.
pub mod admin;
/// Battle routes.
pub mod battle;
/// Content routes.
pub mod content;
/// OpenAPI and Swagger UI.
pub mod docs;
/// Health check.
pub mod health;
/// Caller identity extractors.
pub mod identity;
/// Matchmaker routes.
pub mod matching;
/// SSE streams.
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(content::router())
        .merge(battle::router())
        .merge(matching::router())
        .merge(admin::router(state.clone()));

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
