use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the store and report the result alongside the degraded flag.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let connected = match state.battle_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                false
            }
        },
        None => {
            warn!("no storage backend installed (degraded mode)");
            false
        }
    };

    HealthResponse::new(
        connected,
        state.is_degraded(),
        state.public_sse().subscriber_count(),
    )
}
