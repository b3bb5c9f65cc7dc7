use serde::Serialize;
use utoipa::ToSchema;

/// Payload of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: String,
    /// Whether a storage backend answered the last ping.
    pub storage_connected: bool,
    /// Clients currently attached to the public event stream.
    pub sse_subscribers: usize,
}

impl HealthResponse {
    /// Build the payload; the status is `degraded` when storage is down.
    pub fn new(storage_connected: bool, degraded: bool, sse_subscribers: usize) -> Self {
        let status = if storage_connected && !degraded {
            "ok"
        } else {
            "degraded"
        };
        Self {
            status: status.to_owned(),
            storage_connected,
            sse_subscribers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_storage_problem_degrades() {
        assert_eq!(HealthResponse::new(true, false, 0).status, "ok");
        assert_eq!(HealthResponse::new(false, false, 3).status, "degraded");
        assert_eq!(HealthResponse::new(true, true, 0).status, "degraded");
    }
}
