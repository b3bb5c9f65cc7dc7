use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Administrative payloads.
pub mod admin;
/// Battle views, votes and standings.
pub mod battle;
/// Shared query parameters.
pub mod common;
/// Content uploads and views.
pub mod content;
/// Health check payload.
pub mod health;
/// Caller identity.
pub mod identity;
/// Matchmaker payloads.
pub mod matching;
/// SSE payloads.
pub mod sse;
/// Request validation helpers.
pub mod validation;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

fn format_optional_time(time: Option<SystemTime>) -> Option<String> {
    time.map(format_system_time)
}
