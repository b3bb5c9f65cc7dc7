/// Admin operations: forced pairing and content totals.
pub mod admin_service;
/// Battle creation and read-side queries.
pub mod battle_service;
/// Content uploads, deletions and listings.
pub mod content_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Automatic pairing of available contents.
pub mod matchmaker;
/// Shared commit path for every way a battle is created.
pub mod pairing;
/// Leader, live status, match score and trending heuristics.
pub mod scoring;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage supervision with reconnect and degraded-mode reporting.
pub mod storage_supervisor;
/// One-vote-per-user processing.
pub mod vote_service;
