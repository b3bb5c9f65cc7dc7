use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for Content Battle Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::content::upload_content,
        crate::routes::content::list_available_contents,
        crate::routes::content::delete_content,
        crate::routes::content::list_user_contents,
        crate::routes::battle::create_battle,
        crate::routes::battle::trending,
        crate::routes::battle::popular,
        crate::routes::battle::search,
        crate::routes::battle::battle_detail,
        crate::routes::battle::related,
        crate::routes::battle::live_standings,
        crate::routes::battle::has_voted,
        crate::routes::battle::cast_vote,
        crate::routes::battle::user_battles,
        crate::routes::matching::run_matching,
        crate::routes::matching::matching_statistics,
        crate::routes::admin::force_pairing,
        crate::routes::admin::content_status,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::content::UploadContentRequest,
            crate::dto::content::UploadContentResponse,
            crate::dto::content::DeleteContentResponse,
            crate::dto::content::ContentView,
            crate::dto::content::ContentListResponse,
            crate::dto::battle::BattleSideView,
            crate::dto::battle::LeaderView,
            crate::dto::battle::BattleView,
            crate::dto::battle::BattleDetailResponse,
            crate::dto::battle::BattleListResponse,
            crate::dto::battle::CreateBattleRequest,
            crate::dto::battle::CreateBattleResponse,
            crate::dto::battle::VoteRequest,
            crate::dto::battle::VoteResponse,
            crate::dto::battle::HasVotedResponse,
            crate::dto::battle::LiveStandingsResponse,
            crate::dto::matching::MatchRunRequest,
            crate::dto::matching::MatchRunResponse,
            crate::dto::matching::MatchingFailureReason,
            crate::dto::matching::CategoryCount,
            crate::dto::matching::MatchingDiagnostics,
            crate::dto::matching::MatchingFailure,
            crate::dto::matching::MatchingStatistics,
            crate::dto::admin::ForcePairingRequest,
            crate::dto::admin::ForcePairingResponse,
            crate::dto::admin::ContentStatusResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::BattleCreatedEvent,
            crate::dto::sse::BattleVotedEvent,
            crate::state::standings::Tally,
            crate::dao::models::ContentStatus,
            crate::dao::models::ContentKind,
            crate::dao::models::Side,
            crate::dao::models::Winner,
            crate::dao::models::BattleStatus,
            crate::dao::models::MatchingMethod,
            crate::dao::models::DailyVotes,
            crate::dao::models::LiveStatusKind,
            crate::dao::models::SidePercentages,
            crate::dao::models::LiveStatus,
            crate::dao::models::BattleMetrics,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "contents", description = "Content uploads and listings"),
        (name = "battles", description = "Battles, votes and live standings"),
        (name = "matching", description = "Automatic pairing of available contents"),
        (name = "admin", description = "Token-protected maintenance operations"),
    )
)]
pub struct ApiDoc;
