//! DTOs for battle listings, details, votes and manual creation.

use std::{collections::BTreeMap, time::SystemTime};

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{
        BattleEntity, BattleMetrics, BattleSide, BattleStatus, ContentKind, DailyVotes,
        LeaderSummary, LiveStatus, MatchingMethod, Side, Winner,
    },
    dto::{format_optional_time, format_system_time},
    services::scoring,
    state::standings::{StandingsSnapshot, Tally},
};

/// Snapshot of one content item as embedded in a battle.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BattleSideView {
    /// Content this side was copied from.
    pub contender_id: Uuid,
    /// Title shown to voters.
    pub title: String,
    /// Hosted image, when any.
    pub image_url: Option<String>,
    /// Votes received by this side.
    pub votes: u64,
    /// Identity of the creator.
    pub creator_id: String,
    /// Display name of the creator.
    pub creator_name: String,
    /// How the media is hosted.
    pub content_type: ContentKind,
    /// YouTube video id.
    pub youtube_id: Option<String>,
    /// Canonical YouTube watch URL.
    pub youtube_url: Option<String>,
    /// Preview image URL.
    pub thumbnail_url: Option<String>,
    /// Instagram post URL.
    pub instagram_url: Option<String>,
    /// Free-form description.
    pub description: String,
    /// Category the content had when paired.
    pub original_category: String,
}

impl From<&BattleSide> for BattleSideView {
    fn from(side: &BattleSide) -> Self {
        Self {
            contender_id: side.contender_id,
            title: side.title.clone(),
            image_url: side.image_url.clone(),
            votes: side.votes,
            creator_id: side.creator_id.clone(),
            creator_name: side.creator_name.clone(),
            content_type: side.content_type,
            youtube_id: side.youtube_id.clone(),
            youtube_url: side.youtube_url.clone(),
            thumbnail_url: side.thumbnail_url.clone(),
            instagram_url: side.instagram_url.clone(),
            description: side.description.clone(),
            original_category: side.original_category.clone(),
        }
    }
}

/// Who is winning, as exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderView {
    /// Side in the lead, or a tie.
    pub winner: Winner,
    /// Vote share of the leader, in whole percent.
    pub percentage: u8,
    /// Vote difference between the sides.
    pub margin: u64,
    /// RFC 3339 time of the last recomputation.
    pub last_updated: String,
}

impl From<&LeaderSummary> for LeaderView {
    fn from(leader: &LeaderSummary) -> Self {
        Self {
            winner: leader.winner,
            percentage: leader.percentage,
            margin: leader.margin,
            last_updated: format_system_time(leader.last_updated),
        }
    }
}

/// Full public projection of a battle.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BattleView {
    /// Unique identifier.
    pub id: Uuid,
    /// Identity of the creator.
    pub creator_id: String,
    /// Display name of the creator.
    pub creator_name: String,
    /// Title shown to voters.
    pub title: String,
    /// Category used for pairing.
    pub category: String,
    /// First side.
    pub item_a: BattleSideView,
    /// Second side.
    pub item_b: BattleSideView,
    /// Whether votes are still accepted.
    pub status: BattleStatus,
    /// Votes on both sides.
    pub total_votes: u64,
    /// Distinct voters.
    pub participant_count: usize,
    /// Votes per calendar day, keyed `YYYY-MM-DD`.
    pub daily_votes: BTreeMap<String, DailyVotes>,
    /// Leader at the time of the last vote.
    pub current_leader: Option<LeaderView>,
    /// Always recomputed from the side votes.
    pub live_status: LiveStatus,
    /// Engagement ratios.
    pub metrics: BattleMetrics,
    /// Likes received.
    pub like_count: u64,
    /// Shares recorded.
    pub share_count: u64,
    /// Comments recorded.
    pub comment_count: u64,
    /// Views counted so far.
    pub view_count: u64,
    /// How the pair was formed.
    pub matching_method: MatchingMethod,
    /// Pair score assigned at creation.
    pub matching_score: f64,
    /// Both sides come from the same creator.
    pub is_same_creator: bool,
    /// The sides come from different categories.
    pub is_cross_category: bool,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 end of voting.
    pub ends_at: String,
    /// RFC 3339 time of the last write.
    pub updated_at: String,
    /// RFC 3339 time of the latest accepted vote.
    pub last_vote_at: Option<String>,
    /// Latest vote or view, else the creation time.
    pub last_activity_at: String,
    /// Heuristic ranking score, only on trending listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trending_score: Option<f64>,
    /// Set on trending listings when the battle is hot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hot: Option<bool>,
}

impl From<&BattleEntity> for BattleView {
    fn from(battle: &BattleEntity) -> Self {
        Self {
            id: battle.id,
            creator_id: battle.creator_id.clone(),
            creator_name: battle.creator_name.clone(),
            title: battle.title.clone(),
            category: battle.category.clone(),
            item_a: (&battle.item_a).into(),
            item_b: (&battle.item_b).into(),
            status: battle.status,
            total_votes: battle.total_votes,
            participant_count: battle.participants.len(),
            daily_votes: battle.daily_votes.clone(),
            current_leader: battle.current_leader.as_ref().map(LeaderView::from),
            live_status: scoring::battle_live_status(battle),
            metrics: battle.metrics.clone(),
            like_count: battle.like_count,
            share_count: battle.share_count,
            comment_count: battle.comment_count,
            view_count: battle.view_count,
            matching_method: battle.matching_method,
            matching_score: battle.matching_score,
            is_same_creator: battle.is_same_creator,
            is_cross_category: battle.is_cross_category,
            created_at: format_system_time(battle.created_at),
            ends_at: format_system_time(battle.ends_at),
            updated_at: format_system_time(battle.updated_at),
            last_vote_at: format_optional_time(battle.last_vote_at),
            last_activity_at: format_system_time(battle.last_activity()),
            trending_score: None,
            is_hot: None,
        }
    }
}

impl BattleView {
    /// Attach the trending score computed at `now`.
    pub fn with_trending(mut self, battle: &BattleEntity, now: SystemTime) -> Self {
        self.trending_score = Some(scoring::trending_score(battle, now));
        self
    }

    /// Attach the hot flag computed at `now`.
    pub fn with_hot(mut self, battle: &BattleEntity, now: SystemTime) -> Self {
        self.is_hot = Some(scoring::is_hot(battle, now));
        self
    }
}

/// Detail response of a single battle.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BattleDetailResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// The battle.
    pub battle: BattleView,
}

/// Battle listing; a failed read yields an empty list with `success = false`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BattleListResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Battles in listing order.
    pub battles: Vec<BattleView>,
    /// Failure reason when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BattleListResponse {
    /// Successful listing.
    pub fn ok(battles: Vec<BattleView>) -> Self {
        Self {
            success: true,
            battles,
            error: None,
        }
    }

    /// Failed listing carrying the error text.
    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            battles: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// Query parameters of the related-battles listing.
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RelatedParams {
    /// Category to search; defaults to the category of the reference battle.
    pub category: Option<String>,
    /// Maximum number of entries returned.
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

/// Query parameters of the battle search.
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Case-insensitive text matched against battle and content titles.
    #[validate(length(min = 1, max = 100))]
    pub q: String,
    /// Only battles in this category.
    pub category: Option<String>,
    /// Maximum number of entries returned.
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

/// Manual battle creation between two chosen contents.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBattleRequest {
    /// Content placed on side A.
    pub content_a_id: Uuid,
    /// Content placed on side B.
    pub content_b_id: Uuid,
}

/// Acknowledgement of a newly created battle.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBattleResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Battle the entry refers to.
    pub battle_id: Uuid,
    /// The battle.
    pub battle: BattleView,
}

/// Side chosen by a voter.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    /// Side voted for.
    #[serde(alias = "side")]
    pub choice: Side,
}

/// Authoritative result of an accepted vote.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Side voted for.
    pub choice: Side,
    /// Votes of the chosen side after this vote.
    pub new_vote_count: u64,
    /// Votes on both sides after this vote.
    pub new_total_votes: u64,
    /// Leader at the time of the last vote.
    pub current_leader: Option<LeaderView>,
    /// Closeness classification of the battle.
    pub live_status: LiveStatus,
}

/// Whether the caller already voted on a battle.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HasVotedResponse {
    /// Battle the entry refers to.
    pub battle_id: Uuid,
    /// Whether the caller is a participant.
    pub has_voted: bool,
}

/// Live standings served from the in-memory cache.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiveStandingsResponse {
    /// Battle the entry refers to.
    pub battle_id: Uuid,
    /// Counts settled by the store.
    pub confirmed: Tally,
    /// Confirmed counts plus votes still being processed.
    pub projected: Tally,
    /// Votes accepted but not yet settled by the store.
    pub pending_votes: usize,
    /// Closeness classification of the battle.
    pub live_status: LiveStatus,
}

impl LiveStandingsResponse {
    /// Project `snapshot` into the response for `battle_id`.
    pub fn new(battle_id: Uuid, snapshot: StandingsSnapshot) -> Self {
        Self {
            battle_id,
            confirmed: snapshot.confirmed,
            projected: snapshot.projected,
            pending_votes: snapshot.pending,
            live_status: scoring::live_status(snapshot.projected.item_a, snapshot.projected.item_b),
        }
    }
}
