//! Persisted document shapes for contents ("contenders") and battles.
//!
//! Field names are serialized in camelCase to stay compatible with documents
//! already stored by earlier clients. Identifiers are stored as strings and
//! timestamps as epoch milliseconds.

use std::{collections::BTreeMap, time::SystemTime};

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, TimestampMilliSeconds, serde_as};
use utoipa::ToSchema;
use uuid::Uuid;

/// Category assigned to contents uploaded without one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Lifecycle of an uploaded content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    /// Waiting in the pool for a battle.
    Available,
    /// Claimed by a battle; cannot be rematched or deleted.
    InBattle,
    /// Removed by its owner.
    Deleted,
}

impl ContentStatus {
    /// Stored string form, used in database filters.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentStatus::Available => "available",
            ContentStatus::InBattle => "in_battle",
            ContentStatus::Deleted => "deleted",
        }
    }
}

/// Kind of media a content item embeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ContentKind {
    /// Hosted image.
    #[serde(rename = "image")]
    Image,
    /// YouTube video embed.
    #[serde(rename = "youtube")]
    VideoEmbed,
    /// Instagram post embed.
    #[serde(rename = "instagram")]
    SocialEmbed,
}

/// A user-submitted media unit eligible for battle pairing.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentEntity {
    /// Unique identifier.
    #[serde_as(as = "DisplayFromStr")]
    pub id: Uuid,
    /// Identity of the creator.
    pub creator_id: String,
    /// Display name of the creator.
    pub creator_name: String,
    /// Title shown to voters.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Category used for pairing.
    pub category: String,
    /// How the media is hosted.
    pub content_type: ContentKind,
    /// Hosted image, when any.
    pub image_url: Option<String>,
    /// YouTube video id.
    pub youtube_id: Option<String>,
    /// Canonical YouTube watch URL.
    pub youtube_url: Option<String>,
    /// Preview image URL.
    pub thumbnail_url: Option<String>,
    /// Instagram post URL.
    pub instagram_url: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Lifecycle status.
    pub status: ContentStatus,
    /// Likes received.
    #[serde(default)]
    pub like_count: u64,
    /// Views counted so far.
    #[serde(default)]
    pub view_count: u64,
    /// Battles this content took part in.
    #[serde(default)]
    pub battle_count: u64,
    /// Most recent battle of this content.
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub last_battle_id: Option<Uuid>,
    /// False once the content is deleted.
    pub is_active: bool,
    /// Creation time.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub created_at: SystemTime,
    /// Time of the last write.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub updated_at: SystemTime,
    /// Soft-deletion time.
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    pub deleted_at: Option<SystemTime>,
}

impl ContentEntity {
    /// Category used for pairing, substituting [`DEFAULT_CATEGORY`] for blanks.
    pub fn pairing_category(&self) -> &str {
        if self.category.trim().is_empty() {
            DEFAULT_CATEGORY
        } else {
            &self.category
        }
    }

    /// Whether the content can still enter a battle.
    pub fn is_available(&self) -> bool {
        self.status == ContentStatus::Available
    }

    /// Flip the content into a battle, recording the back-reference.
    pub fn claim_for_battle(&mut self, battle_id: Uuid, at: SystemTime) {
        self.status = ContentStatus::InBattle;
        self.last_battle_id = Some(battle_id);
        self.battle_count += 1;
        self.updated_at = at;
    }

    /// Soft-delete the content on behalf of its owner.
    pub fn mark_deleted(&mut self, at: SystemTime) {
        self.status = ContentStatus::Deleted;
        self.is_active = false;
        self.deleted_at = Some(at);
        self.updated_at = at;
    }
}

/// Side of a battle a vote goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Side {
    /// First side.
    #[serde(rename = "itemA")]
    ItemA,
    /// Second side.
    #[serde(rename = "itemB")]
    ItemB,
}

impl Side {
    /// Stored field name of the side, used for partial updates.
    pub fn field(self) -> &'static str {
        match self {
            Side::ItemA => "itemA",
            Side::ItemB => "itemB",
        }
    }
}

/// Current winner of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Winner {
    /// Side A leads.
    #[serde(rename = "itemA")]
    ItemA,
    /// Side B leads.
    #[serde(rename = "itemB")]
    ItemB,
    /// Both sides have the same votes.
    #[serde(rename = "tie")]
    Tie,
}

impl From<Side> for Winner {
    fn from(side: Side) -> Self {
        match side {
            Side::ItemA => Winner::ItemA,
            Side::ItemB => Winner::ItemB,
        }
    }
}

/// Whether a battle still accepts votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BattleStatus {
    /// Open for votes.
    Ongoing,
    /// Voting closed.
    Ended,
}

impl BattleStatus {
    /// Stored string form, used in database filters.
    pub fn as_str(self) -> &'static str {
        match self {
            BattleStatus::Ongoing => "ongoing",
            BattleStatus::Ended => "ended",
        }
    }
}

/// How a battle was formed; recorded for analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchingMethod {
    /// Manual creation with strict category and creator checks.
    SmartAlgorithm,
    /// Produced by the matchmaker's constraint ladder.
    FlexibleAlgorithm,
    /// Administrative pairing that ignores category and creator constraints.
    ForceMatching,
}

/// Snapshot of a content item embedded in a battle at pairing time.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BattleSide {
    /// Content this side was copied from.
    #[serde_as(as = "DisplayFromStr")]
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
    #[serde(default)]
    pub description: String,
    /// Category the content had when paired.
    #[serde(default)]
    pub original_category: String,
}

impl BattleSide {
    /// Copy the fields of `content` into an independent snapshot with zero votes.
    pub fn snapshot(content: &ContentEntity) -> Self {
        Self {
            contender_id: content.id,
            title: content.title.clone(),
            image_url: content.image_url.clone(),
            votes: 0,
            creator_id: content.creator_id.clone(),
            creator_name: content.creator_name.clone(),
            content_type: content.content_type,
            youtube_id: content.youtube_id.clone(),
            youtube_url: content.youtube_url.clone(),
            thumbnail_url: content.thumbnail_url.clone(),
            instagram_url: content.instagram_url.clone(),
            description: content.description.clone(),
            original_category: content.pairing_category().to_owned(),
        }
    }
}

/// Votes received during one calendar day.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyVotes {
    /// Votes for side A.
    pub item_a: u64,
    /// Votes for side B.
    pub item_b: u64,
    /// Votes on both sides.
    pub total: u64,
}

impl DailyVotes {
    /// Count one vote for `side`.
    pub fn record(&mut self, side: Side) {
        match side {
            Side::ItemA => self.item_a += 1,
            Side::ItemB => self.item_b += 1,
        }
        self.total += 1;
    }
}

/// Derived snapshot of who is currently winning.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderSummary {
    /// Side in the lead, or a tie.
    pub winner: Winner,
    /// Vote share of the leader, in whole percent.
    pub percentage: u8,
    /// Vote difference between the sides.
    pub margin: u64,
    /// When the leader was last recomputed.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub last_updated: SystemTime,
}

/// Display classification of how close a battle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LiveStatusKind {
    /// No vote yet.
    Waiting,
    /// The sides are within a few points.
    Competitive,
    /// One side is clearly ahead.
    Leading,
    /// One side holds a large majority.
    Dominant,
}

/// Vote share per side, in whole percent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SidePercentages {
    /// Share of side A.
    pub item_a: u8,
    /// Share of side B.
    pub item_b: u8,
}

/// Cached display hint recomputed from the vote counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatus {
    /// Closeness class.
    pub status: LiveStatusKind,
    /// Text shown next to the standings.
    pub message: String,
    /// Vote share per side.
    pub percentage: SidePercentages,
    /// Vote difference between the sides.
    pub margin: u64,
}

/// Engagement ratios maintained on every vote.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BattleMetrics {
    /// Votes per view.
    pub engagement_rate: f64,
    /// Comments per view.
    #[serde(default)]
    pub comment_rate: f64,
    /// Shares per view.
    #[serde(default)]
    pub share_rate: f64,
}

/// Everything the store needs to commit a pair besides the two contents.
#[derive(Debug, Clone)]
pub struct BattleDraft {
    /// Unique identifier.
    pub id: Uuid,
    /// Content placed on side A.
    pub content_a: Uuid,
    /// Content placed on side B.
    pub content_b: Uuid,
    /// Identity of the user who triggered the pairing.
    pub initiator_id: String,
    /// Display name of the initiator.
    pub initiator_name: String,
    /// How the pair was formed.
    pub method: MatchingMethod,
    /// Pair score.
    pub score: f64,
    /// Creation time.
    pub created_at: SystemTime,
    /// Scheduled end of voting.
    pub ends_at: SystemTime,
}

/// Two-sided voting contest persisted by the storage layer.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BattleEntity {
    /// Unique identifier.
    #[serde_as(as = "DisplayFromStr")]
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
    pub item_a: BattleSide,
    /// Second side.
    pub item_b: BattleSide,
    /// Whether votes are still accepted.
    pub status: BattleStatus,
    /// Votes on both sides.
    pub total_votes: u64,
    /// Ids of the users who voted.
    #[serde(default)]
    pub participants: Vec<String>,
    /// Votes per calendar day, keyed `YYYY-MM-DD`.
    #[serde(default)]
    pub daily_votes: BTreeMap<String, DailyVotes>,
    /// Leader at the time of the last vote.
    pub current_leader: Option<LeaderSummary>,
    /// Closeness classification of the battle.
    pub live_status: Option<LiveStatus>,
    /// Engagement ratios.
    #[serde(default)]
    pub metrics: BattleMetrics,
    /// Likes received.
    #[serde(default)]
    pub like_count: u64,
    /// Shares recorded.
    #[serde(default)]
    pub share_count: u64,
    /// Comments recorded.
    #[serde(default)]
    pub comment_count: u64,
    /// Views counted so far.
    #[serde(default)]
    pub view_count: u64,
    /// Ids of the users who viewed the battle.
    #[serde(default)]
    pub unique_viewers: Vec<String>,
    /// How the pair was formed.
    pub matching_method: MatchingMethod,
    /// Pair score assigned at creation.
    pub matching_score: f64,
    /// Both sides come from the same creator.
    #[serde(default)]
    pub is_same_creator: bool,
    /// The sides come from different categories.
    #[serde(default)]
    pub is_cross_category: bool,
    /// Creation time.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub created_at: SystemTime,
    /// Scheduled end of voting.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub ends_at: SystemTime,
    /// Time of the last write.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub updated_at: SystemTime,
    /// Time of the latest accepted vote.
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    pub last_vote_at: Option<SystemTime>,
    /// Time of the latest counted view.
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    pub last_view_at: Option<SystemTime>,
    /// Bumped on every write; used for compare-and-swap updates.
    #[serde(default)]
    pub revision: u64,
}

impl BattleEntity {
    /// Open a new battle between two freshly re-read contents.
    pub fn open(a: &ContentEntity, b: &ContentEntity, draft: &BattleDraft) -> Self {
        let category = if a.category.trim().is_empty() {
            b.pairing_category().to_owned()
        } else {
            a.category.clone()
        };

        Self {
            id: draft.id,
            creator_id: draft.initiator_id.clone(),
            creator_name: draft.initiator_name.clone(),
            title: format!("{} vs {}", a.title, b.title),
            category,
            item_a: BattleSide::snapshot(a),
            item_b: BattleSide::snapshot(b),
            status: BattleStatus::Ongoing,
            total_votes: 0,
            participants: Vec::new(),
            daily_votes: BTreeMap::new(),
            current_leader: None,
            live_status: None,
            metrics: BattleMetrics::default(),
            like_count: 0,
            share_count: 0,
            comment_count: 0,
            view_count: 0,
            unique_viewers: Vec::new(),
            matching_method: draft.method,
            matching_score: draft.score,
            is_same_creator: a.creator_id == b.creator_id,
            is_cross_category: a.pairing_category() != b.pairing_category(),
            created_at: draft.created_at,
            ends_at: draft.ends_at,
            updated_at: draft.created_at,
            last_vote_at: None,
            last_view_at: None,
            revision: 0,
        }
    }

    /// Borrow one side of the battle.
    pub fn side(&self, side: Side) -> &BattleSide {
        match side {
            Side::ItemA => &self.item_a,
            Side::ItemB => &self.item_b,
        }
    }

    /// Mutably borrow one side of the battle.
    pub fn side_mut(&mut self, side: Side) -> &mut BattleSide {
        match side {
            Side::ItemA => &mut self.item_a,
            Side::ItemB => &mut self.item_b,
        }
    }

    /// Whether `user_id` already voted.
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|participant| participant == user_id)
    }

    /// Time of the latest vote, falling back to creation.
    pub fn last_activity(&self) -> SystemTime {
        self.last_vote_at.unwrap_or(self.created_at)
    }

    /// Record a view; signed-in viewers are only counted once.
    ///
    /// Returns whether the counters changed.
    pub fn record_view(&mut self, viewer: Option<&str>, at: SystemTime) -> bool {
        if let Some(viewer) = viewer {
            if self.unique_viewers.iter().any(|seen| seen == viewer) {
                return false;
            }
            self.unique_viewers.push(viewer.to_owned());
        }
        self.view_count += 1;
        self.last_view_at = Some(at);
        self.updated_at = at;
        true
    }
}
