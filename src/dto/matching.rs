//! DTOs of the matchmaker: run requests, outcomes, failures and statistics.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::battle::BattleView;

/// Request to run the matchmaker.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchRunRequest {
    /// Maximum battles to create; the configured default when omitted.
    #[serde(alias = "maxMatches")]
    #[validate(range(min = 1, max = 50))]
    pub quota: Option<usize>,
    /// Allow both sides to come from the same creator.
    #[serde(default)]
    pub allow_same_creator: bool,
    /// Allow sides from different categories.
    #[serde(default)]
    pub allow_cross_category: bool,
}

/// Battles created by a successful matching run.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchRunResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Number of battles created.
    pub matches_created: usize,
    /// Set when the battles came from the permissive fallback run.
    pub used_fallback: bool,
    /// Battles created, in commit order.
    pub battles: Vec<BattleView>,
}

/// Why a matching run produced no battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchingFailureReason {
    /// Fewer than two available contents.
    InsufficientContenders,
    /// The pool could not form a single valid pair.
    NoValidMatches,
    /// Storage or commit failure.
    SystemError,
}

impl MatchingFailureReason {
    /// Wire name of the reason.
    pub fn as_str(self) -> &'static str {
        match self {
            MatchingFailureReason::InsufficientContenders => "insufficient_contenders",
            MatchingFailureReason::NoValidMatches => "no_valid_matches",
            MatchingFailureReason::SystemError => "system_error",
        }
    }
}

/// Available contents in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    /// Category name.
    pub category: String,
    /// Number of contents.
    pub count: usize,
}

/// Shape of the pool that could not be paired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchingDiagnostics {
    /// Available contents considered.
    pub total_contenders: usize,
    /// Available contents per category.
    pub categories: Vec<CategoryCount>,
    /// Distinct creators in the pool.
    pub unique_creators: usize,
    /// Likely causes of the failure.
    pub possible_reasons: Vec<String>,
}

/// Failed matching run with diagnostics and hints.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchingFailure {
    /// Failure category.
    pub reason: MatchingFailureReason,
    /// Human-readable summary.
    pub message: String,
    /// Pool shape, when the pool was read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<MatchingDiagnostics>,
    /// Actions that may let the next run succeed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl MatchingFailure {
    /// Not enough contents to form a pair.
    pub fn insufficient(found: usize) -> Self {
        Self {
            reason: MatchingFailureReason::InsufficientContenders,
            message: format!("at least 2 available contents are needed to match (found {found})"),
            diagnostics: None,
            suggestions: vec![
                "upload more contents".into(),
                "retry once other creators have uploaded".into(),
            ],
        }
    }

    /// Pool read but no pair possible.
    pub fn no_valid_matches(diagnostics: MatchingDiagnostics) -> Self {
        Self {
            reason: MatchingFailureReason::NoValidMatches,
            message: "no valid pair could be formed from the available contents".into(),
            diagnostics: Some(diagnostics),
            suggestions: vec![
                "wait for contents from other creators".into(),
                "allow same-creator battles".into(),
                "allow cross-category battles".into(),
            ],
        }
    }

    /// Run aborted by a backend failure.
    pub fn system_error(message: impl Into<String>) -> Self {
        Self {
            reason: MatchingFailureReason::SystemError,
            message: message.into(),
            diagnostics: None,
            suggestions: Vec::new(),
        }
    }
}

/// Snapshot of the matchmaking pool.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchingStatistics {
    /// Contents waiting for a battle.
    pub available_contents: u64,
    /// Battles still open for votes.
    pub ongoing_battles: u64,
    /// Available contents per category.
    pub category_distribution: Vec<CategoryCount>,
}
