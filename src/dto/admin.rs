//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::battle::BattleView;

/// Request to force battles out of the available pool.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ForcePairingRequest {
    /// Battles to force; one when omitted.
    #[validate(range(min = 1, max = 5))]
    pub quota: Option<usize>,
}

/// Battles produced by a forced pairing.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForcePairingResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Number of battles created.
    pub matches_created: usize,
    /// Battles created, in commit order.
    pub battles: Vec<BattleView>,
}

/// Content totals per lifecycle status.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentStatusResponse {
    /// Contents waiting for a battle.
    pub available: u64,
    /// Contents currently in a battle.
    pub in_battle: u64,
    /// Soft-deleted contents.
    pub deleted: u64,
    /// Sum of every status.
    pub total: u64,
}
