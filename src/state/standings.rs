//! Live standings cache served by the live endpoint and the SSE stream.
//!
//! A vote first lands here as a tentative ticket so readers see it right away.
//! Once the store settles the vote, the ticket is confirmed against the
//! authoritative battle or reverted.

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{BattleEntity, BattleStatus, Side};

/// Identifier of a tentative vote.
pub type TicketId = Uuid;

/// Handle for one tentative vote; must be confirmed or reverted exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    /// Ticket identifier.
    pub id: TicketId,
    /// Battle the vote targets.
    pub battle_id: Uuid,
    /// Side the vote counts for.
    pub side: Side,
}

/// Vote counts per side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    /// Votes for side A.
    pub item_a: u64,
    /// Votes for side B.
    pub item_b: u64,
}

impl Tally {
    /// Votes on both sides.
    pub fn total(&self) -> u64 {
        self.item_a + self.item_b
    }

    fn add(&mut self, side: Side) {
        match side {
            Side::ItemA => self.item_a += 1,
            Side::ItemB => self.item_b += 1,
        }
    }

    fn of(battle: &BattleEntity) -> Self {
        Self {
            item_a: battle.item_a.votes,
            item_b: battle.item_b.votes,
        }
    }
}

/// Point-in-time view of one battle's standings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandingsSnapshot {
    /// Counts settled by the store.
    pub confirmed: Tally,
    /// Confirmed counts plus votes still in flight.
    pub projected: Tally,
    /// Votes still in flight.
    pub pending: usize,
    /// Store revision the confirmed counts come from.
    pub revision: u64,
}

/// Errors raised when settling a ticket that is not pending.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketError {
    /// Nothing is tracked for the battle.
    #[error("no standings tracked for battle `{0}`")]
    UnknownBattle(Uuid),
    /// The ticket was already settled.
    #[error("tentative vote `{0}` is not pending")]
    NotPending(TicketId),
}

#[derive(Debug, Default)]
struct Standing {
    confirmed: Tally,
    revision: u64,
    seeded: bool,
    pending: Vec<Ticket>,
}

impl Standing {
    fn adopt(&mut self, battle: &BattleEntity) {
        if !self.seeded || battle.revision >= self.revision {
            self.confirmed = Tally::of(battle);
            self.revision = battle.revision;
            self.seeded = true;
        }
    }

    fn take(&mut self, ticket: Ticket) -> Result<(), TicketError> {
        let position = self
            .pending
            .iter()
            .position(|pending| pending.id == ticket.id)
            .ok_or(TicketError::NotPending(ticket.id))?;
        self.pending.swap_remove(position);
        Ok(())
    }

    fn snapshot(&self) -> StandingsSnapshot {
        let mut projected = self.confirmed;
        for ticket in &self.pending {
            projected.add(ticket.side);
        }
        StandingsSnapshot {
            confirmed: self.confirmed,
            projected,
            pending: self.pending.len(),
            revision: self.revision,
        }
    }
}

/// Per-battle standings keyed by battle id.
#[derive(Debug, Default)]
pub struct LiveStandings {
    entries: DashMap<Uuid, Standing>,
}

impl LiveStandings {
    /// Empty standings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt the counts of `battle` unless a newer revision is already cached.
    ///
    /// Ended battles are not kept once nothing is pending for them.
    pub fn seed(&self, battle: &BattleEntity) -> StandingsSnapshot {
        let snapshot = {
            let mut entry = self.entries.entry(battle.id).or_default();
            entry.adopt(battle);
            entry.snapshot()
        };
        self.evict_if_closed(battle);
        snapshot
    }

    /// Record a vote that has not been settled yet.
    pub fn apply_tentative(&self, battle_id: Uuid, side: Side) -> Ticket {
        let ticket = Ticket {
            id: Uuid::new_v4(),
            battle_id,
            side,
        };
        self.entries
            .entry(battle_id)
            .or_default()
            .pending
            .push(ticket);
        ticket
    }

    /// Settle `ticket` with the battle returned by the store.
    pub fn confirm(
        &self,
        ticket: Ticket,
        battle: &BattleEntity,
    ) -> Result<StandingsSnapshot, TicketError> {
        let snapshot = {
            let mut entry = self
                .entries
                .get_mut(&ticket.battle_id)
                .ok_or(TicketError::UnknownBattle(ticket.battle_id))?;
            entry.take(ticket)?;
            entry.adopt(battle);
            entry.snapshot()
        };
        self.evict_if_closed(battle);
        Ok(snapshot)
    }

    /// Drop `ticket` after its vote was rejected. The entry itself goes away
    /// when it was never seeded and nothing else is pending.
    pub fn revert(&self, ticket: Ticket) -> Result<StandingsSnapshot, TicketError> {
        let snapshot = {
            let mut entry = self
                .entries
                .get_mut(&ticket.battle_id)
                .ok_or(TicketError::UnknownBattle(ticket.battle_id))?;
            entry.take(ticket)?;
            entry.snapshot()
        };
        self.entries.remove_if(&ticket.battle_id, |_, entry| {
            !entry.seeded && entry.pending.is_empty()
        });
        Ok(snapshot)
    }

    /// Current standings, if the battle has been seeded from the store.
    pub fn snapshot(&self, battle_id: Uuid) -> Option<StandingsSnapshot> {
        self.entries
            .get(&battle_id)
            .filter(|entry| entry.seeded)
            .map(|entry| entry.snapshot())
    }

    fn evict_if_closed(&self, battle: &BattleEntity) {
        if battle.status != BattleStatus::Ongoing {
            self.entries
                .remove_if(&battle.id, |_, entry| entry.pending.is_empty());
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_battles(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{
        models::{BattleDraft, MatchingMethod},
        test_support::content,
    };

    fn battle() -> BattleEntity {
        let a = content("alice", "music");
        let b = content("bob", "music");
        let now = std::time::SystemTime::now();
        BattleEntity::open(
            &a,
            &b,
            &BattleDraft {
                id: Uuid::new_v4(),
                content_a: a.id,
                content_b: b.id,
                initiator_id: "system".into(),
                initiator_name: "System".into(),
                method: MatchingMethod::FlexibleAlgorithm,
                score: 0.0,
                created_at: now,
                ends_at: now,
            },
        )
    }

    #[test]
    fn tentative_votes_are_visible_until_settled() {
        let standings = LiveStandings::new();
        let mut battle = battle();
        standings.seed(&battle);

        let ticket = standings.apply_tentative(battle.id, Side::ItemA);
        let snapshot = standings.snapshot(battle.id).unwrap();
        assert_eq!(snapshot.projected.item_a, 1);
        assert_eq!(snapshot.confirmed.item_a, 0);
        assert_eq!(snapshot.pending, 1);

        battle.item_a.votes = 1;
        battle.total_votes = 1;
        battle.revision = 1;
        let settled = standings.confirm(ticket, &battle).unwrap();
        assert_eq!(settled.confirmed.item_a, 1);
        assert_eq!(settled.projected.item_a, 1);
        assert_eq!(settled.pending, 0);
    }

    #[test]
    fn revert_drops_only_the_given_ticket() {
        let standings = LiveStandings::new();
        let battle = battle();
        standings.seed(&battle);

        let rejected = standings.apply_tentative(battle.id, Side::ItemB);
        let _kept = standings.apply_tentative(battle.id, Side::ItemA);
        let snapshot = standings.revert(rejected).unwrap();

        assert_eq!(snapshot.projected, Tally { item_a: 1, item_b: 0 });
        assert_eq!(standings.revert(rejected), Err(TicketError::NotPending(rejected.id)));
    }

    #[test]
    fn stale_battle_does_not_overwrite_newer_counts() {
        let standings = LiveStandings::new();
        let mut newer = battle();
        newer.item_b.votes = 3;
        newer.revision = 5;
        standings.seed(&newer);

        let mut older = newer.clone();
        older.item_b.votes = 1;
        older.revision = 2;
        let snapshot = standings.seed(&older);

        assert_eq!(snapshot.confirmed.item_b, 3);
        assert_eq!(snapshot.revision, 5);
    }

    #[test]
    fn unseeded_battle_has_no_snapshot() {
        let standings = LiveStandings::new();
        let battle = battle();
        let ticket = standings.apply_tentative(battle.id, Side::ItemA);

        assert!(standings.snapshot(battle.id).is_none());
        standings.revert(ticket).unwrap();
        let stray = Ticket {
            battle_id: Uuid::new_v4(),
            ..ticket
        };
        assert_eq!(
            standings.revert(stray),
            Err(TicketError::UnknownBattle(stray.battle_id))
        );
    }

    #[test]
    fn rejected_votes_on_unknown_battles_leave_nothing_behind() {
        let standings = LiveStandings::new();
        for _ in 0..100 {
            let ticket = standings.apply_tentative(Uuid::new_v4(), Side::ItemA);
            standings.revert(ticket).unwrap();
        }
        assert_eq!(standings.tracked_battles(), 0);

        let seeded = battle();
        standings.seed(&seeded);
        let ticket = standings.apply_tentative(seeded.id, Side::ItemB);
        standings.revert(ticket).unwrap();
        assert_eq!(standings.tracked_battles(), 1);
    }

    #[test]
    fn ended_battles_are_evicted_once_settled() {
        let standings = LiveStandings::new();
        let mut battle = battle();
        standings.seed(&battle);
        let ticket = standings.apply_tentative(battle.id, Side::ItemA);

        battle.status = BattleStatus::Ended;
        battle.revision = 1;
        let snapshot = standings.seed(&battle);
        assert_eq!(snapshot.pending, 1);
        assert_eq!(standings.tracked_battles(), 1);

        standings.revert(ticket).unwrap();
        standings.seed(&battle);
        assert_eq!(standings.tracked_battles(), 0);
        assert!(standings.snapshot(battle.id).is_none());
    }
}
