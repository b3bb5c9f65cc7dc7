//! Pure heuristics over contents and battles: match quality, leader, live
//! status and trending.

use std::time::{Duration, SystemTime};

use rand::Rng;

use crate::dao::models::{
    BattleEntity, ContentEntity, LeaderSummary, LiveStatus, LiveStatusKind, SidePercentages,
    Winner,
};

const HOUR: Duration = Duration::from_secs(3600);
const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);
/// Votes a battle needs before it can be flagged hot.
const HOT_VOTE_THRESHOLD: u64 = 50;

/// Round `value` to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn age(at: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(at).unwrap_or_default()
}

/// Advisory match quality of pairing `a` with `b`.
///
/// Same category is worth 50, similar like counts up to 30, fresh content 20,
/// plus a random jitter in `[0, 10)`.
pub fn match_score<R: Rng + ?Sized>(
    a: &ContentEntity,
    b: &ContentEntity,
    now: SystemTime,
    rng: &mut R,
) -> f64 {
    let mut score = 0.0;

    if a.pairing_category() == b.pairing_category() {
        score += 50.0;
    }

    let popularity_gap = a.like_count.abs_diff(b.like_count) as f64;
    score += (30.0 - popularity_gap / 10.0).max(0.0);

    let average_age = (age(a.created_at, now) + age(b.created_at, now)) / 2;
    if average_age < WEEK {
        score += 20.0;
    }

    score + rng.random_range(0.0..10.0)
}

/// Leader summary for the given side votes. Strictly more votes wins; equal
/// counts are a tie at 50%.
pub fn leader(item_a: u64, item_b: u64, now: SystemTime) -> LeaderSummary {
    let total = item_a + item_b;
    let (winner, percentage) = match item_a.cmp(&item_b) {
        std::cmp::Ordering::Greater => (Winner::ItemA, share(item_a, total)),
        std::cmp::Ordering::Less => (Winner::ItemB, share(item_b, total)),
        std::cmp::Ordering::Equal => (Winner::Tie, 50),
    };

    LeaderSummary {
        winner,
        percentage,
        margin: item_a.abs_diff(item_b),
        last_updated: now,
    }
}

fn share(votes: u64, total: u64) -> u8 {
    if total == 0 {
        return 50;
    }
    (votes as f64 / total as f64 * 100.0).round() as u8
}

/// Classify how close the battle is.
pub fn live_status(item_a: u64, item_b: u64) -> LiveStatus {
    let total = item_a + item_b;
    if total == 0 {
        return LiveStatus {
            status: LiveStatusKind::Waiting,
            message: "Waiting for the first vote".into(),
            percentage: SidePercentages {
                item_a: 50,
                item_b: 50,
            },
            margin: 0,
        };
    }

    let percentage_a = share(item_a, total);
    let margin = item_a.abs_diff(item_b);
    let ahead = if item_a > item_b { "A" } else { "B" };
    let (status, message) = if margin as f64 > total as f64 * 0.2 {
        (LiveStatusKind::Dominant, format!("{ahead} is pulling away"))
    } else if margin as f64 > total as f64 * 0.1 {
        (LiveStatusKind::Leading, format!("{ahead} has the edge"))
    } else {
        (LiveStatusKind::Competitive, "Neck and neck".to_owned())
    };

    LiveStatus {
        status,
        message,
        percentage: SidePercentages {
            item_a: percentage_a,
            item_b: 100 - percentage_a,
        },
        margin,
    }
}

/// Live status derived from the battle's current side votes.
pub fn battle_live_status(battle: &BattleEntity) -> LiveStatus {
    live_status(battle.item_a.votes, battle.item_b.votes)
}

/// Engagement-weighted popularity decaying linearly to zero over a week.
pub fn trending_score(battle: &BattleEntity, now: SystemTime) -> f64 {
    let age_hours = age(battle.created_at, now).as_secs_f64() / HOUR.as_secs_f64();
    let time_weight = (1.0 - age_hours / 168.0).max(0.0);
    let base = battle.total_votes as f64 * 2.0
        + battle.view_count as f64 * 0.5
        + battle.comment_count as f64 * 3.0
        + battle.metrics.engagement_rate * 100.0;

    round_to(base * time_weight, 2)
}

/// Recent activity within the last hour on a battle with enough votes.
pub fn is_hot(battle: &BattleEntity, now: SystemTime) -> bool {
    age(battle.last_activity(), now) < HOUR && battle.total_votes > HOT_VOTE_THRESHOLD
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::dao::{
        models::{BattleDraft, MatchingMethod},
        test_support::content,
    };

    fn battle() -> BattleEntity {
        let a = content("alice", "music");
        let b = content("bob", "music");
        let now = SystemTime::now();
        let draft = BattleDraft {
            id: uuid::Uuid::new_v4(),
            content_a: a.id,
            content_b: b.id,
            initiator_id: "system".into(),
            initiator_name: "System".into(),
            method: MatchingMethod::FlexibleAlgorithm,
            score: 0.0,
            created_at: now,
            ends_at: now + WEEK,
        };
        BattleEntity::open(&a, &b, &draft)
    }

    #[test]
    fn leader_picks_strictly_greater_side() {
        let summary = leader(7, 3, SystemTime::now());
        assert_eq!(summary.winner, Winner::ItemA);
        assert_eq!(summary.percentage, 70);
        assert_eq!(summary.margin, 4);

        let summary = leader(1, 2, SystemTime::now());
        assert_eq!(summary.winner, Winner::ItemB);
        assert_eq!(summary.percentage, 67);
    }

    #[test]
    fn equal_votes_tie_at_fifty() {
        let summary = leader(5, 5, SystemTime::now());
        assert_eq!(summary.winner, Winner::Tie);
        assert_eq!(summary.percentage, 50);
        assert_eq!(summary.margin, 0);
    }

    #[test]
    fn fresh_same_category_pair_scores_between_100_and_110() {
        let a = content("alice", "music");
        let b = content("bob", "music");
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            let score = match_score(&a, &b, SystemTime::now(), &mut rng);
            assert!((100.0..110.0).contains(&score), "score {score} out of range");
        }
    }

    #[test]
    fn popularity_gap_and_age_reduce_score() {
        let mut a = content("alice", "music");
        let mut b = content("bob", "food");
        a.like_count = 500;
        b.like_count = 0;
        a.created_at -= 30 * 24 * HOUR;
        b.created_at -= 30 * 24 * HOUR;
        let mut rng = StdRng::seed_from_u64(1);

        let score = match_score(&a, &b, SystemTime::now(), &mut rng);
        assert!((0.0..10.0).contains(&score));
    }

    #[test]
    fn live_status_thresholds() {
        assert_eq!(live_status(0, 0).status, LiveStatusKind::Waiting);
        assert_eq!(live_status(0, 0).percentage.item_a, 50);

        let dominant = live_status(7, 3);
        assert_eq!(dominant.status, LiveStatusKind::Dominant);
        assert_eq!(dominant.percentage.item_a, 70);
        assert_eq!(dominant.percentage.item_b, 30);
        assert_eq!(dominant.margin, 4);

        assert_eq!(live_status(43, 57).status, LiveStatusKind::Leading);
        assert_eq!(live_status(50, 50).status, LiveStatusKind::Competitive);
        assert_eq!(live_status(46, 54).status, LiveStatusKind::Competitive);
    }

    #[test]
    fn side_percentages_always_sum_to_hundred() {
        for (a, b) in [(1, 2), (2, 1), (1, 5), (333, 667)] {
            let status = live_status(a, b);
            assert_eq!(
                u32::from(status.percentage.item_a) + u32::from(status.percentage.item_b),
                100
            );
        }
    }

    #[test]
    fn trending_decays_over_a_week() {
        let mut battle = battle();
        battle.total_votes = 10;
        battle.view_count = 4;
        battle.comment_count = 1;
        battle.metrics.engagement_rate = 0.25;
        let now = battle.created_at;

        assert_eq!(trending_score(&battle, now), 50.0);
        assert_eq!(trending_score(&battle, now + 84 * HOUR), 25.0);
        assert_eq!(trending_score(&battle, now + 2 * WEEK), 0.0);
    }

    #[test]
    fn hot_needs_recent_activity_and_votes() {
        let mut battle = battle();
        let now = battle.created_at + Duration::from_secs(60);
        battle.total_votes = 51;
        assert!(is_hot(&battle, now));

        battle.total_votes = 50;
        assert!(!is_hot(&battle, now));

        battle.total_votes = 80;
        battle.last_vote_at = Some(battle.created_at);
        assert!(!is_hot(&battle, battle.created_at + 2 * HOUR));
    }

    #[test]
    fn rounding_helper() {
        assert_eq!(round_to(0.123_456, 3), 0.123);
        assert_eq!(round_to(2.005, 0), 2.0);
    }
}
