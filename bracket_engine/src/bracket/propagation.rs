//! Winner propagation into the next round.
//!
//! Propagation is computed as a pure [`PropagationPlan`] from the processed
//! match and its partner, then applied as one atomic slot upsert. Nothing but
//! the match store is consulted, so a failed propagation can be re-run from
//! stored state at any time.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use super::errors::{BracketError, BracketResult};
use super::models::{Match, MatchKey, Slot};
use super::shape::{feeder_slot, is_final, next_key, partner_number};
use crate::config::EngineConfig;
use crate::store::{MatchStore, SlotUpsert, SlotWrite, StoreResult};

/// Slot writes for one next-round match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationPlan {
    pub target: MatchKey,
    pub first: SlotWrite,
    pub second: SlotWrite,
    /// Start time used only when the target match has to be created
    pub default_start: DateTime<Utc>,
}

impl PropagationPlan {
    /// True when the plan places no team at all
    pub fn places_nobody(&self) -> bool {
        let placed = |write: SlotWrite| matches!(write, SlotWrite::Set(Some(_)));
        !placed(self.first) && !placed(self.second)
    }
}

/// Plan the next-round writes for `processed`.
///
/// Returns `None` for the final. The processed match always writes its slot
/// (clearing it when it has no winner); the partner only contributes a slot
/// once it has a winner.
pub fn plan_propagation(
    processed: &Match,
    partner: Option<&Match>,
    rounds: u32,
    delay: Duration,
    now: DateTime<Utc>,
) -> Option<PropagationPlan> {
    let key = processed.key();
    if is_final(key, rounds) {
        return None;
    }

    let own = SlotWrite::Set(processed.winning_team);
    let other = match partner.and_then(|p| p.winning_team) {
        Some(winner) => SlotWrite::Set(Some(winner)),
        None => SlotWrite::Keep,
    };

    let (first, second) = match feeder_slot(processed.match_number) {
        Slot::First => (own, other),
        Slot::Second => (other, own),
    };

    Some(PropagationPlan {
        target: next_key(key),
        first,
        second,
        default_start: processed.end_datetime.unwrap_or(now) + delay,
    })
}

/// Outcome of one propagation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Propagation {
    /// The processed match is the final
    Final,
    /// Nothing to place and no next match to update
    Skipped,
    /// Next-round match written
    Applied(SlotUpsert),
}

async fn propagate_once(
    store: &dyn MatchStore,
    processed: &Match,
    rounds: u32,
    config: &EngineConfig,
) -> StoreResult<Propagation> {
    let partner_key = MatchKey::new(
        processed.tournament_id,
        processed.bracket_level,
        partner_number(processed.match_number),
    );
    let partner = store.find_by_key(partner_key).await?;

    let Some(plan) = plan_propagation(
        processed,
        partner.as_ref(),
        rounds,
        config.next_round_delay(),
        Utc::now(),
    ) else {
        return Ok(Propagation::Final);
    };

    // A cleared winner must not conjure an empty next-round match
    if plan.places_nobody() && store.find_by_key(plan.target).await?.is_none() {
        return Ok(Propagation::Skipped);
    }

    debug!(
        "Propagating match {} into {}: first={:?} second={:?}",
        processed.id, plan.target, plan.first, plan.second
    );

    let upsert = store
        .upsert_slots(plan.target, plan.first, plan.second, plan.default_start)
        .await?;
    Ok(Propagation::Applied(upsert))
}

/// Propagate `processed`, retrying transient store failures with backoff.
///
/// A failure here never undoes the processed match's stored result; it
/// surfaces as [`BracketError::PropagationFailed`] and can be retried.
pub async fn propagate_with_retry(
    store: &dyn MatchStore,
    processed: &Match,
    rounds: u32,
    config: &EngineConfig,
) -> BracketResult<Propagation> {
    let mut attempt = 0;
    loop {
        match propagate_once(store, processed, rounds, config).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_transient() && attempt < config.propagation_retries => {
                attempt += 1;
                let wait = config.backoff(attempt);
                warn!(
                    "Propagation of match {} failed ({e}), retry {attempt}/{} in {wait:?}",
                    processed.id, config.propagation_retries
                );
                tokio::time::sleep(wait).await;
            }
            Err(source) => {
                return Err(BracketError::PropagationFailed {
                    match_id: processed.id,
                    source,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::models::MatchStatus;
    use crate::store::InMemoryStore;

    fn completed(number: u32, winner: i64) -> Match {
        Match {
            id: i64::from(number),
            tournament_id: 1,
            bracket_level: 1,
            match_number: number,
            first_team: Some(winner),
            second_team: Some(winner + 100),
            start_datetime: Utc::now(),
            end_datetime: Some(Utc::now()),
            first_team_score: Some(2),
            second_team_score: Some(0),
            winning_team: Some(winner),
            status: MatchStatus::Completed,
        }
    }

    #[test]
    fn test_final_has_no_plan() {
        let mut m = completed(1, 5);
        m.bracket_level = 3;
        assert!(plan_propagation(&m, None, 3, Duration::days(1), Utc::now()).is_none());
    }

    #[test]
    fn test_lower_number_takes_first_slot() {
        let odd = completed(3, 10);
        let even = completed(4, 20);

        let from_even =
            plan_propagation(&even, Some(&odd), 3, Duration::days(1), Utc::now()).unwrap();
        assert_eq!(from_even.target, MatchKey::new(1, 2, 2));
        assert_eq!(from_even.first, SlotWrite::Set(Some(10)));
        assert_eq!(from_even.second, SlotWrite::Set(Some(20)));

        let from_odd =
            plan_propagation(&odd, Some(&even), 3, Duration::days(1), Utc::now()).unwrap();
        assert_eq!(from_odd.first, from_even.first);
        assert_eq!(from_odd.second, from_even.second);
    }

    #[test]
    fn test_unfinished_partner_keeps_slot() {
        let m = completed(2, 7);
        let mut partner = completed(1, 9);
        partner.winning_team = None;

        let plan = plan_propagation(&m, Some(&partner), 2, Duration::days(1), Utc::now()).unwrap();
        assert_eq!(plan.first, SlotWrite::Keep);
        assert_eq!(plan.second, SlotWrite::Set(Some(7)));
    }

    #[test]
    fn test_default_start_follows_end_time() {
        let m = completed(1, 7);
        let end = m.end_datetime.unwrap();
        let plan = plan_propagation(&m, None, 2, Duration::hours(24), Utc::now()).unwrap();
        assert_eq!(plan.default_start, end + Duration::hours(24));
    }

    #[tokio::test]
    async fn test_cleared_winner_without_target_is_skipped() {
        let store = InMemoryStore::new();
        let mut m = completed(1, 7);
        m.winning_team = None;

        let outcome = propagate_with_retry(&store, &m, 2, &EngineConfig::default())
            .await
            .unwrap();
        assert_eq!(outcome, Propagation::Skipped);
        assert_eq!(store.match_count(), 0);
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let store = InMemoryStore::new();
        store.fail_next_upserts(2);
        let config = EngineConfig {
            propagation_backoff_ms: 1,
            ..EngineConfig::default()
        };

        let outcome = propagate_with_retry(&store, &completed(1, 7), 2, &config)
            .await
            .unwrap();
        assert!(matches!(outcome, Propagation::Applied(ref u) if u.created));
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_budget() {
        let store = InMemoryStore::new();
        store.fail_next_upserts(5);
        let config = EngineConfig {
            propagation_retries: 1,
            propagation_backoff_ms: 1,
            ..EngineConfig::default()
        };

        let err = propagate_with_retry(&store, &completed(1, 7), 2, &config)
            .await
            .unwrap_err();
        match err {
            BracketError::PropagationFailed { match_id, source } => {
                assert_eq!(match_id, 1);
                assert!(source.is_transient());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
