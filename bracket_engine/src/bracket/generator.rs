//! First-round generation.

use rand::Rng;
use rand::seq::SliceRandom;

use super::errors::BracketResult;
use super::models::{MatchKey, NewMatch, Team, TeamId, Tournament};
use super::shape::validate_bracket_size;

/// Shuffle the accepted teams and pair them into level-1 matches.
///
/// Consecutive teams of the shuffled order meet: (t0, t1) is match 1,
/// (t2, t3) match 2, and so on. Every match starts at midnight UTC of the
/// tournament's start date.
pub fn pair_teams<R: Rng + ?Sized>(
    tournament: &Tournament,
    teams: &[Team],
    rng: &mut R,
) -> BracketResult<Vec<NewMatch>> {
    validate_bracket_size(teams.len())?;

    let mut order: Vec<TeamId> = teams.iter().map(|team| team.id).collect();
    order.shuffle(rng);

    let start = tournament.first_round_start();
    Ok(order
        .chunks_exact(2)
        .enumerate()
        .map(|(idx, pair)| {
            let key = MatchKey::new(tournament.id, 1, idx as u32 + 1);
            NewMatch::scheduled(key, pair[0], pair[1], start)
        })
        .collect())
}
