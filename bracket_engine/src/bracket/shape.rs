//! Bracket shape arithmetic.
//!
//! A bracket of N = 2^k teams has k levels; level L holds N / 2^L matches.
//! Matches 2i-1 and 2i of level L feed match i of level L+1, the odd one
//! into the first slot.

use super::errors::{BracketError, BracketResult};
use super::models::{MatchKey, Slot};

/// Number of rounds for `team_count` teams, or `None` when the count is not a
/// power of two >= 2
pub fn total_rounds(team_count: usize) -> Option<u32> {
    if team_count >= 2 && team_count.is_power_of_two() {
        Some(team_count.trailing_zeros())
    } else {
        None
    }
}

/// Check the accepted team count and return the number of rounds
pub fn validate_bracket_size(team_count: usize) -> BracketResult<u32> {
    total_rounds(team_count).ok_or(BracketError::InvalidBracketSize { teams: team_count })
}

/// Matches in `level` of a bracket of `team_count` teams
pub fn matches_in_level(team_count: usize, level: u32) -> usize {
    if level == 0 || level >= usize::BITS {
        return 0;
    }
    team_count >> level
}

/// The other feeder of the same next-round match
pub fn partner_number(match_number: u32) -> u32 {
    if match_number % 2 == 1 {
        match_number + 1
    } else {
        match_number - 1
    }
}

/// Key of the match the winner of `key` advances to
pub fn next_key(key: MatchKey) -> MatchKey {
    MatchKey::new(
        key.tournament_id,
        key.bracket_level + 1,
        key.match_number.div_ceil(2),
    )
}

/// Slot of the next-round match fed by `match_number`
pub fn feeder_slot(match_number: u32) -> Slot {
    if match_number % 2 == 1 {
        Slot::First
    } else {
        Slot::Second
    }
}

/// Whether `key` is the final of a bracket with `rounds` levels
pub fn is_final(key: MatchKey, rounds: u32) -> bool {
    key.bracket_level >= rounds
}
