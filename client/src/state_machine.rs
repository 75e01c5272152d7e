//! Authority-driven match transitions
//!
//! Player1 is the authority: its client is the only one that writes
//! timer-driven transitions. Every function here turns the snapshot it was
//! given into a conditional update that pins the status (and round where it
//! matters) it was derived from, so a duplicate or stale write is refused by
//! the store instead of being applied twice.
//!
//! | From | Trigger | To |
//! |---|---|---|
//! | `waiting` | both seats filled | `countdown` |
//! | `countdown` | timer zero, no winner yet | `in-progress` (new round) |
//! | `countdown` | timer zero, a score at the threshold | `gameover-countdown` |
//! | `in-progress` | timer zero, nobody solved it | `countdown` |
//! | `gameover-countdown` | timer zero | `in-progress` (round 1, scores reset) |
//!
//! Round wins are resolved by the server, and leaving is handled by the
//! server's presence tracking.

use rand::Rng;
use shared::{
    Match, MatchExpect, MatchPatch, MatchStatus, MatchUpdate, RoundPuzzle, MAX_WORD_LENGTH,
    MIN_WORD_LENGTH,
};

pub fn is_authority(record: &Match, player_name: &str) -> bool {
    record.is_authority(player_name)
}

/// Word length for the next puzzle request
pub fn random_word_length<R: Rng>(rng: &mut R) -> usize {
    rng.gen_range(MIN_WORD_LENGTH..=MAX_WORD_LENGTH)
}

/// `waiting` → `countdown` once both seats are filled
pub fn begin_countdown(record: &Match, player_name: &str) -> Option<MatchUpdate> {
    if !is_authority(record, player_name)
        || record.status != MatchStatus::Waiting
        || record.player2_name.is_none()
    {
        return None;
    }

    Some(MatchUpdate {
        expect: MatchExpect {
            status: Some(MatchStatus::Waiting),
            round: Some(record.round),
            seat_open: false,
        },
        patch: MatchPatch {
            status: Some(MatchStatus::Countdown),
            ..MatchPatch::default()
        },
    })
}

/// `countdown` → `gameover-countdown` when a score has reached the threshold
pub fn end_game(record: &Match) -> Option<MatchUpdate> {
    if record.status != MatchStatus::Countdown || !record.has_winner() {
        return None;
    }

    Some(MatchUpdate {
        expect: MatchExpect::at_round(MatchStatus::Countdown, record.round),
        patch: MatchPatch {
            status: Some(MatchStatus::GameoverCountdown),
            ..MatchPatch::default()
        },
    })
}

/// Issues a fresh round.
///
/// From `countdown` this bumps the round number. From `gameover-countdown`
/// (`reset` set) it starts a new game: scores back to zero and round 1. The
/// alphagram and solutions are written together as one value.
pub fn start_round(record: &Match, puzzle: RoundPuzzle, reset: bool) -> Option<MatchUpdate> {
    let from = if reset {
        MatchStatus::GameoverCountdown
    } else {
        MatchStatus::Countdown
    };
    if record.status != from || (!reset && record.has_winner()) {
        return None;
    }

    let mut patch = MatchPatch {
        status: Some(MatchStatus::InProgress),
        round: Some(record.round + 1),
        current: Some(Some(puzzle)),
        last_winner: Some(None),
        ..MatchPatch::default()
    };
    if reset {
        patch.round = Some(1);
        patch.player1_score = Some(0);
        patch.player2_score = Some(0);
    }

    Some(MatchUpdate {
        expect: MatchExpect::at_round(from, record.round),
        patch,
    })
}

/// `in-progress` → `countdown` when the round timer runs out unsolved
pub fn expire_round(record: &Match) -> Option<MatchUpdate> {
    if record.status != MatchStatus::InProgress {
        return None;
    }
    let puzzle = record.current.as_ref()?;

    Some(MatchUpdate {
        expect: MatchExpect::at_round(MatchStatus::InProgress, record.round),
        patch: MatchPatch {
            status: Some(MatchStatus::Countdown),
            last_winner: Some(None),
            last_answer: Some(Some(puzzle.solutions.clone())),
            ..MatchPatch::default()
        },
    })
}
