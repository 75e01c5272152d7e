//! The match record and the conditional updates that mutate it

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle state of a match, rendered with the kebab-case names clients display
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchStatus {
    Waiting,
    Countdown,
    InProgress,
    GameoverCountdown,
    Closed,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Waiting => "waiting",
            MatchStatus::Countdown => "countdown",
            MatchStatus::InProgress => "in-progress",
            MatchStatus::GameoverCountdown => "gameover-countdown",
            MatchStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(MatchStatus::Waiting),
            "countdown" => Ok(MatchStatus::Countdown),
            "in-progress" => Ok(MatchStatus::InProgress),
            "gameover-countdown" => Ok(MatchStatus::GameoverCountdown),
            "closed" => Ok(MatchStatus::Closed),
            other => Err(format!("unknown match status: {}", other)),
        }
    }
}

/// Alphagram and canonical solutions of the live round.
///
/// The two are only ever written as one value, so a record can never hold
/// one without the other.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RoundPuzzle {
    pub alphagram: String,
    /// Sorted, comma-joined solution list
    pub solutions: String,
}

impl RoundPuzzle {
    /// Builds the canonical form from an unordered solution list
    pub fn new(alphagram: &str, solutions: &[String]) -> Self {
        Self {
            alphagram: alphagram.trim().to_uppercase(),
            solutions: crate::join_answers(solutions),
        }
    }

    pub fn solution_list(&self) -> Vec<String> {
        crate::split_answers(&self.solutions)
    }

    pub fn solution_count(&self) -> usize {
        self.solution_list().len()
    }
}

/// The authoritative match record shared by both players
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Match {
    pub id: String,
    pub lexicon: String,
    pub player1_name: String,
    pub player2_name: Option<String>,
    pub status: MatchStatus,
    pub round: u32,
    pub player1_score: u32,
    pub player2_score: u32,
    pub current: Option<RoundPuzzle>,
    pub last_answer: Option<String>,
    pub last_winner: Option<String>,
    /// Bumped by the store on every committed update
    pub revision: u64,
}

/// A write that would break one of the record's invariants
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PatchViolation {
    #[error("the second seat is already taken")]
    SeatTaken,
    #[error("round may only advance by one or restart a finished game")]
    RoundJump,
    #[error("scores may only grow by one up to the winning score or restart a finished game")]
    ScoreJump,
}

impl Match {
    /// Seeds a fresh record for the creating player
    pub fn new(id: &str, player1_name: &str, lexicon: &str) -> Self {
        Self {
            id: id.to_string(),
            lexicon: lexicon.to_string(),
            player1_name: player1_name.to_string(),
            player2_name: None,
            status: MatchStatus::Waiting,
            round: 0,
            player1_score: 0,
            player2_score: 0,
            current: None,
            last_answer: None,
            last_winner: None,
            revision: 0,
        }
    }

    pub fn current_alphagram(&self) -> Option<&str> {
        self.current.as_ref().map(|p| p.alphagram.as_str())
    }

    pub fn current_solutions(&self) -> Option<&str> {
        self.current.as_ref().map(|p| p.solutions.as_str())
    }

    /// Player1 created the match and drives every timer transition
    pub fn is_authority(&self, player_name: &str) -> bool {
        self.player1_name == player_name
    }

    pub fn is_full(&self) -> bool {
        self.player2_name.is_some()
    }

    pub fn has_player(&self, player_name: &str) -> bool {
        self.player1_name == player_name || self.player2_name.as_deref() == Some(player_name)
    }

    pub fn opponent_of(&self, player_name: &str) -> Option<&str> {
        if self.player1_name == player_name {
            self.player2_name.as_deref()
        } else if self.player2_name.as_deref() == Some(player_name) {
            Some(self.player1_name.as_str())
        } else {
            None
        }
    }

    pub fn score_of(&self, player_name: &str) -> Option<u32> {
        if self.player1_name == player_name {
            Some(self.player1_score)
        } else if self.player2_name.as_deref() == Some(player_name) {
            Some(self.player2_score)
        } else {
            None
        }
    }

    /// True once either score has hit the winning threshold
    pub fn has_winner(&self) -> bool {
        self.player1_score >= crate::WINNING_SCORE || self.player2_score >= crate::WINNING_SCORE
    }

    /// Checks `patch` against the invariants every write keeps.
    ///
    /// The second seat is claimed once. Round and scores move one step
    /// forward, except when a finished game restarts at round 1 with both
    /// scores at zero.
    pub fn check(&self, patch: &MatchPatch) -> Result<(), PatchViolation> {
        if patch.player2_name.is_some() && self.player2_name.is_some() {
            return Err(PatchViolation::SeatTaken);
        }

        let new_game = self.status == MatchStatus::GameoverCountdown && patch.is_new_game();
        if let Some(round) = patch.round {
            if round != self.round.saturating_add(1) && !new_game {
                return Err(PatchViolation::RoundJump);
            }
        }

        let step = |current: u32, next: Option<u32>| match next {
            None => true,
            Some(0) if new_game => true,
            Some(score) => score == current.saturating_add(1) && score <= crate::WINNING_SCORE,
        };
        if !step(self.player1_score, patch.player1_score)
            || !step(self.player2_score, patch.player2_score)
        {
            return Err(PatchViolation::ScoreJump);
        }
        Ok(())
    }

    /// Applies every field the patch touches. A claimed seat is never replaced.
    pub fn apply(&mut self, patch: &MatchPatch) {
        if let (None, Some(name)) = (&self.player2_name, &patch.player2_name) {
            self.player2_name = Some(name.clone());
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(round) = patch.round {
            self.round = round;
        }
        if let Some(score) = patch.player1_score {
            self.player1_score = score;
        }
        if let Some(score) = patch.player2_score {
            self.player2_score = score;
        }
        if let Some(current) = &patch.current {
            self.current = current.clone();
        }
        if let Some(answer) = &patch.last_answer {
            self.last_answer = answer.clone();
        }
        if let Some(winner) = &patch.last_winner {
            self.last_winner = winner.clone();
        }
    }
}

/// Prior field values a conditional update requires
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct MatchExpect {
    pub status: Option<MatchStatus>,
    pub round: Option<u32>,
    /// Require the second seat to still be empty
    pub seat_open: bool,
}

impl MatchExpect {
    pub fn status(status: MatchStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn at_round(status: MatchStatus, round: u32) -> Self {
        Self {
            status: Some(status),
            round: Some(round),
            seat_open: false,
        }
    }

    pub fn holds(&self, record: &Match) -> bool {
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if let Some(round) = self.round {
            if record.round != round {
                return false;
            }
        }
        !(self.seat_open && record.player2_name.is_some())
    }
}

/// Field-subset write. Nullable fields use a nested `Option`: the outer layer
/// says whether the field is touched, the inner one is the new value.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct MatchPatch {
    pub player2_name: Option<String>,
    pub status: Option<MatchStatus>,
    pub round: Option<u32>,
    pub player1_score: Option<u32>,
    pub player2_score: Option<u32>,
    pub current: Option<Option<RoundPuzzle>>,
    pub last_answer: Option<Option<String>>,
    pub last_winner: Option<Option<String>>,
}

impl MatchPatch {
    pub fn is_empty(&self) -> bool {
        *self == MatchPatch::default()
    }

    /// Round 1 with both scores at zero
    pub fn is_new_game(&self) -> bool {
        self.round == Some(1) && self.player1_score == Some(0) && self.player2_score == Some(0)
    }

    pub fn touches_scores(&self) -> bool {
        self.player1_score.is_some() || self.player2_score.is_some()
    }
}

/// A conditional update the store applies atomically or not at all
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MatchUpdate {
    pub expect: MatchExpect,
    pub patch: MatchPatch,
}
