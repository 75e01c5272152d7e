use serde::{Deserialize, Serialize};

mod record;

pub use record::{
    Match, MatchExpect, MatchPatch, MatchStatus, MatchUpdate, PatchViolation, RoundPuzzle,
};

pub const COUNTDOWN_SECONDS: u32 = 4;
pub const ROUND_SECONDS: u32 = 15;
pub const GAMEOVER_SECONDS: u32 = 30;
pub const WINNING_SCORE: u32 = 15;
pub const MIN_WORD_LENGTH: usize = 7;
pub const MAX_WORD_LENGTH: usize = 8;
pub const MAX_DATAGRAM_SIZE: usize = 65_507;
pub const DEFAULT_LEXICON: &str = "NWL23";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    ListMatches,
    CreateMatch {
        player_name: String,
        lexicon: String,
    },
    JoinMatch {
        match_id: String,
        player_name: String,
    },
    Subscribe {
        match_id: String,
        player_name: String,
    },
    Heartbeat,
    UpdateMatch {
        match_id: String,
        update: MatchUpdate,
    },
    FetchPuzzle {
        lexicon: String,
        word_length: usize,
    },
    SubmitAnswer {
        match_id: String,
        answer: String,
        player_name: String,
    },
    Leave {
        match_id: String,
        player_name: String,
    },

    MatchList {
        matches: Vec<Match>,
    },
    MatchCreated {
        snapshot: Match,
    },
    JoinAccepted {
        snapshot: Match,
    },
    Rejected {
        reason: String,
    },
    Snapshot {
        snapshot: Match,
    },
    MatchRemoved {
        match_id: String,
    },
    Puzzle {
        alphagram: String,
        solutions: Vec<String>,
    },
    PuzzleNotFound {
        lexicon: String,
        word_length: usize,
    },
    SubmitResult {
        match_id: String,
        accepted: bool,
    },
}

/// Phase durations, in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub countdown_secs: u32,
    pub round_secs: u32,
    pub gameover_secs: u32,
}

impl Timings {
    /// How long a phase lasts; `None` for phases no timer drives
    pub fn nominal(&self, status: MatchStatus) -> Option<u32> {
        match status {
            MatchStatus::Countdown => Some(self.countdown_secs),
            MatchStatus::InProgress => Some(self.round_secs),
            MatchStatus::GameoverCountdown => Some(self.gameover_secs),
            MatchStatus::Waiting | MatchStatus::Closed => None,
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            countdown_secs: COUNTDOWN_SECONDS,
            round_secs: ROUND_SECONDS,
            gameover_secs: GAMEOVER_SECONDS,
        }
    }
}

/// Guesses compare case-insensitively and ignore surrounding whitespace
pub fn normalize_guess(guess: &str) -> String {
    guess.trim().to_uppercase()
}

/// Canonical comma-joined form: normalized, deduplicated, sorted
pub fn join_answers(answers: &[String]) -> String {
    let mut words: Vec<String> = answers
        .iter()
        .map(|a| normalize_guess(a))
        .filter(|a| !a.is_empty())
        .collect();
    words.sort();
    words.dedup();
    words.join(",")
}

pub fn split_answers(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(normalize_guess)
        .filter(|a| !a.is_empty())
        .collect()
}

/// Letters of a word in sorted order
pub fn alphagram_of(word: &str) -> String {
    let mut letters: Vec<char> = normalize_guess(word).chars().collect();
    letters.sort_unstable();
    letters.into_iter().collect()
}
