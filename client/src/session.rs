//! Client session: local timers and guess buffering against authoritative snapshots
//!
//! The session never owns match state. It keeps the last snapshot the server
//! sent and derives everything else from it:
//! - a display timer, reset to the phase's nominal length whenever the
//!   snapshot's status changes, ticked once per second
//! - the local player's correct guesses for the live round, cleared whenever
//!   the puzzle changes
//!
//! When the authority's timer runs out the session asks for the matching
//! transition (see `state_machine`). Everything it wants sent is returned as
//! [`Action`]s; the network layer performs them.

use crate::state_machine;
use log::{debug, warn};
use rand::Rng;
use shared::{join_answers, normalize_guess, Match, MatchStatus, MatchUpdate, RoundPuzzle, Timings};
use std::collections::BTreeSet;

/// Work for the network layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Update(MatchUpdate),
    FetchPuzzle { lexicon: String, word_length: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    NoActiveRound,
    NotASolution,
    AlreadyGuessed,
    Correct { found: usize, total: usize },
    /// Every solution found; `answer` goes to the resolver exactly once
    Complete { answer: String },
}

/// The name `requested` is stored under in `record`.
///
/// The lobby trims display names, so the session must use the stored form to
/// be recognised as a player.
pub fn seated_name<'a>(record: &'a Match, requested: &str) -> Option<&'a str> {
    let requested = requested.trim();
    if record.player1_name == requested {
        Some(record.player1_name.as_str())
    } else {
        record.player2_name.as_deref().filter(|name| *name == requested)
    }
}

/// A puzzle request in flight, and the round it was requested for
#[derive(Debug, Clone, Copy)]
struct PendingRound {
    reset: bool,
    round: u32,
}

pub struct Session {
    player_name: String,
    timings: Timings,
    snapshot: Option<Match>,
    timer: Option<u32>,
    guessed: BTreeSet<String>,
    submitted: bool,
    pending_round: Option<PendingRound>,
    removed: bool,
}

impl Session {
    pub fn new(player_name: &str, timings: Timings) -> Self {
        Self {
            player_name: player_name.to_string(),
            timings,
            snapshot: None,
            timer: None,
            guessed: BTreeSet::new(),
            submitted: false,
            pending_round: None,
            removed: false,
        }
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn snapshot(&self) -> Option<&Match> {
        self.snapshot.as_ref()
    }

    pub fn timer(&self) -> Option<u32> {
        self.timer
    }

    pub fn guessed(&self) -> &BTreeSet<String> {
        &self.guessed
    }

    pub fn is_authority(&self) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|m| state_machine::is_authority(m, &self.player_name))
    }

    /// The match was closed or deleted; the session is over
    pub fn is_over(&self) -> bool {
        self.removed
            || self
                .snapshot
                .as_ref()
                .is_some_and(|m| m.status == MatchStatus::Closed)
    }

    /// Takes in a new authoritative snapshot. Snapshots older than the one
    /// already held are dropped.
    pub fn apply_snapshot(&mut self, snapshot: Match) -> Vec<Action> {
        if let Some(previous) = &self.snapshot {
            if previous.id == snapshot.id && snapshot.revision < previous.revision {
                debug!(
                    "Stale snapshot {} of match {} dropped",
                    snapshot.revision, snapshot.id
                );
                return Vec::new();
            }
        }

        let (status_changed, puzzle_changed) = match &self.snapshot {
            Some(previous) => (
                previous.status != snapshot.status,
                previous.current != snapshot.current || previous.round != snapshot.round,
            ),
            None => (true, true),
        };

        if puzzle_changed {
            self.guessed.clear();
            self.submitted = false;
        }
        if status_changed {
            self.timer = self.timings.nominal(snapshot.status);
            self.pending_round = None;
            debug!("Match {} is now {}", snapshot.id, snapshot.status);
        }

        let actions = state_machine::begin_countdown(&snapshot, &self.player_name)
            .map(Action::Update)
            .into_iter()
            .collect();
        self.snapshot = Some(snapshot);
        actions
    }

    pub fn mark_removed(&mut self) {
        self.removed = true;
        self.timer = None;
        self.pending_round = None;
    }

    /// Advances the local timer by one second
    pub fn tick<R: Rng>(&mut self, rng: &mut R) -> Vec<Action> {
        let remaining = match self.timer {
            Some(remaining) if remaining > 0 => remaining - 1,
            _ => return Vec::new(),
        };
        self.timer = Some(remaining);

        if remaining > 0 || !self.is_authority() {
            return Vec::new();
        }
        self.on_timer_expired(rng)
    }

    fn on_timer_expired<R: Rng>(&mut self, rng: &mut R) -> Vec<Action> {
        let Some(record) = self.snapshot.as_ref() else {
            return Vec::new();
        };

        let reset = match record.status {
            MatchStatus::Countdown => {
                if let Some(update) = state_machine::end_game(record) {
                    return vec![Action::Update(update)];
                }
                false
            }
            MatchStatus::GameoverCountdown => true,
            MatchStatus::InProgress => {
                return state_machine::expire_round(record)
                    .map(Action::Update)
                    .into_iter()
                    .collect();
            }
            MatchStatus::Waiting | MatchStatus::Closed => return Vec::new(),
        };

        self.pending_round = Some(PendingRound {
            reset,
            round: record.round,
        });
        vec![Action::FetchPuzzle {
            lexicon: record.lexicon.clone(),
            word_length: state_machine::random_word_length(rng),
        }]
    }

    /// Turns a fetched puzzle into the round-start update, if still wanted
    pub fn on_puzzle(&mut self, alphagram: &str, solutions: &[String]) -> Option<Action> {
        let pending = self.pending_round.take()?;
        let record = self.snapshot.as_ref()?;
        if record.round != pending.round {
            return None;
        }

        let puzzle = RoundPuzzle::new(alphagram, solutions);
        state_machine::start_round(record, puzzle, pending.reset).map(Action::Update)
    }

    /// The round start is abandoned; the match waits in its current phase
    pub fn on_puzzle_not_found(&mut self, lexicon: &str, word_length: usize) {
        if self.pending_round.take().is_some() {
            warn!(
                "No {}-letter puzzle available in {}, round not started",
                word_length, lexicon
            );
        }
    }

    /// Checks a typed guess against the live round
    pub fn guess(&mut self, input: &str) -> GuessOutcome {
        let Some(puzzle) = self
            .snapshot
            .as_ref()
            .filter(|m| m.status == MatchStatus::InProgress)
            .and_then(|m| m.current.as_ref())
        else {
            return GuessOutcome::NoActiveRound;
        };

        let word = normalize_guess(input);
        let solutions = puzzle.solution_list();
        if !solutions.contains(&word) {
            return GuessOutcome::NotASolution;
        }
        if !self.guessed.insert(word) {
            return GuessOutcome::AlreadyGuessed;
        }

        let found = self.guessed.len();
        let total = solutions.len();
        if found == total && !self.submitted {
            self.submitted = true;
            let guessed: Vec<String> = self.guessed.iter().cloned().collect();
            return GuessOutcome::Complete {
                answer: join_answers(&guessed),
            };
        }
        GuessOutcome::Correct { found, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::{MatchPatch, COUNTDOWN_SECONDS, ROUND_SECONDS, WINNING_SCORE};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    fn solutions() -> Vec<String> {
        vec![
            "LETTERS".to_string(),
            "STERLET".to_string(),
            "TRESTLE".to_string(),
        ]
    }

    fn seated() -> Match {
        let mut m = Match::new("m1", "Alice", "NWL23");
        m.player2_name = Some("Bob".to_string());
        m
    }

    fn live_round() -> Match {
        let mut m = seated();
        m.status = MatchStatus::InProgress;
        m.round = 1;
        m.current = Some(RoundPuzzle::new("EELRSTT", &solutions()));
        m
    }

    fn apply(record: &Match, action: &Action) -> Match {
        let Action::Update(update) = action else {
            panic!("expected an update, got {:?}", action);
        };
        assert!(update.expect.holds(record));
        let mut next = record.clone();
        next.apply(&update.patch);
        next
    }

    fn run_timer(session: &mut Session) -> Vec<Action> {
        let mut rng = rng();
        let mut actions = Vec::new();
        for _ in 0..60 {
            actions.extend(session.tick(&mut rng));
        }
        actions
    }

    #[test]
    fn test_seated_name_matches_trimmed_record() {
        let m = seated();
        assert_eq!(seated_name(&m, " Alice "), Some("Alice"));
        assert_eq!(seated_name(&m, "Bob\t"), Some("Bob"));
        assert_eq!(seated_name(&m, "Carol"), None);

        let mut alice = Session::new(seated_name(&m, " Alice").unwrap(), Timings::default());
        assert_eq!(alice.apply_snapshot(m).len(), 1);
        assert!(alice.is_authority());
    }

    #[test]
    fn test_stale_snapshot_is_dropped() {
        let mut bob = Session::new("Bob", Timings::default());
        let waiting = seated();
        let mut counting = seated();
        counting.status = MatchStatus::Countdown;
        counting.revision = 2;

        bob.apply_snapshot(counting);
        assert!(bob.apply_snapshot(waiting).is_empty());
        assert_eq!(bob.snapshot().map(|m| m.status), Some(MatchStatus::Countdown));
        assert_eq!(bob.timer(), Some(COUNTDOWN_SECONDS));
    }

    #[test]
    fn test_authority_starts_countdown_when_seats_fill() {
        let mut alice = Session::new("Alice", Timings::default());
        let mut bob = Session::new("Bob", Timings::default());

        assert!(alice.apply_snapshot(Match::new("m1", "Alice", "NWL23")).is_empty());

        let actions = alice.apply_snapshot(seated());
        assert_eq!(actions.len(), 1);
        assert_eq!(apply(&seated(), &actions[0]).status, MatchStatus::Countdown);

        assert!(bob.apply_snapshot(seated()).is_empty());
    }

    #[test]
    fn test_timer_resets_only_on_status_change() {
        let mut session = Session::new("Bob", Timings::default());
        let mut m = seated();
        m.status = MatchStatus::Countdown;
        session.apply_snapshot(m.clone());
        assert_eq!(session.timer(), Some(COUNTDOWN_SECONDS));

        session.tick(&mut rng());
        assert_eq!(session.timer(), Some(COUNTDOWN_SECONDS - 1));

        m.player2_score = 1;
        session.apply_snapshot(m.clone());
        assert_eq!(session.timer(), Some(COUNTDOWN_SECONDS - 1));

        m.status = MatchStatus::InProgress;
        session.apply_snapshot(m);
        assert_eq!(session.timer(), Some(ROUND_SECONDS));
    }

    #[test]
    fn test_non_authority_timer_never_acts() {
        let mut bob = Session::new("Bob", Timings::default());
        let mut m = seated();
        m.status = MatchStatus::Countdown;
        bob.apply_snapshot(m);

        assert!(run_timer(&mut bob).is_empty());
        assert_eq!(bob.timer(), Some(0));
    }

    #[test]
    fn test_countdown_expiry_fetches_then_starts_round() {
        let mut alice = Session::new("Alice", Timings::default());
        let mut m = seated();
        m.status = MatchStatus::Countdown;
        alice.apply_snapshot(m.clone());

        let actions = run_timer(&mut alice);
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::FetchPuzzle {
                lexicon,
                word_length,
            } => {
                assert_eq!(lexicon, "NWL23");
                assert!((7..=8).contains(word_length));
            }
            other => panic!("expected a puzzle fetch, got {:?}", other),
        }

        let start = alice.on_puzzle("EELRSTT", &solutions()).unwrap();
        let m = apply(&m, &start);
        assert_eq!(m.status, MatchStatus::InProgress);
        assert_eq!(m.round, 1);

        assert!(alice.on_puzzle("EELRSTT", &solutions()).is_none());
    }

    #[test]
    fn test_countdown_expiry_with_winner_ends_game() {
        let mut alice = Session::new("Alice", Timings::default());
        let mut m = seated();
        m.status = MatchStatus::Countdown;
        m.player1_score = WINNING_SCORE;
        alice.apply_snapshot(m.clone());

        let actions = run_timer(&mut alice);
        assert_eq!(actions.len(), 1);
        assert_eq!(apply(&m, &actions[0]).status, MatchStatus::GameoverCountdown);
    }

    #[test]
    fn test_round_expiry_and_gameover_expiry() {
        let mut alice = Session::new("Alice", Timings::default());
        let live = live_round();
        alice.apply_snapshot(live.clone());
        let actions = run_timer(&mut alice);
        assert_eq!(apply(&live, &actions[0]).status, MatchStatus::Countdown);

        let mut over = seated();
        over.status = MatchStatus::GameoverCountdown;
        over.round = 20;
        over.player2_score = WINNING_SCORE;
        alice.apply_snapshot(over.clone());
        let actions = run_timer(&mut alice);
        assert!(matches!(actions[0], Action::FetchPuzzle { .. }));

        let fresh = apply(&over, &alice.on_puzzle("EELRSTT", &solutions()).unwrap());
        assert_eq!(fresh.round, 1);
        assert_eq!(fresh.player2_score, 0);
    }

    #[test]
    fn test_puzzle_not_found_abandons_round() {
        let mut alice = Session::new("Alice", Timings::default());
        let mut m = seated();
        m.status = MatchStatus::Countdown;
        alice.apply_snapshot(m);
        run_timer(&mut alice);

        alice.on_puzzle_not_found("NWL23", 8);
        assert!(alice.on_puzzle("EELRSTT", &solutions()).is_none());
    }

    #[test]
    fn test_guess_flow_submits_once() {
        let mut bob = Session::new("Bob", Timings::default());
        bob.apply_snapshot(live_round());

        assert_eq!(bob.guess("settler"), GuessOutcome::NotASolution);
        assert_eq!(bob.guess(" letters "), GuessOutcome::Correct { found: 1, total: 3 });
        assert_eq!(bob.guess("LETTERS"), GuessOutcome::AlreadyGuessed);
        assert_eq!(bob.guess("Trestle"), GuessOutcome::Correct { found: 2, total: 3 });
        assert_eq!(
            bob.guess("sterlet"),
            GuessOutcome::Complete {
                answer: "LETTERS,STERLET,TRESTLE".to_string()
            }
        );
        assert_eq!(bob.guess("sterlet"), GuessOutcome::AlreadyGuessed);
    }

    #[test]
    fn test_guesses_cleared_on_new_puzzle() {
        let mut bob = Session::new("Bob", Timings::default());
        let mut m = live_round();
        bob.apply_snapshot(m.clone());
        bob.guess("letters");
        assert_eq!(bob.guessed().len(), 1);

        m.apply(&MatchPatch {
            status: Some(MatchStatus::Countdown),
            ..MatchPatch::default()
        });
        bob.apply_snapshot(m.clone());
        assert_eq!(bob.guess("letters"), GuessOutcome::NoActiveRound);

        m.round = 2;
        m.status = MatchStatus::InProgress;
        bob.apply_snapshot(m);
        assert!(bob.guessed().is_empty());
        assert_eq!(bob.guess("letters"), GuessOutcome::Correct { found: 1, total: 3 });
    }

    #[test]
    fn test_closed_and_removed() {
        let mut bob = Session::new("Bob", Timings::default());
        let mut m = live_round();
        bob.apply_snapshot(m.clone());
        assert!(!bob.is_over());

        m.status = MatchStatus::Closed;
        bob.apply_snapshot(m);
        assert!(bob.is_over());
        assert_eq!(bob.timer(), None);

        let mut alice = Session::new("Alice", Timings::default());
        alice.mark_removed();
        assert!(alice.is_over());
    }
}
