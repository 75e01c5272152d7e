//! Plain-text rendering of the session for the terminal

use crate::session::{GuessOutcome, Session};
use shared::{Match, MatchStatus, WINNING_SCORE};

fn scoreline(record: &Match) -> String {
    match &record.player2_name {
        Some(player2) => format!(
            "Score: {}: {} - {}: {}",
            record.player1_name, record.player1_score, player2, record.player2_score
        ),
        None => "Waiting for an opponent to join...".to_string(),
    }
}

fn round_result(record: &Match, me: &str) -> Option<String> {
    let answer = record.last_answer.as_deref()?;
    let headline = match record.last_winner.as_deref() {
        Some(winner) if winner == me => "You won this round!",
        Some(_) => "Your opponent won this round!",
        None => "No one won this round!",
    };
    Some(format!("{} The answer was {}", headline, answer))
}

/// Lines describing the current state, top to bottom
pub fn render(session: &Session) -> Vec<String> {
    let Some(record) = session.snapshot() else {
        return vec!["Connecting to match...".to_string()];
    };
    if session.is_over() {
        return vec![
            "Your opponent has left the game.".to_string(),
            "The match is closed.".to_string(),
        ];
    }

    let me = session.player_name();
    let mut lines = vec![
        format!(
            "Match {} | lexicon {} | first to {} wins",
            record.id, record.lexicon, WINNING_SCORE
        ),
        scoreline(record),
    ];
    let timer = session.timer().unwrap_or(0);

    match record.status {
        MatchStatus::Waiting => {
            if record.player2_name.is_some() {
                lines.push("Waiting for round to start...".to_string());
            }
        }
        MatchStatus::Countdown => {
            lines.extend(round_result(record, me));
            lines.push(format!("Next round starting in: {}", timer));
        }
        MatchStatus::InProgress => {
            if let Some(alphagram) = record.current_alphagram() {
                let total = record
                    .current
                    .as_ref()
                    .map(|p| p.solution_count())
                    .unwrap_or(0);
                lines.push(format!("Round {} | time left: {} s", record.round, timer));
                lines.push(format!("Unscramble the letters: {}", alphagram));
                lines.push(format!("Solved: {} / {}", session.guessed().len(), total));
            }
        }
        MatchStatus::GameoverCountdown => {
            let won = record.score_of(me).is_some_and(|s| s >= WINNING_SCORE);
            lines.push(if won {
                "Game is over! You win!".to_string()
            } else {
                format!(
                    "Game is over! {} wins.",
                    record.opponent_of(me).unwrap_or("Your opponent")
                )
            });
            if let Some(answer) = &record.last_answer {
                lines.push(format!("The last answer was {}", answer));
            }
            lines.push(format!("New game starting in: {}", timer));
        }
        MatchStatus::Closed => {}
    }

    lines
}

/// Timer readout for the once-a-second tick, throttled during long phases
pub fn timer_line(session: &Session) -> Option<String> {
    let record = session.snapshot()?;
    let remaining = session.timer()?;
    if session.is_over() {
        return None;
    }
    match record.status {
        MatchStatus::Countdown if remaining > 0 => Some(format!("{}...", remaining)),
        MatchStatus::InProgress if remaining > 0 && (remaining <= 3 || remaining % 5 == 0) => {
            Some(format!("{} s left", remaining))
        }
        MatchStatus::GameoverCountdown if remaining > 0 && remaining % 10 == 0 => {
            Some(format!("New game starting in: {}", remaining))
        }
        _ => None,
    }
}

pub fn describe_guess(outcome: &GuessOutcome) -> String {
    match outcome {
        GuessOutcome::NoActiveRound => "No round in progress.".to_string(),
        GuessOutcome::NotASolution => "Invalid answer.".to_string(),
        GuessOutcome::AlreadyGuessed => "Already guessed.".to_string(),
        GuessOutcome::Correct { found, total } => format!("Guessed {} out of {}", found, total),
        GuessOutcome::Complete { .. } => "All solutions found! Submitting...".to_string(),
    }
}
