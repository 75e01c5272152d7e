//! Round resolution: first complete solution set wins the round

use crate::store::{MatchStore, StoreError};
use log::{debug, info, warn};
use shared::{
    join_answers, split_answers, Match, MatchExpect, MatchPatch, MatchStatus, MatchUpdate,
};
use std::collections::BTreeSet;
use thiserror::Error;

/// Why a submission was turned away. None of these touch the record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("match {0} does not exist")]
    UnknownMatch(String),
    #[error("match is {0}, not in progress")]
    NotInProgress(MatchStatus),
    #[error("no active round")]
    NoActiveRound,
    #[error("{0} is not playing in this match")]
    NotAPlayer(String),
    #[error("submitted {submitted} answers, round has {expected}")]
    WrongCount { submitted: usize, expected: usize },
    #[error("{0} is not a solution")]
    NotASolution(String),
    #[error("round was already resolved")]
    AlreadyResolved,
}

/// Checks a claimed complete answer set against the live round and builds
/// the winning update.
///
/// The update pins the status and round it was derived from, so only the
/// first winning submission the store applies takes effect.
pub fn resolve(record: &Match, answer: &str, player_name: &str) -> Result<MatchUpdate, Rejection> {
    if record.status != MatchStatus::InProgress {
        return Err(Rejection::NotInProgress(record.status));
    }
    let puzzle = record.current.as_ref().ok_or(Rejection::NoActiveRound)?;
    if !record.has_player(player_name) {
        return Err(Rejection::NotAPlayer(player_name.to_string()));
    }

    let canonical: BTreeSet<String> = puzzle.solution_list().into_iter().collect();
    let submitted: BTreeSet<String> = split_answers(answer).into_iter().collect();

    if submitted.len() != canonical.len() {
        return Err(Rejection::WrongCount {
            submitted: submitted.len(),
            expected: canonical.len(),
        });
    }
    if let Some(stray) = submitted.difference(&canonical).next() {
        return Err(Rejection::NotASolution(stray.clone()));
    }

    let mut patch = MatchPatch {
        status: Some(MatchStatus::Countdown),
        last_winner: Some(Some(player_name.to_string())),
        last_answer: Some(Some(join_answers(&puzzle.solution_list()))),
        ..MatchPatch::default()
    };
    if record.is_authority(player_name) {
        patch.player1_score = Some(record.player1_score + 1);
    } else {
        patch.player2_score = Some(record.player2_score + 1);
    }

    Ok(MatchUpdate {
        expect: MatchExpect::at_round(MatchStatus::InProgress, record.round),
        patch,
    })
}

/// Resolves and commits a submission. Returns the new snapshot on a win.
pub fn submit(
    store: &mut MatchStore,
    match_id: &str,
    answer: &str,
    player_name: &str,
) -> Result<Match, Rejection> {
    let record = store
        .get(match_id)
        .ok_or_else(|| Rejection::UnknownMatch(match_id.to_string()))?;
    let update = resolve(record, answer, player_name)?;

    match store.update(match_id, &update) {
        Ok(Some(snapshot)) => {
            info!(
                "{} won round {} of match {}",
                player_name, snapshot.round, match_id
            );
            Ok(snapshot)
        }
        Ok(None) => Err(Rejection::UnknownMatch(match_id.to_string())),
        Err(StoreError::Invalid { violation, .. }) => {
            warn!(
                "Submission from {} on match {} refused: {}",
                player_name, match_id, violation
            );
            Err(Rejection::AlreadyResolved)
        }
        Err(StoreError::Conflict(_)) | Err(StoreError::DuplicateId(_)) => {
            debug!("Late submission from {} on match {}", player_name, match_id);
            Err(Rejection::AlreadyResolved)
        }
    }
}
