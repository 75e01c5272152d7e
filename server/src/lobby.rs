//! Match creation and seat claiming

use crate::store::{MatchStore, StoreError};
use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::{Match, MatchExpect, MatchPatch, MatchStatus, MatchUpdate};
use thiserror::Error;

const MATCH_ID_LEN: usize = 8;
const MAX_NAME_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LobbyError {
    #[error("player name must be 1-{} visible characters", MAX_NAME_LEN)]
    InvalidName,
    #[error("lexicon must not be empty")]
    InvalidLexicon,
    #[error("match {0} does not exist")]
    NotFound(String),
    #[error("this room is already full")]
    MatchFull,
    #[error("this name is already taken, please choose a different name")]
    NameTaken,
    #[error("match {0} is not accepting players")]
    NotJoinable(String),
}

fn valid_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        None
    } else {
        Some(name.to_string())
    }
}

fn generate_match_id<R: Rng>(rng: &mut R) -> String {
    (0..MATCH_ID_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_lowercase())
        .collect()
}

/// Creates a waiting match owned by `player_name`
pub fn create_match<R: Rng>(
    store: &mut MatchStore,
    rng: &mut R,
    player_name: &str,
    lexicon: &str,
) -> Result<Match, LobbyError> {
    let player_name = valid_name(player_name).ok_or(LobbyError::InvalidName)?;
    let lexicon = lexicon.trim();
    if lexicon.is_empty() {
        return Err(LobbyError::InvalidLexicon);
    }

    loop {
        let record = Match::new(&generate_match_id(rng), &player_name, lexicon);
        match store.insert(record.clone()) {
            Ok(()) => {
                info!(
                    "Match {} created by {} ({})",
                    record.id, record.player1_name, record.lexicon
                );
                return Ok(record);
            }
            Err(StoreError::DuplicateId(_)) => continue,
            Err(StoreError::Conflict(id)) | Err(StoreError::Invalid { match_id: id, .. }) => {
                return Err(LobbyError::NotJoinable(id))
            }
        }
    }
}

/// Claims the open second seat.
///
/// The seat is claimed with a conditional write, so of two concurrent joins
/// only one succeeds and the loser gets `MatchFull` with nothing changed.
pub fn join_match(
    store: &mut MatchStore,
    match_id: &str,
    player_name: &str,
) -> Result<Match, LobbyError> {
    let player_name = valid_name(player_name).ok_or(LobbyError::InvalidName)?;
    let record = store
        .get(match_id)
        .ok_or_else(|| LobbyError::NotFound(match_id.to_string()))?;

    if record.is_full() {
        return Err(LobbyError::MatchFull);
    }
    if record.player1_name == player_name {
        return Err(LobbyError::NameTaken);
    }
    if record.status != MatchStatus::Waiting {
        return Err(LobbyError::NotJoinable(match_id.to_string()));
    }

    let update = MatchUpdate {
        expect: MatchExpect {
            seat_open: true,
            ..MatchExpect::status(MatchStatus::Waiting)
        },
        patch: MatchPatch {
            player2_name: Some(player_name.clone()),
            ..MatchPatch::default()
        },
    };

    match store.update(match_id, &update) {
        Ok(Some(snapshot)) => {
            info!("{} joined match {}", player_name, match_id);
            Ok(snapshot)
        }
        Ok(None) => Err(LobbyError::NotFound(match_id.to_string())),
        Err(_) => Err(LobbyError::MatchFull),
    }
}
