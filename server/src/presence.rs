//! Retiring matches when a player leaves or drops

use crate::store::MatchStore;
use log::{debug, info};
use shared::{Match, MatchExpect, MatchPatch, MatchStatus, MatchUpdate};

/// Marks the match closed, then deletes it.
///
/// The close is published on the change feed before the delete so the
/// remaining player sees why the match ended. Leaving a match that is already
/// gone is a no-op. Returns the closed snapshot when something was retired.
pub fn leave(store: &mut MatchStore, match_id: &str, player_name: &str) -> Option<Match> {
    let close = MatchUpdate {
        expect: MatchExpect::default(),
        patch: MatchPatch {
            status: Some(MatchStatus::Closed),
            ..MatchPatch::default()
        },
    };

    let closed = match store.update(match_id, &close) {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) | Err(_) => {
            debug!(
                "Leave from {} for match {} ignored, match is gone",
                player_name, match_id
            );
            return None;
        }
    };

    store.delete(match_id);
    info!("{} left match {}, match closed", player_name, match_id);
    Some(closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MatchChange;

    #[test]
    fn test_leave_closes_then_deletes() {
        let mut store = MatchStore::new();
        let mut m = Match::new("m1", "Alice", "NWL23");
        m.player2_name = Some("Bob".to_string());
        m.status = MatchStatus::InProgress;
        store.insert(m).unwrap();
        let mut feed = store.subscribe(Some("m1"));

        let closed = leave(&mut store, "m1", "Bob").unwrap();
        assert_eq!(closed.status, MatchStatus::Closed);
        assert!(!store.contains("m1"));

        match feed.try_next() {
            Some(MatchChange::Updated(m)) => assert_eq!(m.status, MatchStatus::Closed),
            other => panic!("expected closed snapshot, got {:?}", other),
        }
        assert_eq!(feed.try_next(), Some(MatchChange::Removed("m1".to_string())));
    }

    #[test]
    fn test_leave_is_idempotent() {
        let mut store = MatchStore::new();
        store.insert(Match::new("m1", "Alice", "NWL23")).unwrap();

        assert!(leave(&mut store, "m1", "Alice").is_some());
        assert!(leave(&mut store, "m1", "Alice").is_none());
        assert!(leave(&mut store, "never-existed", "Bob").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_leave_from_any_status() {
        for status in [
            MatchStatus::Waiting,
            MatchStatus::Countdown,
            MatchStatus::InProgress,
            MatchStatus::GameoverCountdown,
        ] {
            let mut store = MatchStore::new();
            let mut m = Match::new("m1", "Alice", "NWL23");
            m.status = status;
            store.insert(m).unwrap();

            assert!(leave(&mut store, "m1", "Alice").is_some());
            assert!(!store.contains("m1"));
        }
    }
}
