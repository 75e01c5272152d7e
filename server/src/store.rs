//! In-memory match store with conditional updates and a change feed
//!
//! The store is owned by the server's event loop, so every operation runs to
//! completion before the next one starts. That makes each conditional update
//! atomic: when two clients race for the same transition, whichever packet the
//! loop handles first wins and the other sees a `Conflict`.
//!
//! Every successful write is published on a broadcast channel. Listeners
//! subscribe with [`MatchStore::subscribe`] and may narrow the feed to a
//! single match id.

use log::debug;
use shared::{Match, MatchUpdate, PatchViolation};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::broadcast;

const FEED_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("match {0} already exists")]
    DuplicateId(String),
    #[error("conditional update on match {0} did not hold")]
    Conflict(String),
    #[error("update on match {match_id} refused: {violation}")]
    Invalid {
        match_id: String,
        violation: PatchViolation,
    },
}

/// A post-write notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchChange {
    Updated(Match),
    Removed(String),
}

impl MatchChange {
    pub fn match_id(&self) -> &str {
        match self {
            MatchChange::Updated(m) => &m.id,
            MatchChange::Removed(id) => id,
        }
    }
}

/// Receiving side of the change feed, optionally filtered to one match
pub struct ChangeFeed {
    rx: broadcast::Receiver<MatchChange>,
    match_id: Option<String>,
}

impl ChangeFeed {
    fn wants(&self, change: &MatchChange) -> bool {
        match &self.match_id {
            Some(id) => change.match_id() == id,
            None => true,
        }
    }

    /// Waits for the next relevant change. Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<MatchChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.wants(&change) => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Change feed lagged, skipped {} changes", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`ChangeFeed::next`]
    pub fn try_next(&mut self) -> Option<MatchChange> {
        loop {
            match self.rx.try_recv() {
                Ok(change) if self.wants(&change) => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

pub struct MatchStore {
    matches: HashMap<String, Match>,
    feed: broadcast::Sender<MatchChange>,
}

impl MatchStore {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            matches: HashMap::new(),
            feed,
        }
    }

    /// Subscribes to every change, or only to changes of `match_id`
    pub fn subscribe(&self, match_id: Option<&str>) -> ChangeFeed {
        ChangeFeed {
            rx: self.feed.subscribe(),
            match_id: match_id.map(str::to_string),
        }
    }

    fn publish(&self, change: MatchChange) {
        // No listeners is fine
        let _ = self.feed.send(change);
    }

    pub fn insert(&mut self, record: Match) -> Result<(), StoreError> {
        if self.matches.contains_key(&record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }
        self.matches.insert(record.id.clone(), record.clone());
        self.publish(MatchChange::Updated(record));
        Ok(())
    }

    pub fn get(&self, match_id: &str) -> Option<&Match> {
        self.matches.get(match_id)
    }

    pub fn contains(&self, match_id: &str) -> bool {
        self.matches.contains_key(match_id)
    }

    /// All records, ordered by id
    pub fn list(&self) -> Vec<Match> {
        let mut all: Vec<Match> = self.matches.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Applies `update` if its expectations hold.
    ///
    /// Returns the post-update snapshot, `Ok(None)` when the id is unknown
    /// (deleted matches are a no-op), `Conflict` when a condition failed, or
    /// `Invalid` when the patch would break the record's invariants.
    pub fn update(
        &mut self,
        match_id: &str,
        update: &MatchUpdate,
    ) -> Result<Option<Match>, StoreError> {
        let Some(record) = self.matches.get_mut(match_id) else {
            debug!("Update on unknown match {} ignored", match_id);
            return Ok(None);
        };

        if !update.expect.holds(record) {
            return Err(StoreError::Conflict(match_id.to_string()));
        }

        record
            .check(&update.patch)
            .map_err(|violation| StoreError::Invalid {
                match_id: match_id.to_string(),
                violation,
            })?;

        record.apply(&update.patch);
        record.revision += 1;
        let snapshot = record.clone();
        self.publish(MatchChange::Updated(snapshot.clone()));
        Ok(Some(snapshot))
    }

    /// Hard delete. Returns false if there was nothing to delete.
    pub fn delete(&mut self, match_id: &str) -> bool {
        if self.matches.remove(match_id).is_some() {
            self.publish(MatchChange::Removed(match_id.to_string()));
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

impl Default for MatchStore {
    fn default() -> Self {
        Self::new()
    }
}
