//! Live set of online player names.
//!
//! Mutated from two directions: push events delivered by the game server
//! plugin (join/leave) and the periodic pull-refresh against the primary
//! status source. The set lives behind a plain mutex; critical sections are
//! a single insert/remove/replace and the lock is never held across an await.

use std::collections::BTreeSet;
use std::sync::Mutex;

use dclink_db::PlayerName;
use tracing::debug;

use crate::error::SourceError;
use crate::status::PrimarySource;

#[derive(Debug, Default)]
pub struct PresenceTracker {
    set: Mutex<BTreeSet<PlayerName>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push event: a player joined. Inserting a name that is already present
    /// leaves exactly one occurrence.
    pub fn on_join(&self, name: &str) {
        let Ok(name) = PlayerName::from(name) else {
            return;
        };
        self.set.lock().unwrap().insert(name);
    }

    /// Push event: a player left. Removing an absent name is a no-op.
    pub fn on_leave(&self, name: &str) {
        let Ok(name) = PlayerName::from(name) else {
            return;
        };
        self.set.lock().unwrap().remove(&name);
    }

    /// Snapshot copy of the current set, lexicographically sorted.
    pub fn current(&self) -> Vec<String> {
        self.set
            .lock()
            .unwrap()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.set.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.lock().unwrap().is_empty()
    }

    /// Authoritative resync against the primary status source.
    ///
    /// Only a successful pull with a non-empty player list replaces the set;
    /// a failure or an empty list leaves it untouched. Sources report an
    /// empty list both for "zero players" and "could not enumerate", and
    /// flapping the panel to empty on the latter is worse than holding a
    /// stale name for one cycle.
    pub async fn pull_refresh(&self, source: &PrimarySource) -> Result<Vec<String>, SourceError> {
        let probe = source.probe().await?;
        if !self.apply_pull(&probe.players) {
            debug!("pull refresh returned no names, keeping current set");
            return Err(SourceError::Unavailable);
        }
        Ok(self.current())
    }

    /// Wholesale replacement step of pull_refresh. Returns false when no
    /// usable names survive conversion, in which case the set is left
    /// untouched; a list of nothing but oversized garbage is as much
    /// "could not enumerate" as an empty one.
    fn apply_pull(&self, players: &[String]) -> bool {
        let fresh: BTreeSet<PlayerName> = players
            .iter()
            .filter_map(|name| PlayerName::from(name).ok())
            .collect();

        if fresh.is_empty() {
            return false;
        }

        *self.set.lock().unwrap() = fresh;
        true
    }
}
