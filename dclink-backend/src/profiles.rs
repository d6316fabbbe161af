//! Pulls per-player stats over rcon and keeps the durable profile rows fresh.

use std::sync::Arc;

use dclink_db::{Database, DbError, PlayerProfile};
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::helpers::now;
use crate::presence::PresenceTracker;
use crate::rcon::ConsoleStatClient;

/// A profile plus whether it came from a live fetch or the durable row.
#[derive(Debug, Clone)]
pub struct ProfileView {
  pub profile: PlayerProfile,
  pub live: bool,
}

pub struct ProfileRefresher {
  db: Database,
  stats: Option<ConsoleStatClient>,
  presence: Arc<PresenceTracker>,
}

impl ProfileRefresher {
  pub fn new(db: Database, stats: Option<ConsoleStatClient>, presence: Arc<PresenceTracker>) -> Self {
    Self {
      db,
      stats,
      presence,
    }
  }

  /// One full pass over the currently-online players. Single-player
  /// failures (unlinked name, rcon unavailable) are skipped; they never
  /// abort the rest of the drain.
  pub async fn drain(&self) {
    let Some(stats) = &self.stats else {
      debug!("rcon not configured, skipping profile drain");
      return;
    };

    let players = self.presence.current();
    debug!(count = players.len(), "starting profile drain");

    for name in players {
      let uuid = match self.db.lookup_linked_account(name.clone()).await {
        Ok(Some(uuid)) => uuid,
        Ok(None) => {
          debug!(player = %name, "not linked, skipping");
          continue;
        }
        Err(err) => {
          warn!(player = %name, %err, "link lookup failed, skipping");
          continue;
        }
      };

      match stats.fetch_player_stats(&name).await {
        Ok(fetched) => {
          if let Err(err) = self
            .db
            .upsert_profile(
              uuid,
              fetched.level,
              fetched.playtime_seconds,
              fetched.deaths,
              now(),
            )
            .await
          {
            warn!(player = %name, %err, "profile upsert failed");
          }
        }
        Err(SourceError::Unavailable) => {
          debug!(player = %name, "stats unavailable, skipping");
        }
        Err(SourceError::NotConfigured) => return,
      }
    }
  }

  /// On-demand lookup: live fetch first, durable row as fallback. Returns
  /// None for names that never linked or have no data at all.
  pub async fn lookup(&self, name: &str) -> Result<Option<ProfileView>, DbError> {
    let Some(uuid) = self.db.lookup_linked_account(name.to_string()).await? else {
      return Ok(None);
    };

    if let Some(stats) = &self.stats
      && let Ok(fetched) = stats.fetch_player_stats(name).await
    {
      let timestamp = now();
      self
        .db
        .upsert_profile(
          uuid.clone(),
          fetched.level,
          fetched.playtime_seconds,
          fetched.deaths,
          timestamp,
        )
        .await?;
      return Ok(Some(ProfileView {
        profile: PlayerProfile {
          uuid,
          level: fetched.level,
          playtime_seconds: fetched.playtime_seconds,
          deaths: fetched.deaths,
          last_updated: timestamp,
        },
        live: true,
      }));
    }

    let cached = self.db.fetch_profile(uuid).await?;
    Ok(cached.map(|profile| ProfileView {
      profile,
      live: false,
    }))
  }
}
