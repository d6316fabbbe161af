mod error;
mod models;

pub use error::{DbError, Result};
pub use models::{LinkedAccount, PlayerName, PlayerProfile};

use std::path::Path;
use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::{OptionalExtension, params};
use tracing::{debug, info};

/// Database wrapper for all dclink storage operations.
#[derive(Clone)]
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create a database at the given path.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = Connection::open(path).await.map_err(DbError::Sqlite)?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Create an in-memory database (useful for testing).
  pub async fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .await
      .map_err(DbError::Sqlite)?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Initialize the database schema.
  async fn initialize(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        // Enable WAL mode for better concurrent read/write performance
        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute_batch(
          r#"
          -- Discord <-> Minecraft account links
          CREATE TABLE IF NOT EXISTS linked_accounts (
              uuid TEXT PRIMARY KEY,
              discord_id INTEGER NOT NULL UNIQUE,
              username TEXT NOT NULL,
              linked_at INTEGER NOT NULL
          );

          -- Stats pulled over rcon, one row per linked account
          CREATE TABLE IF NOT EXISTS player_profiles (
              uuid TEXT PRIMARY KEY REFERENCES linked_accounts(uuid) ON DELETE CASCADE,
              level INTEGER NOT NULL,
              playtime_seconds INTEGER NOT NULL,
              deaths INTEGER NOT NULL,
              last_updated INTEGER NOT NULL
          );

          -- Username lookups happen on every profile drain
          CREATE INDEX IF NOT EXISTS idx_linked_accounts_username
              ON linked_accounts(username COLLATE NOCASE);
          "#,
        )?;
        Ok(())
      })
      .await?;

    info!("database initialized");
    Ok(())
  }

  // ========================================================================
  // Linked Accounts
  // ========================================================================

  /// Link a Discord user to a Minecraft account.
  ///
  /// Fails if either side of the link is already taken, or if the
  /// registration cap has been reached.
  pub async fn link_account(
    &self,
    uuid: String,
    discord_id: u64,
    username: String,
    now: i64,
    max_accounts: u32,
  ) -> Result<LinkedAccount> {
    let result = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let count: u32 = tx
          .prepare_cached("SELECT COUNT(*) FROM linked_accounts")?
          .query_row([], |row| row.get(0))?;

        if count >= max_accounts {
          return Ok(Err(DbError::RegistrationFull));
        }

        let taken: bool = tx
          .prepare_cached(
            "SELECT EXISTS(SELECT 1 FROM linked_accounts WHERE uuid = ?1 OR discord_id = ?2)",
          )?
          .query_row(params![&uuid, discord_id], |row| row.get(0))?;

        if taken {
          return Ok(Err(DbError::AlreadyLinked));
        }

        tx.prepare_cached(
          "INSERT INTO linked_accounts (uuid, discord_id, username, linked_at) VALUES (?1, ?2, ?3, ?4)",
        )?
        .execute(params![&uuid, discord_id, &username, now])?;

        tx.commit()?;
        Ok(Ok(LinkedAccount {
          uuid,
          discord_id,
          username,
          linked_at: now,
        }))
      })
      .await??;

    debug!(%result.uuid, result.discord_id, "linked account");
    Ok(result)
  }

  /// Get the linked account for a Discord user, if any.
  pub async fn account_for_discord(&self, discord_id: u64) -> Result<Option<LinkedAccount>> {
    let account = self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached(
            "SELECT uuid, discord_id, username, linked_at FROM linked_accounts WHERE discord_id = ?1",
          )?
          .query_row(params![discord_id], |row| {
            Ok(LinkedAccount {
              uuid: row.get(0)?,
              discord_id: row.get(1)?,
              username: row.get(2)?,
              linked_at: row.get(3)?,
            })
          })
          .optional()
      })
      .await?;

    Ok(account)
  }

  /// Get the linked account for a Minecraft UUID, if any.
  pub async fn account_for_uuid(&self, uuid: String) -> Result<Option<LinkedAccount>> {
    let account = self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached(
            "SELECT uuid, discord_id, username, linked_at FROM linked_accounts WHERE uuid = ?1",
          )?
          .query_row(params![&uuid], |row| {
            Ok(LinkedAccount {
              uuid: row.get(0)?,
              discord_id: row.get(1)?,
              username: row.get(2)?,
              linked_at: row.get(3)?,
            })
          })
          .optional()
      })
      .await?;

    Ok(account)
  }

  /// Resolve a display name to the stable account UUID.
  ///
  /// Returns None for players who never linked; callers skip those.
  pub async fn lookup_linked_account(&self, username: String) -> Result<Option<String>> {
    let uuid = self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached("SELECT uuid FROM linked_accounts WHERE username = ?1 COLLATE NOCASE")?
          .query_row(params![&username], |row| row.get(0))
          .optional()
      })
      .await?;

    Ok(uuid)
  }

  /// Remove a link by Discord user ID.
  pub async fn unlink_account(&self, discord_id: u64) -> Result<()> {
    let result = self
      .conn
      .call(move |conn| {
        let deleted = conn
          .prepare_cached("DELETE FROM linked_accounts WHERE discord_id = ?1")?
          .execute(params![discord_id])?;

        if deleted == 0 {
          return Ok(Err(DbError::AccountNotFound));
        }

        Ok(Ok(()))
      })
      .await??;

    debug!(discord_id, "unlinked account");
    Ok(result)
  }

  /// Number of linked accounts.
  pub async fn linked_count(&self) -> Result<u32> {
    let count = self
      .conn
      .call(|conn| {
        let count: u32 = conn
          .prepare_cached("SELECT COUNT(*) FROM linked_accounts")?
          .query_row([], |row| row.get(0))?;
        Ok(count)
      })
      .await?;

    Ok(count)
  }

  // ========================================================================
  // Player Profiles
  // ========================================================================

  /// Insert or replace the stats row for an account.
  pub async fn upsert_profile(
    &self,
    uuid: String,
    level: i64,
    playtime_seconds: i64,
    deaths: i64,
    now: i64,
  ) -> Result<()> {
    let uuid_log = uuid.clone();

    self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached(
            r#"
            INSERT INTO player_profiles (uuid, level, playtime_seconds, deaths, last_updated)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (uuid) DO UPDATE SET
                level = excluded.level,
                playtime_seconds = excluded.playtime_seconds,
                deaths = excluded.deaths,
                last_updated = excluded.last_updated
            "#,
          )?
          .execute(params![&uuid, level, playtime_seconds, deaths, now])?;
        Ok(())
      })
      .await?;

    debug!(uuid = %uuid_log, "upserted profile");
    Ok(())
  }

  /// Get the stored stats row for an account.
  pub async fn fetch_profile(&self, uuid: String) -> Result<Option<PlayerProfile>> {
    let profile = self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached(
            "SELECT uuid, level, playtime_seconds, deaths, last_updated FROM player_profiles WHERE uuid = ?1",
          )?
          .query_row(params![&uuid], |row| {
            Ok(PlayerProfile {
              uuid: row.get(0)?,
              level: row.get(1)?,
              playtime_seconds: row.get(2)?,
              deaths: row.get(3)?,
              last_updated: row.get(4)?,
            })
          })
          .optional()
      })
      .await?;

    Ok(profile)
  }

}
