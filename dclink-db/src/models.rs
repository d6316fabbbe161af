use arrayvec::ArrayString;

/// Minecraft player name - max 16 characters, stored inline (no heap allocation).
pub type PlayerName = ArrayString<16>;

/// A Discord account linked to a Minecraft account.
///
/// The Minecraft UUID is the stable key; the username is whatever the player
/// was called when they linked, and may go stale after a name change.
#[derive(Debug, Clone)]
pub struct LinkedAccount {
  /// Dashed Minecraft UUID (36 chars)
  pub uuid: String,
  /// Discord user ID
  pub discord_id: u64,
  /// Username at link time
  pub username: String,
  /// Unix timestamp when the link was created
  pub linked_at: i64,
}

/// Per-account gameplay statistics pulled over rcon.
///
/// Keyed by the Minecraft UUID rather than the username so a name change
/// never detaches a player from their history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
  /// Dashed Minecraft UUID (36 chars)
  pub uuid: String,
  /// Experience level
  pub level: i64,
  /// Total playtime in seconds
  pub playtime_seconds: i64,
  /// Death count
  pub deaths: i64,
  /// Unix timestamp of the last successful refresh
  pub last_updated: i64,
}
