use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn hash_api_key(key: &str) -> String {
  format!("{:x}", Sha256::digest(key.as_bytes()))
}

pub fn now() -> i64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap()
    .as_secs() as i64
}

/// Format a playtime in seconds as "3d 4h 12m".
pub fn format_playtime(seconds: i64) -> String {
  let days = seconds / 86400;
  let hours = (seconds % 86400) / 3600;
  let minutes = (seconds % 3600) / 60;

  if days > 0 {
    format!("{days}d {hours}h {minutes}m")
  } else if hours > 0 {
    format!("{hours}h {minutes}m")
  } else {
    format!("{minutes}m")
  }
}

/// Insert dashes into a raw 32-char Mojang UUID.
pub fn dash_uuid(raw: &str) -> Option<String> {
  if raw.len() != 32 || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
    return None;
  }
  Some(format!(
    "{}-{}-{}-{}-{}",
    &raw[0..8],
    &raw[8..12],
    &raw[12..16],
    &raw[16..20],
    &raw[20..32]
  ))
}
