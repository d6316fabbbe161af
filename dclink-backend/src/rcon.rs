//! Rcon client for pulling per-player statistics.
//!
//! The rcon transport is plain blocking TCP, so every fetch runs on the
//! blocking worker pool via `spawn_blocking`; the async side only ever awaits
//! the joined result. As with the query client, all failures (connect, auth,
//! framing, missing stat tokens) collapse into [`SourceError::Unavailable`].

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use tracing::debug;

use crate::config::Config;
use crate::error::SourceError;

const TYPE_AUTH: i32 = 3;
const TYPE_EXEC: i32 = 2;

/// The game counts playtime in ticks.
pub const TICKS_PER_SECOND: i64 = 20;

/// Scoreboard objectives backing the playtime/deaths counters. Created
/// lazily on each fetch; the add command is a no-op when they already exist.
pub const PLAYTIME_OBJECTIVE: &str = "dclink_playtime";
pub const DEATHS_OBJECTIVE: &str = "dclink_deaths";

/// Stats for one player as read off the server console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerStats {
    pub level: i64,
    pub playtime_seconds: i64,
    pub deaths: i64,
}

/// Encode one rcon packet: little-endian length/id/type, then the body and
/// two trailing NULs.
fn encode_packet(id: i32, ptype: i32, body: &str) -> Vec<u8> {
    let length = (4 + 4 + body.len() + 2) as i32;
    let mut buf = Vec::with_capacity(4 + length as usize);
    buf.extend_from_slice(&length.to_le_bytes());
    buf.extend_from_slice(&id.to_le_bytes());
    buf.extend_from_slice(&ptype.to_le_bytes());
    buf.extend_from_slice(body.as_bytes());
    buf.extend_from_slice(&[0, 0]);
    buf
}

/// Decode an rcon packet payload (everything after the length prefix) into
/// (id, type, body).
fn decode_payload(payload: &[u8]) -> Option<(i32, i32, String)> {
    if payload.len() < 10 {
        return None;
    }
    let id = i32::from_le_bytes(payload[0..4].try_into().ok()?);
    let ptype = i32::from_le_bytes(payload[4..8].try_into().ok()?);
    let body = std::str::from_utf8(&payload[8..payload.len() - 2]).ok()?;
    Some((id, ptype, body.to_string()))
}

/// One authenticated rcon session over a blocking TCP stream.
struct RconSession {
    stream: TcpStream,
    next_id: i32,
}

impl RconSession {
    fn connect(host: &str, port: u16, password: &str, timeout: Duration) -> Result<Self, SourceError> {
        use std::net::ToSocketAddrs;
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|_| SourceError::Unavailable)?
            .next()
            .ok_or(SourceError::Unavailable)?;
        let stream =
            TcpStream::connect_timeout(&addr, timeout).map_err(|_| SourceError::Unavailable)?;
        stream
            .set_read_timeout(Some(timeout))
            .map_err(|_| SourceError::Unavailable)?;
        stream
            .set_write_timeout(Some(timeout))
            .map_err(|_| SourceError::Unavailable)?;

        let mut session = Self { stream, next_id: 1 };

        // Authenticate; the server signals a bad password with id -1.
        // No retry on auth failure.
        let (id, _ptype, _body) = session.round_trip(TYPE_AUTH, password)?;
        if id == -1 {
            debug!("rcon authentication rejected");
            return Err(SourceError::Unavailable);
        }
        Ok(session)
    }

    fn command(&mut self, cmd: &str) -> Result<String, SourceError> {
        let (_id, _ptype, body) = self.round_trip(TYPE_EXEC, cmd)?;
        Ok(body)
    }

    fn round_trip(&mut self, ptype: i32, body: &str) -> Result<(i32, i32, String), SourceError> {
        let id = self.next_id;
        self.next_id += 1;

        self.stream
            .write_all(&encode_packet(id, ptype, body))
            .map_err(|_| SourceError::Unavailable)?;

        let mut len_buf = [0u8; 4];
        self.stream
            .read_exact(&mut len_buf)
            .map_err(|_| SourceError::Unavailable)?;
        let length = i32::from_le_bytes(len_buf);
        if !(10..=4110).contains(&length) {
            return Err(SourceError::Unavailable);
        }

        let mut payload = vec![0u8; length as usize];
        self.stream
            .read_exact(&mut payload)
            .map_err(|_| SourceError::Unavailable)?;
        decode_payload(&payload).ok_or(SourceError::Unavailable)
    }
}

/// Async facade over the blocking rcon session, one session per fetch.
#[derive(Debug, Clone)]
pub struct ConsoleStatClient {
    host: String,
    port: u16,
    password: String,
    timeout: Duration,
}

impl ConsoleStatClient {
    /// Returns None when the rcon endpoint or credential is not configured;
    /// callers skip their rcon-dependent features in that case.
    pub fn from_config(config: &Config) -> Option<Self> {
        let host = config.rcon_host.clone()?;
        let password = config.rcon_password.clone()?;
        Some(Self {
            host,
            port: config.rcon_port,
            password,
            timeout: config.protocol_timeout,
        })
    }

    /// Fetch level/playtime/deaths for one player.
    pub async fn fetch_player_stats(&self, player: &str) -> Result<PlayerStats, SourceError> {
        let client = self.clone();
        let player = player.to_string();
        tokio::task::spawn_blocking(move || client.fetch_blocking(&player))
            .await
            .map_err(|_| SourceError::Unavailable)?
    }

    fn fetch_blocking(&self, player: &str) -> Result<PlayerStats, SourceError> {
        let mut session = RconSession::connect(&self.host, self.port, &self.password, self.timeout)?;

        // Create-if-absent; "already exists" replies are expected and ignored.
        let _ = session.command(&format!(
            "scoreboard objectives add {PLAYTIME_OBJECTIVE} minecraft.custom:minecraft.play_time"
        ));
        let _ = session.command(&format!(
            "scoreboard objectives add {DEATHS_OBJECTIVE} deathCount"
        ));

        let level_reply = session.command(&format!("experience query {player} levels"))?;
        let playtime_reply =
            session.command(&format!("scoreboard players get {player} {PLAYTIME_OBJECTIVE}"))?;
        let deaths_reply =
            session.command(&format!("scoreboard players get {player} {DEATHS_OBJECTIVE}"))?;

        // Level and playtime are required; deaths is absent until the player
        // has died once, so it defaults to zero.
        let level = last_integer(&level_reply).ok_or(SourceError::Unavailable)?;
        let ticks = last_integer(&playtime_reply).ok_or(SourceError::Unavailable)?;
        let deaths = last_integer(&deaths_reply).unwrap_or(0);

        Ok(PlayerStats {
            level,
            playtime_seconds: ticks / TICKS_PER_SECOND,
            deaths,
        })
    }
}

/// Last whitespace-delimited token of a console reply that parses as a
/// non-negative integer, e.g. "Alice has 7 experience levels" -> 7.
pub(crate) fn last_integer(text: &str) -> Option<i64> {
    text.split_whitespace()
        .rev()
        .find_map(|token| token.parse::<u64>().ok())
        .map(|value| value as i64)
}
