//! GameSpy4-style full-stat query client.
//!
//! The query protocol runs over UDP and is lossy by nature: every timeout,
//! short read, or malformed byte layout maps to [`SourceError::Unavailable`]
//! so the aggregator can fall back to its sticky cache. Nothing here ever
//! escapes past the module boundary as a hard error.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

use crate::error::SourceError;

/// Magic prefix + packet type open every request.
const MAGIC: [u8; 2] = [0xFE, 0xFD];
const TYPE_HANDSHAKE: u8 = 0x09;
const TYPE_STAT: u8 = 0x00;

/// Arbitrary session token; the server echoes it back. The protocol only
/// keeps the low nibble of each byte, so stick to values that survive that.
const SESSION_ID: u32 = 0x01020304;

/// Separates the key/value section from the player name list.
const PLAYER_MARKER: &[u8] = b"\x00\x00\x01player_\x00\x00";

/// Full-stat response: counts, server version, and the online player names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullStat {
    pub online: u32,
    pub max: u32,
    pub version: Option<String>,
    pub players: BTreeSet<String>,
}

/// Client for one configured query endpoint.
#[derive(Debug, Clone)]
pub struct QueryClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl QueryClient {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Run the two-step handshake + full-stat exchange.
    pub async fn query(&self) -> Result<FullStat, SourceError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|_| SourceError::Unavailable)?;
        socket
            .connect((self.host.as_str(), self.port))
            .await
            .map_err(|_| SourceError::Unavailable)?;

        // Step 1: handshake, returns an ASCII-decimal challenge token.
        let mut handshake = Vec::with_capacity(7);
        handshake.extend_from_slice(&MAGIC);
        handshake.push(TYPE_HANDSHAKE);
        handshake.extend_from_slice(&SESSION_ID.to_be_bytes());

        let reply = self.exchange(&socket, &handshake).await?;
        let challenge = parse_challenge(&reply).ok_or(SourceError::Unavailable)?;

        // Step 2: full stat, challenge re-encoded as a big-endian integer
        // plus four zero padding bytes to request the extended payload.
        let mut request = Vec::with_capacity(15);
        request.extend_from_slice(&MAGIC);
        request.push(TYPE_STAT);
        request.extend_from_slice(&SESSION_ID.to_be_bytes());
        request.extend_from_slice(&challenge.to_be_bytes());
        request.extend_from_slice(&[0, 0, 0, 0]);

        let reply = self.exchange(&socket, &request).await?;
        let stat = parse_full_stat(&reply).ok_or(SourceError::Unavailable)?;
        debug!(online = stat.online, max = stat.max, "query succeeded");
        Ok(stat)
    }

    /// One send/receive round trip under the configured timeout.
    async fn exchange(&self, socket: &UdpSocket, payload: &[u8]) -> Result<Vec<u8>, SourceError> {
        socket
            .send(payload)
            .await
            .map_err(|_| SourceError::Unavailable)?;

        let mut buf = vec![0u8; 4096];
        let n = timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| SourceError::Unavailable)?
            .map_err(|_| SourceError::Unavailable)?;
        buf.truncate(n);
        Ok(buf)
    }
}

/// Parse a handshake reply: type byte, session echo, then the challenge as
/// ASCII digits up to a NUL terminator.
pub(crate) fn parse_challenge(buf: &[u8]) -> Option<i32> {
    if buf.len() < 6 || buf[0] != TYPE_HANDSHAKE {
        return None;
    }
    let token = &buf[5..];
    let end = token.iter().position(|&b| b == 0)?;
    std::str::from_utf8(&token[..end]).ok()?.parse().ok()
}

/// Parse a full-stat reply: type byte, session echo, 11 bytes of fixed
/// padding, a NUL-delimited key/value section, the player marker, then a
/// NUL-delimited name list closed by an empty entry.
pub(crate) fn parse_full_stat(buf: &[u8]) -> Option<FullStat> {
    if buf.first() != Some(&TYPE_STAT) {
        return None;
    }
    let body = buf.get(16..)?;
    let marker = find(body, PLAYER_MARKER)?;

    let mut online = None;
    let mut max = None;
    let mut version = None;

    let mut fields = body[..marker].split(|&b| b == 0);
    while let (Some(key), Some(value)) = (fields.next(), fields.next()) {
        let value = std::str::from_utf8(value).ok()?;
        match key {
            b"numplayers" => online = value.parse().ok(),
            b"maxplayers" => max = value.parse().ok(),
            b"version" => version = Some(value.to_string()),
            _ => {}
        }
    }

    let mut players = BTreeSet::new();
    for name in body[marker + PLAYER_MARKER.len()..].split(|&b| b == 0) {
        if name.is_empty() {
            break;
        }
        players.insert(std::str::from_utf8(name).ok()?.to_string());
    }

    Some(FullStat {
        online: online?,
        max: max?,
        version,
        players,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
