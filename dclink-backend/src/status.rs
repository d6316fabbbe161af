//! Status sources: the direct query protocol and the HTTP fallback.
//!
//! Exactly one primary source is selected per deployment at construction
//! time. Both produce the same [`ServerProbe`] shape, which feeds the sticky
//! aggregator and the presence pull-refresh.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::error::SourceError;
use crate::query::QueryClient;

/// One successful probe of the game server, whichever source produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerProbe {
    pub online: u32,
    pub max: u32,
    pub ping_millis: Option<u32>,
    pub version: Option<String>,
    pub players: Vec<String>,
}

/// Status document served by third-party aggregators (mcsrvstat-style).
#[derive(Debug, Deserialize)]
struct StatusDocument {
    online: bool,
    #[serde(default)]
    players: Option<PlayersSection>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayersSection {
    #[serde(default)]
    online: u32,
    #[serde(default)]
    max: u32,
    #[serde(default)]
    list: Vec<String>,
}

/// HTTP fallback for deployments without direct query access.
#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    client: reqwest::Client,
    url: String,
}

impl HttpStatusSource {
    pub fn new(url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build http client");
        Self { client, url }
    }

    pub async fn probe(&self) -> Result<ServerProbe, SourceError> {
        let started = Instant::now();
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|_| SourceError::Unavailable)?;

        if !response.status().is_success() {
            return Err(SourceError::Unavailable);
        }

        let document: StatusDocument = response
            .json()
            .await
            .map_err(|_| SourceError::Unavailable)?;

        // The aggregator saw the server as offline: no fresher data this cycle.
        if !document.online {
            return Err(SourceError::Unavailable);
        }

        let elapsed = started.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;
        let players = document.players.unwrap_or(PlayersSection {
            online: 0,
            max: 0,
            list: Vec::new(),
        });

        debug!(online = players.online, "status fallback succeeded");
        Ok(ServerProbe {
            online: players.online,
            max: players.max,
            ping_millis: Some(elapsed),
            version: document.version,
            players: players.list,
        })
    }
}

/// The single primary source for a deployment: the HTTP fallback when a URL
/// is configured, otherwise the direct query endpoint, otherwise nothing.
pub enum PrimarySource {
    Http(HttpStatusSource),
    Query(QueryClient),
    None,
}

impl PrimarySource {
    pub fn from_config(config: &Config) -> Self {
        if let Some(url) = &config.status_url {
            return Self::Http(HttpStatusSource::new(url.clone(), config.protocol_timeout));
        }
        if let Some(host) = &config.query_host {
            return Self::Query(QueryClient::new(
                host.clone(),
                config.query_port,
                config.protocol_timeout,
            ));
        }
        Self::None
    }

    pub async fn probe(&self) -> Result<ServerProbe, SourceError> {
        match self {
            Self::Http(source) => source.probe().await,
            Self::Query(client) => {
                let started = Instant::now();
                let stat = client.query().await?;
                let elapsed = started.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;
                Ok(ServerProbe {
                    online: stat.online,
                    max: stat.max,
                    ping_millis: Some(elapsed),
                    version: stat.version,
                    players: stat.players.into_iter().collect(),
                })
            }
            Self::None => Err(SourceError::NotConfigured),
        }
    }
}
