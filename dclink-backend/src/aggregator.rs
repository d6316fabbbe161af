//! Merges the primary status source with the sticky last-known-good cache.
//!
//! The invariant that matters: a transient source failure never blanks a
//! field that was previously known. Ping and version are sticky for the
//! process lifetime; world day/time are only ever set by the explicit push
//! endpoint, never inferred from a probe.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::debug;

use crate::presence::PresenceTracker;
use crate::status::{PrimarySource, ServerProbe};

/// One coherent view of the game server, produced per aggregation cycle.
/// Fields that have never been resolved are None; stale-but-known fields
/// keep their last value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub online: u32,
    pub max: u32,
    pub ping_millis: Option<u32>,
    pub version_label: Option<String>,
    pub world_day: Option<i64>,
    pub world_time_ticks: Option<i64>,
}

#[derive(Debug, Default)]
struct CacheInner {
    online: Option<u32>,
    max: Option<u32>,
    ping_millis: Option<u32>,
    version_label: Option<String>,
    world_day: Option<i64>,
    world_time_ticks: Option<i64>,
}

/// Process-lifetime cache of the last known server state. Updates are single
/// uninterrupted steps under a plain mutex; readers take a snapshot copy.
#[derive(Debug, Default)]
pub struct StickyCache {
    inner: Mutex<CacheInner>,
}

impl StickyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a successful probe. Counts are always fresh; ping and version
    /// only overwrite when the probe resolved them.
    pub fn record_probe(&self, probe: &ServerProbe) {
        let mut inner = self.inner.lock().unwrap();
        inner.online = Some(probe.online);
        inner.max = Some(probe.max);
        if probe.ping_millis.is_some() {
            inner.ping_millis = probe.ping_millis;
        }
        if probe.version.is_some() {
            inner.version_label = probe.version.clone();
        }
    }

    /// World time comes only from the explicit push boundary.
    pub fn push_world_status(&self, day: i64, time_ticks: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.world_day = Some(day);
        inner.world_time_ticks = Some(time_ticks);
    }

    /// Build a snapshot from the cache alone. When the cache has never seen
    /// an online count, the live presence size stands in for it.
    pub fn snapshot(&self, fallback_online: usize) -> StatusSnapshot {
        let inner = self.inner.lock().unwrap();
        StatusSnapshot {
            online: inner.online.unwrap_or(fallback_online as u32),
            max: inner.max.unwrap_or(0),
            ping_millis: inner.ping_millis,
            version_label: inner.version_label.clone(),
            world_day: inner.world_day,
            world_time_ticks: inner.world_time_ticks,
        }
    }
}

/// Produces the merged snapshot each cycle.
pub struct StatusAggregator {
    source: Arc<PrimarySource>,
    cache: Arc<StickyCache>,
    presence: Arc<PresenceTracker>,
}

impl StatusAggregator {
    pub fn new(
        source: Arc<PrimarySource>,
        cache: Arc<StickyCache>,
        presence: Arc<PresenceTracker>,
    ) -> Self {
        Self {
            source,
            cache,
            presence,
        }
    }

    /// One aggregation cycle: probe the primary source, fold the result into
    /// the sticky cache, and return the merged snapshot. A failed probe
    /// degrades to the cache; it is never surfaced as an error.
    pub async fn refresh(&self) -> StatusSnapshot {
        match self.source.probe().await {
            Ok(probe) => self.cache.record_probe(&probe),
            Err(err) => debug!(%err, "primary source unavailable, serving cache"),
        }
        self.cache.snapshot(self.presence.len())
    }
}
