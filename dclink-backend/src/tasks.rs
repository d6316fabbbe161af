//! Background loops: the fast panel-publish cycle and the slow profile
//! drain. Both are owned by a [`TaskSet`] and cancelled as a unit on
//! shutdown. Shared state is only ever mutated between suspension points, so
//! an abort never leaves the cache or the panel handle half-written.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

use crate::aggregator::StatusAggregator;
use crate::error::SourceError;
use crate::panel::{PanelChannel, PanelPublisher};
use crate::presence::PresenceTracker;
use crate::profiles::ProfileRefresher;
use crate::status::PrimarySource;

/// Owns the periodic tasks. Dropping without `shutdown` leaves them running;
/// call `shutdown` during teardown.
pub struct TaskSet {
    loops: Vec<AbortHandle>,
    supervisors: Vec<JoinHandle<()>>,
}

impl TaskSet {
    /// Cancel both periodic loops as a unit. The supervisors observe the
    /// cancellation and exit on their own.
    pub fn shutdown(self) {
        for handle in &self.loops {
            handle.abort();
        }
        for handle in &self.supervisors {
            handle.abort();
        }
    }
}

/// Watches a loop task; regular cancellation is clean, anything else clears
/// the health flag so `/health` starts reporting degraded.
fn supervise(name: &'static str, healthy: Arc<AtomicBool>, task: JoinHandle<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match task.await {
            Ok(()) => {}
            Err(err) if err.is_cancelled() => {}
            Err(err) => {
                error!(task = name, %err, "background task terminated unexpectedly");
                healthy.store(false, Ordering::SeqCst);
            }
        }
    })
}

#[allow(clippy::too_many_arguments)]
pub fn spawn_loops<C: PanelChannel + 'static>(
    aggregator: Arc<StatusAggregator>,
    publisher: Arc<PanelPublisher<C>>,
    refresher: Arc<ProfileRefresher>,
    presence: Arc<PresenceTracker>,
    source: Arc<PrimarySource>,
    publish_notify: Arc<Notify>,
    healthy: Arc<AtomicBool>,
    publish_interval: Duration,
    refresh_interval: Duration,
) -> TaskSet {
    // Fast loop: pull-refresh presence, aggregate, publish the panel. Also
    // woken early by push events so the panel reacts to joins/leaves.
    let fast = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(publish_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = presence.pull_refresh(&source).await {
                        debug!(%err, "presence pull skipped");
                    }
                }
                // Event-triggered publish; the push already mutated state,
                // skip the pull and go straight to rendering.
                _ = publish_notify.notified() => {}
            }

            let snapshot = aggregator.refresh().await;
            let players = presence.current();
            match publisher.publish(&snapshot, &players).await {
                Ok(()) => {}
                Err(SourceError::NotConfigured) => {
                    debug!("panel not configured, skipping publish");
                }
                Err(SourceError::Unavailable) => {
                    warn!("panel publish failed, retrying next cycle");
                }
            }
        }
    });

    // Slow loop: drain per-player stats into durable storage.
    let slow = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            refresher.drain().await;
        }
    });

    let loops = vec![fast.abort_handle(), slow.abort_handle()];
    let supervisors = vec![
        supervise("panel-publish", Arc::clone(&healthy), fast),
        supervise("profile-drain", Arc::clone(&healthy), slow),
    ];

    TaskSet { loops, supervisors }
}
