//! The status panel: deterministic render plus idempotent create-or-update
//! of a single Discord message.
//!
//! At most one live message handle exists per deployment. The handle mutex
//! serializes the check-then-create/edit sequence, so overlapping publishes
//! (fast timer + event trigger) can never create two live messages.

use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{debug, info};

use crate::aggregator::StatusSnapshot;
use crate::error::SourceError;

/// Rendered player list is capped to keep the message well under Discord's
/// 2000-char limit.
const PLAYER_LIST_LIMIT: usize = 1000;

/// Outcome of editing an existing panel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Ok,
    /// The message no longer exists; the caller creates a fresh one.
    NotFound,
}

/// The chat-platform boundary the publisher drives. `NotFound`/missing from
/// any operation means the same thing: recreate the message.
pub trait PanelChannel: Send + Sync {
    fn create(&self, content: &str) -> impl Future<Output = Result<u64, SourceError>> + Send;
    fn edit(
        &self,
        handle: u64,
        content: &str,
    ) -> impl Future<Output = Result<EditOutcome, SourceError>> + Send;
    fn resolve(&self, handle: u64) -> impl Future<Output = Result<bool, SourceError>> + Send;
}

/// Render the snapshot and player list into the panel payload.
pub fn render_panel(snapshot: &StatusSnapshot, players: &[String]) -> String {
    let mut lines = Vec::with_capacity(5);
    lines.push("**Server Status**".to_string());

    if snapshot.max > 0 {
        lines.push(format!("Online: {}/{}", snapshot.online, snapshot.max));
    } else {
        lines.push(format!("Online: {}", snapshot.online));
    }

    if let Some(ping) = snapshot.ping_millis {
        lines.push(format!("Ping: {ping} ms"));
    }

    if let Some(version) = &snapshot.version_label {
        lines.push(format!("Version: {version}"));
    }

    match (snapshot.world_day, snapshot.world_time_ticks) {
        (Some(day), Some(time)) => lines.push(format!("World: day {day}, time {time}")),
        _ => lines.push("World: unknown".to_string()),
    }

    if players.is_empty() {
        lines.push("Players: none online".to_string());
    } else {
        let mut sorted: Vec<&str> = players.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        lines.push(format!("Players: {}", truncate_list(&sorted)));
    }

    lines.join("\n")
}

/// Join names with commas, cutting off with an ellipsis once the rendered
/// list passes the limit.
fn truncate_list(names: &[&str]) -> String {
    let mut out = String::new();
    for name in names {
        let sep = if out.is_empty() { 0 } else { 2 };
        if out.len() + sep + name.len() > PLAYER_LIST_LIMIT {
            out.push('…');
            break;
        }
        if sep > 0 {
            out.push_str(", ");
        }
        out.push_str(name);
    }
    out
}

/// Owns the single panel message handle and performs the idempotent upsert.
pub struct PanelPublisher<C> {
    channel: C,
    handle: tokio::sync::Mutex<Option<u64>>,
}

impl<C: PanelChannel> PanelPublisher<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Render and upsert. Creates the message on first publish or when the
    /// held handle no longer resolves; edits in place otherwise.
    pub async fn publish(
        &self,
        snapshot: &StatusSnapshot,
        players: &[String],
    ) -> Result<(), SourceError> {
        let content = render_panel(snapshot, players);

        // Serialization point: everything from the handle check to the
        // handle replacement happens under this lock.
        let mut handle = self.handle.lock().await;

        if let Some(id) = *handle {
            if self.channel.resolve(id).await? {
                match self.channel.edit(id, &content).await? {
                    EditOutcome::Ok => {
                        debug!(message_id = id, "panel edited");
                        return Ok(());
                    }
                    // Deleted between resolve and edit; fall through
                    EditOutcome::NotFound => {}
                }
            }
            debug!(message_id = id, "panel message missing, recreating");
        }

        let id = self.channel.create(&content).await?;
        *handle = Some(id);
        info!(message_id = id, "panel created");
        Ok(())
    }
}

/// Discord implementation of the panel boundary.
pub struct DiscordPanel {
    http: Arc<serenity::Http>,
    channel_id: u64,
}

impl DiscordPanel {
    /// A channel id of zero means the panel is disabled for this deployment.
    pub fn new(http: Arc<serenity::Http>, channel_id: u64) -> Self {
        Self {
            http,
            channel_id,
        }
    }

    fn channel(&self) -> Result<serenity::ChannelId, SourceError> {
        if self.channel_id == 0 {
            return Err(SourceError::NotConfigured);
        }
        Ok(serenity::ChannelId::new(self.channel_id))
    }
}

fn is_not_found(err: &serenity::Error) -> bool {
    matches!(
        err,
        serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response))
            if response.status_code.as_u16() == 404
    )
}

impl PanelChannel for DiscordPanel {
    async fn create(&self, content: &str) -> Result<u64, SourceError> {
        let message = self
            .channel()?
            .send_message(&self.http, serenity::CreateMessage::new().content(content))
            .await
            .map_err(|_| SourceError::Unavailable)?;
        Ok(message.id.get())
    }

    async fn edit(&self, handle: u64, content: &str) -> Result<EditOutcome, SourceError> {
        match self
            .channel()?
            .edit_message(
                &self.http,
                serenity::MessageId::new(handle),
                serenity::EditMessage::new().content(content),
            )
            .await
        {
            Ok(_) => Ok(EditOutcome::Ok),
            Err(err) if is_not_found(&err) => Ok(EditOutcome::NotFound),
            Err(_) => Err(SourceError::Unavailable),
        }
    }

    async fn resolve(&self, handle: u64) -> Result<bool, SourceError> {
        match self
            .channel()?
            .message(&self.http, serenity::MessageId::new(handle))
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_not_found(&err) => Ok(false),
            Err(_) => Err(SourceError::Unavailable),
        }
    }
}
