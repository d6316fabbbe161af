use crate::Context;
use dclink_backend::helpers::{dash_uuid, format_playtime, now};
use dclink_backend::panel::render_panel;
use dclink_db::DbError;
use poise::CreateReply;
use poise::command;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};
use serde::Deserialize;

pub(crate) type Error = Box<dyn std::error::Error + Send + Sync>;

#[derive(Deserialize)]
struct MojangProfile {
    id: String,
}

/// Resolve a username to a dashed UUID via the Mojang profile API.
async fn resolve_uuid(client: &reqwest::Client, name: &str) -> Result<Option<String>, Error> {
    let url = format!("https://api.mojang.com/users/profiles/minecraft/{name}");
    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        return Ok(None);
    }
    // Unknown names historically come back as 204 with an empty body
    let profile: Option<MojangProfile> = response.json().await.ok();
    Ok(profile.and_then(|p| dash_uuid(&p.id)))
}

/// Link your Minecraft account to your Discord account
#[command(slash_command, prefix_command)]
pub async fn link(
    ctx: Context<'_>,
    #[description = "Your Minecraft username"] minecraft_name: String,
) -> Result<(), Error> {
    let data = ctx.data();

    if dclink_backend::validation::validate_player_name(&minecraft_name).is_err() {
        ctx.send(
            CreateReply::default()
                .content("That doesn't look like a valid Minecraft username.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let Some(uuid) = resolve_uuid(&data.http_client, &minecraft_name).await? else {
        ctx.send(
            CreateReply::default()
                .content("Could not find that Minecraft name. Double-check spelling.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };

    let result = data
        .state
        .db
        .link_account(
            uuid,
            ctx.author().id.get(),
            minecraft_name.clone(),
            now(),
            data.max_accounts,
        )
        .await;

    let message = match result {
        Ok(_) => {
            let taken = data.state.db.linked_count().await.unwrap_or(0);
            format!(
                "Successfully linked `{minecraft_name}`! You can now join the server. \
                 ({taken}/{} slots used)",
                data.max_accounts
            )
        }
        Err(DbError::AlreadyLinked) => {
            "Either your Discord account or this Minecraft account is already linked.".to_string()
        }
        Err(DbError::RegistrationFull) => format!(
            "Registration is full. A maximum of {} accounts can be linked.",
            data.max_accounts
        ),
        Err(err) => {
            tracing::error!(?err, "link failed");
            "Something went wrong, please try again later.".to_string()
        }
    };

    ctx.send(CreateReply::default().content(message).ephemeral(true))
        .await?;
    Ok(())
}

/// Remove the link between your Discord and Minecraft accounts
#[command(slash_command, prefix_command)]
pub async fn unlink(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();

    let message = match data.state.db.unlink_account(ctx.author().id.get()).await {
        Ok(()) => "Your Minecraft account has been unlinked.".to_string(),
        Err(DbError::AccountNotFound) => {
            "No Minecraft account is currently linked to your Discord.".to_string()
        }
        Err(err) => {
            tracing::error!(?err, "unlink failed");
            "Something went wrong, please try again later.".to_string()
        }
    };

    ctx.send(CreateReply::default().content(message).ephemeral(true))
        .await?;
    Ok(())
}

/// Show which Minecraft account is linked to your Discord account
#[command(slash_command, prefix_command)]
pub async fn whoami(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let account = data
        .state
        .db
        .account_for_discord(ctx.author().id.get())
        .await?;

    let message = match account {
        Some(account) => format!(
            "Your Discord is linked to `{}` (UUID `{}`).",
            account.username, account.uuid
        ),
        None => "No Minecraft account is currently linked to your Discord.".to_string(),
    };

    ctx.send(CreateReply::default().content(message).ephemeral(true))
        .await?;
    Ok(())
}

/// Show gameplay stats for a linked player
#[command(slash_command, prefix_command)]
pub async fn stats(
    ctx: Context<'_>,
    #[description = "Minecraft username (defaults to your linked account)"] name: Option<String>,
) -> Result<(), Error> {
    let data = ctx.data();

    let name = match name {
        Some(name) => name,
        None => match data
            .state
            .db
            .account_for_discord(ctx.author().id.get())
            .await?
        {
            Some(account) => account.username,
            None => {
                ctx.send(
                    CreateReply::default()
                        .content("You have no linked account; pass a username instead.")
                        .ephemeral(true),
                )
                .await?;
                return Ok(());
            }
        },
    };

    ctx.defer().await?;

    let Some(view) = data.state.refresher.lookup(&name).await? else {
        ctx.send(CreateReply::default().content(format!("No stats recorded for `{name}`.")))
            .await?;
        return Ok(());
    };

    let footer = if view.live {
        "Live from the server".to_string()
    } else {
        format!(
            "Cached; last refreshed {} ago",
            format_playtime(now() - view.profile.last_updated)
        )
    };

    let embed = CreateEmbed::default()
        .title(format!("Stats for {name}"))
        .field("Level", view.profile.level.to_string(), true)
        .field(
            "Playtime",
            format_playtime(view.profile.playtime_seconds),
            true,
        )
        .field("Deaths", view.profile.deaths.to_string(), true)
        .color(0x5865F2)
        .footer(CreateEmbedFooter::new(footer));

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show the current server status
#[command(slash_command, prefix_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let snapshot = data.state.cache.snapshot(data.state.presence.len());
    let players = data.state.presence.current();

    ctx.send(
        CreateReply::default()
            .content(render_panel(&snapshot, &players))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
