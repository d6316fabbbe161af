use crate::AppState;
use crate::error::AppError;
use crate::validation;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::TypedHeader;
use axum_macros::debug_handler;
use headers::Authorization;
use headers::authorization::Bearer;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;

#[derive(Deserialize)]
pub(crate) struct TransitionRequest {
    player: String,
}

#[derive(Deserialize)]
pub(crate) struct WorldStatusRequest {
    day: i64,
    time: i64,
}

#[derive(Serialize)]
pub(crate) struct RegistrationResponse {
    registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    discord_id: Option<u64>,
}

#[derive(Serialize)]
pub(crate) struct StatusResponse {
    #[serde(flatten)]
    snapshot: crate::aggregator::StatusSnapshot,
    players: Vec<String>,
}

/// Verify the bearer token against the configured key hash.
fn authorize(state: &AppState, auth: &Authorization<Bearer>) -> Result<(), AppError> {
    if state.api_key_hash.is_empty()
        || crate::helpers::hash_api_key(auth.token()) != state.api_key_hash
    {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

#[debug_handler]
pub(crate) async fn join(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<TransitionRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&state, &auth)?;
    validation::validate_player_name(&payload.player)?;

    state.presence.on_join(&payload.player);
    state.publish_notify.notify_one();

    Ok(StatusCode::OK)
}

pub(crate) async fn leave(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<TransitionRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&state, &auth)?;
    validation::validate_player_name(&payload.player)?;

    state.presence.on_leave(&payload.player);
    state.publish_notify.notify_one();

    Ok(StatusCode::OK)
}

/// World day/time push: these fields are never inferred from a probe, they
/// only enter the sticky cache here.
pub(crate) async fn world_status(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<WorldStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&state, &auth)?;
    validation::validate_world_status(payload.day, payload.time)?;

    state.cache.push_world_status(payload.day, payload.time);
    state.publish_notify.notify_one();

    Ok(StatusCode::OK)
}

/// Read-side view of the aggregated snapshot plus the presence list.
pub(crate) async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = state.cache.snapshot(state.presence.len());
    let players = state.presence.current();

    Ok((
        StatusCode::OK,
        Json(StatusResponse { snapshot, players }),
    ))
}

/// Registration check for the game server plugin: is this account UUID
/// linked, and to whom. Unregistered is a normal answer, not an error.
pub(crate) async fn registration(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&state, &auth)?;
    validation::validate_uuid(&uuid)?;

    let account = state.db.account_for_uuid(uuid).await?;

    Ok((
        StatusCode::OK,
        Json(RegistrationResponse {
            registered: account.is_some(),
            discord_id: account.map(|account| account.discord_id),
        }),
    ))
}

/// On-demand profile lookup: live rcon fetch first, durable row otherwise.
pub(crate) async fn profile(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&state, &auth)?;
    validation::validate_player_name(&name)?;

    let Some(view) = state.refresher.lookup(&name).await? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "No profile found"})),
        ));
    };

    Ok((
        StatusCode::OK,
        Json(json!({
            "uuid": view.profile.uuid,
            "level": view.profile.level,
            "playtime_seconds": view.profile.playtime_seconds,
            "deaths": view.profile.deaths,
            "last_updated": view.profile.last_updated,
            "live": view.live,
        })),
    ))
}

/// Degrades to 503 once a background loop has died.
pub(crate) async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
