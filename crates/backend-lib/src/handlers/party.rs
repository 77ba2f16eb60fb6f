// ============================
// crates/backend-lib/src/handlers/party.rs
// ============================
//! Party HTTP endpoints: create, join, set-video and start-stream.
use axum::{extract::State, Json};
use tracing::info;
use watchparty_common::{
    CreatePartyRequest, CreatePartyResponse, JoinPartyRequest, JoinPartyResponse, SetVideoRequest,
    StartStreamRequest, StartStreamResponse, SuccessResponse,
};

use crate::error::AppError;
use crate::validation::{validate_party_id, validate_password, validate_username, validate_video_url};
use crate::AppState;

/// A malformed ID can never name a live party
fn known_party_id(party_id: &str) -> Result<&str, AppError> {
    validate_party_id(party_id).map_err(|_| AppError::PartyNotFound)
}

/// Trimmed, validated URL; `None` when absent or blank
fn optional_video_url(url: Option<&str>) -> Result<Option<String>, AppError> {
    match url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => Ok(Some(validate_video_url(url)?.to_string())),
        None => Ok(None),
    }
}

/// `POST /api/create-party`
pub async fn create_party(
    State(state): State<AppState>,
    Json(req): Json<CreatePartyRequest>,
) -> Result<Json<CreatePartyResponse>, AppError> {
    validate_username(&req.username)?;
    validate_password(&req.password)?;
    let video_url = optional_video_url(req.video_url.as_deref())?;

    let created = state
        .parties
        .create_party(&req.username, &req.password, video_url)
        .await?;

    Ok(Json(CreatePartyResponse {
        party_id: created.party_id,
        token: created.token,
    }))
}

/// `POST /api/join-party`
pub async fn join_party(
    State(state): State<AppState>,
    Json(req): Json<JoinPartyRequest>,
) -> Result<Json<JoinPartyResponse>, AppError> {
    let party_id = known_party_id(&req.party_id)?;
    validate_username(&req.username)?;
    validate_password(&req.password)?;

    let token = state
        .parties
        .join_party(party_id, &req.username, &req.password)
        .await?;

    Ok(Json(JoinPartyResponse {
        success: true,
        token,
    }))
}

/// `POST /api/set-video`
///
/// Refused unless the caller leads the party and no video was set yet.
pub async fn set_video(
    State(state): State<AppState>,
    Json(req): Json<SetVideoRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let url = validate_video_url(&req.video_url)?;

    if !state
        .parties
        .set_video_url(&req.party_id, &req.username, url)
        .await?
    {
        return Err(AppError::Forbidden(format!(
            "{} may not set the video of party {}",
            req.username, req.party_id
        )));
    }

    Ok(Json(SuccessResponse { success: true }))
}

/// `POST /api/start-stream`
///
/// Uses the URL from the body, or the party's video when the body has none.
pub async fn start_stream(
    State(state): State<AppState>,
    Json(req): Json<StartStreamRequest>,
) -> Result<Json<StartStreamResponse>, AppError> {
    let party_id = known_party_id(&req.party_id)?;
    let party = state.parties.get(party_id).ok_or(AppError::PartyNotFound)?;

    let source_url = match optional_video_url(req.video_url.as_deref())? {
        Some(url) => url,
        None => party
            .snapshot()
            .await?
            .video_url
            .ok_or_else(|| AppError::InvalidInput("No video URL provided".to_string()))?,
    };

    let stream_url = state.streams.start_stream(party_id, &source_url).await?;
    info!(%party_id, %stream_url, "stream started");

    Ok(Json(StartStreamResponse {
        success: true,
        stream_url,
    }))
}
