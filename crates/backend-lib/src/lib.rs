// ============================
// watchparty-backend/src/lib.rs
// ============================
//! Core backend functionality for the watch party server.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod party;
pub mod party_actor;
pub mod registry;
pub mod retention;
pub mod stream;
pub mod validation;
pub mod websocket;
pub mod ws_router;

use std::sync::Arc;

use crate::auth::{CredentialStore, SessionDirectory};
use crate::config::Settings;
use crate::error::AppError;
use crate::registry::PartyRegistry;
use crate::stream::{FfmpegTranscoder, StreamOrchestrator, Transcoder};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Settings
    pub settings: Arc<Settings>,
    /// Live parties and the credential store
    pub parties: Arc<PartyRegistry>,
    /// Authenticated realtime connections
    pub sessions: SessionDirectory,
    /// Transcode jobs and HLS output
    pub streams: Arc<StreamOrchestrator>,
}

impl AppState {
    /// Create a new application state that transcodes with ffmpeg
    pub fn new(settings: Settings) -> Result<Self, AppError> {
        let transcoder = Arc::new(FfmpegTranscoder::from_settings(&settings.stream));
        Self::with_transcoder(settings, transcoder)
    }

    /// Create a new application state with a custom transcoder
    pub fn with_transcoder(settings: Settings, transcoder: Arc<dyn Transcoder>) -> Result<Self, AppError> {
        let credentials = CredentialStore::new(settings.auth.scrypt_log_n)?;
        let parties = Arc::new(PartyRegistry::new(credentials));
        let streams = Arc::new(StreamOrchestrator::new(
            Arc::clone(&parties),
            transcoder,
            settings.stream.clone(),
            settings.public_url.clone(),
        ));

        Ok(Self {
            settings: Arc::new(settings),
            parties,
            sessions: SessionDirectory::new(),
            streams,
        })
    }
}
