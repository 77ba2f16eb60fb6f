// =============
// tests/common/mod.rs
// =============
//! Shared setup for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;
use watchparty_backend::config::Settings;
use watchparty_backend::error::AppError;
use watchparty_backend::registry::PartyCreated;
use watchparty_backend::stream::{HlsOutput, TranscodeJob, Transcoder};
use watchparty_backend::websocket::{ConnectionHandler, Flow};
use watchparty_backend::AppState;
use watchparty_common::{ClientToServer, ServerToClient};

/// Writes a playlist and one segment, then keeps running until cancelled
pub struct InstantTranscoder;

#[async_trait]
impl Transcoder for InstantTranscoder {
    async fn launch(&self, _source_url: &str, output: &HlsOutput) -> Result<TranscodeJob, AppError> {
        let output = output.clone();
        Ok(Box::pin(async move {
            tokio::fs::write(output.dir().join("stream000.ts"), b"ts")
                .await
                .map_err(|e| e.to_string())?;
            tokio::fs::write(output.manifest_path(), b"#EXTM3U")
                .await
                .map_err(|e| e.to_string())?;
            std::future::pending::<()>().await;
            Ok(())
        }))
    }
}

/// Fast settings rooted in a temporary directory
pub fn test_settings(root: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.public_url = "http://watch.test".to_string();
    settings.auth.scrypt_log_n = 4;
    settings.stream.streams_dir = root.path().to_path_buf();
    settings.stream.poll_interval_ms = 10;
    settings.stream.ready_timeout_secs = 5;
    settings
}

/// Set up the test environment. Keep the `TempDir` alive for the whole test.
pub fn setup_test_env() -> (AppState, TempDir) {
    let root = TempDir::new().unwrap();
    let state = AppState::with_transcoder(test_settings(&root), Arc::new(InstantTranscoder)).unwrap();
    (state, root)
}

/// A protocol connection driven directly, without a socket
pub struct TestClient {
    pub handler: ConnectionHandler,
    pub rx: mpsc::Receiver<ServerToClient>,
}

impl TestClient {
    pub fn new(state: &AppState) -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            handler: ConnectionHandler::new(state.clone(), tx),
            rx,
        }
    }

    pub async fn send(&mut self, msg: ClientToServer) -> Flow {
        self.handler.handle_message(msg).await
    }

    pub async fn authenticate(&mut self, username: &str, party_id: &str, token: &str) -> Flow {
        self.send(ClientToServer::Authenticate {
            username: username.to_string(),
            party_id: party_id.to_string(),
            token: token.to_string(),
        })
        .await
    }

    /// Everything queued for this client so far
    pub fn drain(&mut self) -> Vec<ServerToClient> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

/// Wait until the party actor has handled everything sent to it so far
pub async fn settle(state: &AppState, party_id: &str) {
    state
        .parties
        .get(party_id)
        .unwrap()
        .snapshot()
        .await
        .unwrap();
}

/// Party led by `leader` with `followers` joined
pub async fn party_with(
    state: &AppState,
    leader: &str,
    followers: &[&str],
) -> (PartyCreated, Vec<String>) {
    let created = state.parties.create_party(leader, "pw", None).await.unwrap();
    let mut tokens = Vec::new();
    for follower in followers {
        tokens.push(
            state
                .parties
                .join_party(&created.party_id, follower, "pw")
                .await
                .unwrap(),
        );
    }
    (created, tokens)
}

pub fn online(users: &[&str], leader: &str) -> ServerToClient {
    ServerToClient::OnlineUsers {
        users: users.iter().map(|u| u.to_string()).collect(),
        leader: leader.to_string(),
    }
}
