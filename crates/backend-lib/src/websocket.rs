// ==================
// crates/backend-lib/src/websocket.rs
// ==================
//! Per-connection protocol state machine.
//!
//! A `ConnectionHandler` is created for every socket and moves through
//! `Unauthenticated -> Authenticated -> Closed`. Until the client has
//! presented the token minted by create/join, everything except
//! `authenticate` is ignored. Once authenticated, playback and chat frames
//! are forwarded to the party actor, which applies the leader check and does
//! the fan-out.
//!
//! The handler never touches the socket itself: frames for the client go
//! through the bounded `outbound` queue, and the caller reacts to the
//! returned [`Flow`].

use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use watchparty_common::{ClientToServer, ServerToClient};

use crate::auth::{ConnectionId, Session};
use crate::error::AppError;
use crate::metrics::WS_AUTH_FAILED;
use crate::party::PlaybackCommand;
use crate::party_actor::PartyHandle;
use crate::validation::validate_chat_message;
use crate::AppState;

const AUTH_FAILED_MESSAGE: &str = "Invalid credentials";

/// What the socket loop should do after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

enum Phase {
    Unauthenticated,
    Authenticated(PartyHandle),
    Closed,
}

pub struct ConnectionHandler {
    id: ConnectionId,
    state: AppState,
    outbound: mpsc::Sender<ServerToClient>,
    phase: Phase,
}

impl ConnectionHandler {
    pub fn new(state: AppState, outbound: mpsc::Sender<ServerToClient>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state,
            outbound,
            phase: Phase::Unauthenticated,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.phase, Phase::Authenticated(_))
    }

    /// Handle one text frame from the client
    pub async fn handle_text(&mut self, text: &str) -> Flow {
        match serde_json::from_str::<ClientToServer>(text) {
            Ok(msg) => self.handle_message(msg).await,
            Err(e) => {
                debug!(connection = %self.id, error = %e, "malformed frame");
                self.reply(ServerToClient::Error {
                    message: format!("Malformed message: {e}"),
                })
                .await
            },
        }
    }

    pub async fn handle_message(&mut self, msg: ClientToServer) -> Flow {
        let msg = match msg {
            ClientToServer::Authenticate {
                username,
                party_id,
                token,
            } => return self.authenticate(&username, &party_id, &token).await,
            other => other,
        };

        let party = match &self.phase {
            Phase::Authenticated(party) => party.clone(),
            Phase::Unauthenticated => {
                debug!(connection = %self.id, "ignoring frame before authentication");
                return Flow::Continue;
            },
            Phase::Closed => return Flow::Close,
        };

        if msg.party_id() != party.id() {
            debug!(connection = %self.id, party_id = %msg.party_id(), "ignoring frame for another party");
            return Flow::Continue;
        }

        let sent = match msg {
            ClientToServer::Play { time, .. } => party.control(self.id, PlaybackCommand::Play(time)),
            ClientToServer::Pause { time, .. } => party.control(self.id, PlaybackCommand::Pause(time)),
            ClientToServer::Seek { time, .. } => party.control(self.id, PlaybackCommand::Seek(time)),
            ClientToServer::Sync {
                time, is_playing, ..
            } => party.control(self.id, PlaybackCommand::Sync { time, is_playing }),
            ClientToServer::ChatMessage { message, .. } => {
                if let Err(e) = validate_chat_message(&message) {
                    debug!(connection = %self.id, error = %e, "dropping chat message");
                    return Flow::Continue;
                }
                party.chat(self.id, message)
            },
            ClientToServer::Authenticate { .. } => return Flow::Continue,
        };

        match sent {
            Ok(()) => Flow::Continue,
            Err(e) => {
                // actor is gone: the party was reclaimed under us
                warn!(connection = %self.id, error = %e, "party unavailable, closing");
                self.phase = Phase::Closed;
                Flow::Close
            },
        }
    }

    async fn authenticate(&mut self, username: &str, party_id: &str, token: &str) -> Flow {
        match self.phase {
            Phase::Authenticated(_) => {
                debug!(connection = %self.id, "already authenticated, ignoring");
                return Flow::Continue;
            },
            Phase::Closed => return Flow::Close,
            Phase::Unauthenticated => {},
        }

        match self.try_attach(username, party_id, token).await {
            Ok(party) => {
                self.state
                    .sessions
                    .insert(self.id, Session::new(username, party_id));
                info!(connection = %self.id, %username, %party_id, "connection authenticated");
                self.phase = Phase::Authenticated(party);
                Flow::Continue
            },
            Err(e) => {
                debug!(connection = %self.id, %username, %party_id, error = %e, "authentication failed");
                counter!(WS_AUTH_FAILED).increment(1);
                let _ = self
                    .outbound
                    .send(ServerToClient::AuthError {
                        message: AUTH_FAILED_MESSAGE.to_string(),
                    })
                    .await;
                self.phase = Phase::Closed;
                Flow::Close
            },
        }
    }

    async fn try_attach(&self, username: &str, party_id: &str, token: &str) -> Result<PartyHandle, AppError> {
        let party = self.state.parties.get(party_id).ok_or(AppError::PartyNotFound)?;
        if party
            .attach(self.id, username, token, self.outbound.clone())
            .await?
        {
            Ok(party)
        } else {
            Err(AppError::Auth("token rejected".to_string()))
        }
    }

    /// Leave the party; safe to call more than once
    pub fn disconnect(&mut self) {
        let phase = std::mem::replace(&mut self.phase, Phase::Closed);
        if let Phase::Authenticated(party) = phase {
            self.state.sessions.remove(&self.id);
            if let Err(e) = party.detach(self.id) {
                debug!(connection = %self.id, error = %e, "party already gone on disconnect");
            }
            info!(connection = %self.id, party_id = %party.id(), "connection closed");
        }
    }

    async fn reply(&self, frame: ServerToClient) -> Flow {
        match self.outbound.send(frame).await {
            Ok(()) => Flow::Continue,
            Err(_) => Flow::Close,
        }
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        self.disconnect();
    }
}
