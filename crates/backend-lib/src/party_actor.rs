// ============================
// watchparty-backend/src/party_actor.rs
// ============================
//! One task per party. The actor owns the [`Party`] and its live connections
//! and handles commands one at a time, so playback mutations for a party are
//! serialized while different parties run in parallel.
use std::time::{Duration, Instant};

use metrics::counter;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use watchparty_common::ServerToClient;

use crate::auth::ConnectionId;
use crate::error::AppError;
use crate::metrics::{CHAT_RELAYED, CONTROL_IGNORED};
use crate::party::{ControlOutcome, Party, PartyId, PlaybackCommand};

/// Message sent *into* the actor
#[derive(Debug)]
pub enum PartyMsg {
    Join {
        username: String,
        resp_tx: oneshot::Sender<Option<String>>,
    },
    SetVideo {
        username: String,
        url: String,
        resp_tx: oneshot::Sender<bool>,
    },
    Attach {
        connection: ConnectionId,
        username: String,
        token: String,
        outbound: mpsc::Sender<ServerToClient>,
        resp_tx: oneshot::Sender<bool>,
    },
    Detach {
        connection: ConnectionId,
    },
    Control {
        connection: ConnectionId,
        command: PlaybackCommand,
    },
    Chat {
        connection: ConnectionId,
        message: String,
    },
    StreamReady {
        url: String,
    },
    StreamFailed {
        message: String,
    },
    /// Drop the announced stream before its output is replaced.
    /// Replies whether the party is still live.
    StreamReset {
        resp_tx: oneshot::Sender<bool>,
    },
    /// Whether the party still accepts joins
    IsOpen {
        resp_tx: oneshot::Sender<bool>,
    },
    Snapshot {
        resp_tx: oneshot::Sender<PartySnapshot>,
    },
    RetireIfIdle {
        grace: Duration,
        resp_tx: oneshot::Sender<bool>,
    },
}

/// Point-in-time copy of a party's state
#[derive(Debug, Clone, PartialEq)]
pub struct PartySnapshot {
    pub id: PartyId,
    pub leader: String,
    pub members: Vec<String>,
    pub video_url: Option<String>,
    pub current_time: f64,
    pub is_playing: bool,
    pub stream_ready: bool,
    pub stream_url: Option<String>,
    pub online_users: Vec<String>,
    pub connections: usize,
    pub idle_since: Option<Instant>,
}

/// Handle that other components keep: the actor's command channel
#[derive(Clone, Debug)]
pub struct PartyHandle {
    id: PartyId,
    cmd_tx: mpsc::UnboundedSender<PartyMsg>,
}

impl PartyHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Record `username` as a member and mint a fresh token.
    /// Fails when the party was retired concurrently.
    pub async fn join(&self, username: &str) -> Result<String, AppError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.cmd_tx.send(PartyMsg::Join {
            username: username.to_string(),
            resp_tx,
        })?;
        resp_rx.await?.ok_or(AppError::PartyNotFound)
    }

    pub async fn set_video_url(&self, username: &str, url: &str) -> Result<bool, AppError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.cmd_tx.send(PartyMsg::SetVideo {
            username: username.to_string(),
            url: url.to_string(),
            resp_tx,
        })?;
        Ok(resp_rx.await?)
    }

    /// Join the broadcast group if `token` is the one issued to `username`
    pub async fn attach(
        &self,
        connection: ConnectionId,
        username: &str,
        token: &str,
        outbound: mpsc::Sender<ServerToClient>,
    ) -> Result<bool, AppError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.cmd_tx.send(PartyMsg::Attach {
            connection,
            username: username.to_string(),
            token: token.to_string(),
            outbound,
            resp_tx,
        })?;
        Ok(resp_rx.await?)
    }

    pub fn detach(&self, connection: ConnectionId) -> Result<(), AppError> {
        self.cmd_tx.send(PartyMsg::Detach { connection })?;
        Ok(())
    }

    pub fn control(&self, connection: ConnectionId, command: PlaybackCommand) -> Result<(), AppError> {
        self.cmd_tx.send(PartyMsg::Control {
            connection,
            command,
        })?;
        Ok(())
    }

    pub fn chat(&self, connection: ConnectionId, message: String) -> Result<(), AppError> {
        self.cmd_tx.send(PartyMsg::Chat {
            connection,
            message,
        })?;
        Ok(())
    }

    pub fn stream_ready(&self, url: String) -> Result<(), AppError> {
        self.cmd_tx.send(PartyMsg::StreamReady { url })?;
        Ok(())
    }

    pub fn stream_failed(&self, message: String) -> Result<(), AppError> {
        self.cmd_tx.send(PartyMsg::StreamFailed { message })?;
        Ok(())
    }

    /// Clear the party's stream URL. Fails with `PartyNotFound` once retired.
    pub async fn reset_stream(&self) -> Result<(), AppError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.cmd_tx.send(PartyMsg::StreamReset { resp_tx })?;
        if resp_rx.await? {
            Ok(())
        } else {
            Err(AppError::PartyNotFound)
        }
    }

    /// `false` once the party was retired
    pub async fn is_open(&self) -> Result<bool, AppError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.cmd_tx.send(PartyMsg::IsOpen { resp_tx })?;
        Ok(resp_rx.await?)
    }

    pub async fn snapshot(&self) -> Result<PartySnapshot, AppError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.cmd_tx.send(PartyMsg::Snapshot { resp_tx })?;
        Ok(resp_rx.await?)
    }

    /// Retire the party if it has had no live connection for at least `grace`.
    /// A retired party rejects further joins and attaches.
    pub async fn retire_if_idle(&self, grace: Duration) -> Result<bool, AppError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.cmd_tx.send(PartyMsg::RetireIfIdle { grace, resp_tx })?;
        Ok(resp_rx.await?)
    }
}

struct LiveConnection {
    id: ConnectionId,
    username: String,
    outbound: mpsc::Sender<ServerToClient>,
}

pub struct PartyActor {
    party: Party,
    connections: Vec<LiveConnection>,
    idle_since: Option<Instant>,
    retired: bool,
}

impl PartyActor {
    pub fn new(party: Party) -> Self {
        PartyActor {
            party,
            connections: Vec::new(),
            idle_since: Some(Instant::now()),
            retired: false,
        }
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<PartyMsg>) {
        while let Some(msg) = rx.recv().await {
            self.handle(msg);
        }
        debug!(party_id = %self.party.id(), "party actor stopped");
    }

    fn handle(&mut self, msg: PartyMsg) {
        match msg {
            PartyMsg::Join { username, resp_tx } => {
                let token = (!self.retired).then(|| {
                    self.party.add_member(username.as_str());
                    self.party.issue_token(&username)
                });
                let _ = resp_tx.send(token);
            },
            PartyMsg::SetVideo {
                username,
                url,
                resp_tx,
            } => {
                let accepted = self.party.set_video_url(&username, url.as_str());
                if accepted {
                    info!(party_id = %self.party.id(), %url, "video set");
                    self.broadcast(&ServerToClient::VideoSet { url });
                }
                let _ = resp_tx.send(accepted);
            },
            PartyMsg::Attach {
                connection,
                username,
                token,
                outbound,
                resp_tx,
            } => {
                let accepted = self.attach(connection, username, &token, outbound);
                let _ = resp_tx.send(accepted);
            },
            PartyMsg::Detach { connection } => self.detach(connection),
            PartyMsg::Control {
                connection,
                command,
            } => self.control(connection, command),
            PartyMsg::Chat {
                connection,
                message,
            } => self.chat(connection, message),
            PartyMsg::StreamReady { url } => {
                self.party.mark_stream_ready(url.as_str());
                self.broadcast(&ServerToClient::StreamReady { url });
            },
            PartyMsg::StreamFailed { message } => {
                self.broadcast(&ServerToClient::StreamError { message });
            },
            PartyMsg::StreamReset { resp_tx } => {
                if !self.retired {
                    self.party.clear_stream();
                }
                let _ = resp_tx.send(!self.retired);
            },
            PartyMsg::IsOpen { resp_tx } => {
                let _ = resp_tx.send(!self.retired);
            },
            PartyMsg::Snapshot { resp_tx } => {
                let _ = resp_tx.send(self.snapshot());
            },
            PartyMsg::RetireIfIdle { grace, resp_tx } => {
                let idle = self
                    .idle_since
                    .is_some_and(|since| since.elapsed() >= grace);
                if idle {
                    self.retired = true;
                }
                let _ = resp_tx.send(idle);
            },
        }
    }

    fn attach(
        &mut self,
        connection: ConnectionId,
        username: String,
        token: &str,
        outbound: mpsc::Sender<ServerToClient>,
    ) -> bool {
        if self.retired || !self.party.token_matches(&username, token) {
            debug!(party_id = %self.party.id(), %username, "token rejected");
            return false;
        }

        for frame in self.party.initial_state() {
            Self::deliver(&outbound, frame);
        }
        self.connections.push(LiveConnection {
            id: connection,
            username,
            outbound,
        });
        self.idle_since = None;
        self.broadcast_presence();
        true
    }

    fn detach(&mut self, connection: ConnectionId) {
        let Some(index) = self.connections.iter().position(|c| c.id == connection) else {
            return;
        };
        let gone = self.connections.remove(index);

        if self.party.is_leader(&gone.username) {
            let pause = self.party.leader_left();
            info!(party_id = %self.party.id(), "leader disconnected, pausing");
            self.broadcast(&pause);
        }
        self.broadcast_presence();

        if self.connections.is_empty() {
            self.idle_since = Some(Instant::now());
        }
    }

    fn control(&mut self, connection: ConnectionId, command: PlaybackCommand) {
        let Some(username) = self.username_of(connection) else {
            return;
        };

        match self.party.apply(&username, command) {
            ControlOutcome::Applied(relay) => self.broadcast_except(connection, &relay),
            ControlOutcome::Ignored => {
                // followers' players emit these constantly; not an error
                debug!(party_id = %self.party.id(), %username, ?command, "ignoring control from non-leader");
                counter!(CONTROL_IGNORED).increment(1);
            },
        }
    }

    fn chat(&mut self, connection: ConnectionId, message: String) {
        let Some(username) = self.username_of(connection) else {
            return;
        };

        debug!(party_id = %self.party.id(), %username, "chat message");
        let frame = ServerToClient::ChatMessage {
            user_id: username,
            message,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        self.broadcast_except(connection, &frame);
        counter!(CHAT_RELAYED).increment(1);
    }

    fn username_of(&self, connection: ConnectionId) -> Option<String> {
        self.connections
            .iter()
            .find(|c| c.id == connection)
            .map(|c| c.username.clone())
    }

    /// Connected usernames, each once, in order of first connection
    fn online_users(&self) -> Vec<String> {
        let mut users: Vec<String> = Vec::with_capacity(self.connections.len());
        for connection in &self.connections {
            if !users.contains(&connection.username) {
                users.push(connection.username.clone());
            }
        }
        users
    }

    fn broadcast_presence(&self) {
        let frame = ServerToClient::OnlineUsers {
            users: self.online_users(),
            leader: self.party.leader().to_string(),
        };
        self.broadcast(&frame);
    }

    fn broadcast(&self, frame: &ServerToClient) {
        for connection in &self.connections {
            Self::deliver(&connection.outbound, frame.clone());
        }
    }

    fn broadcast_except(&self, sender: ConnectionId, frame: &ServerToClient) {
        for connection in self.connections.iter().filter(|c| c.id != sender) {
            Self::deliver(&connection.outbound, frame.clone());
        }
    }

    fn deliver(outbound: &mpsc::Sender<ServerToClient>, frame: ServerToClient) {
        match outbound.try_send(frame) {
            Ok(()) => {},
            Err(mpsc::error::TrySendError::Full(frame)) => {
                warn!(?frame, "outbound queue full, dropping frame");
            },
            // peer is going away; its detach is queued behind us
            Err(mpsc::error::TrySendError::Closed(_)) => {},
        }
    }

    fn snapshot(&self) -> PartySnapshot {
        let playback = self.party.playback();
        PartySnapshot {
            id: self.party.id().to_string(),
            leader: self.party.leader().to_string(),
            members: self.party.members().to_vec(),
            video_url: self.party.video_url().map(str::to_string),
            current_time: playback.current_time,
            is_playing: playback.is_playing,
            stream_ready: self.party.stream_ready(),
            stream_url: self.party.stream_url().map(str::to_string),
            online_users: self.online_users(),
            connections: self.connections.len(),
            idle_since: self.idle_since,
        }
    }
}

/// Spawn a new party actor and return its handle
pub fn spawn_party_actor(party: Party) -> PartyHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let id = party.id().to_string();
    let actor = PartyActor::new(party);

    tokio::spawn(async move {
        actor.run(cmd_rx).await;
    });

    PartyHandle { id, cmd_tx }
}
