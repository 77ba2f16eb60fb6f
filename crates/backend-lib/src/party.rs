// ============================
// watchparty-backend/src/party.rs
// ============================
//! Party aggregate: leader, membership record, tokens and playback state.
//!
//! The leader is fixed at construction and the video URL can be set at most
//! once. Only the leader's playback commands change `current_time` and
//! `is_playing`; commands from anyone else come back as
//! [`ControlOutcome::Ignored`].
use std::collections::HashMap;

use watchparty_common::{Seconds, ServerToClient};

use crate::auth::generate_secure_token;

pub type PartyId = String;

/// Server's belief of the shared playback position
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Playback {
    pub current_time: Seconds,
    pub is_playing: bool,
}

/// Leader-only playback control
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackCommand {
    Play(Seconds),
    Pause(Seconds),
    Seek(Seconds),
    /// Periodic heartbeat carrying the full snapshot
    Sync { time: Seconds, is_playing: bool },
}

impl PlaybackCommand {
    /// Frame relayed to the other members
    fn relay(self) -> ServerToClient {
        match self {
            PlaybackCommand::Play(time) => ServerToClient::Play { time },
            PlaybackCommand::Pause(time) => ServerToClient::Pause { time },
            PlaybackCommand::Seek(time) => ServerToClient::Seek { time },
            PlaybackCommand::Sync { time, is_playing } => ServerToClient::Sync { time, is_playing },
        }
    }
}

/// Result of applying a playback command
#[derive(Debug, Clone, PartialEq)]
pub enum ControlOutcome {
    /// State changed; relay this frame to everyone but the sender
    Applied(ServerToClient),
    /// Sender is not the leader; nothing changes and nothing is relayed
    Ignored,
}

#[derive(Debug, Clone)]
pub struct Party {
    id: PartyId,
    leader: String,
    members: Vec<String>,
    video_url: Option<String>,
    playback: Playback,
    stream_url: Option<String>,
    tokens: HashMap<String, String>,
}

impl Party {
    /// New party led by `leader`. An empty video URL counts as unset.
    pub fn new(id: impl Into<PartyId>, leader: impl Into<String>, video_url: Option<String>) -> Self {
        let leader = leader.into();
        Self {
            id: id.into(),
            members: vec![leader.clone()],
            leader,
            video_url: video_url.filter(|url| !url.is_empty()),
            playback: Playback::default(),
            stream_url: None,
            tokens: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn leader(&self) -> &str {
        &self.leader
    }

    pub fn is_leader(&self, username: &str) -> bool {
        self.leader == username
    }

    /// Historical membership; duplicates are kept
    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }

    pub fn playback(&self) -> Playback {
        self.playback
    }

    pub fn stream_ready(&self) -> bool {
        self.stream_url.is_some()
    }

    pub fn stream_url(&self) -> Option<&str> {
        self.stream_url.as_deref()
    }

    pub fn add_member(&mut self, username: impl Into<String>) {
        self.members.push(username.into());
    }

    /// Mint a fresh token for `username`, replacing any previous one
    pub fn issue_token(&mut self, username: &str) -> String {
        let token = generate_secure_token();
        self.tokens.insert(username.to_string(), token.clone());
        token
    }

    pub fn token_matches(&self, username: &str, token: &str) -> bool {
        self.tokens
            .get(username)
            .is_some_and(|issued| issued.as_str() == token)
    }

    /// Set the video once, leader only. Returns whether it was set.
    pub fn set_video_url(&mut self, username: &str, url: impl Into<String>) -> bool {
        if !self.is_leader(username) || self.video_url.is_some() {
            return false;
        }
        let url = url.into();
        if url.is_empty() {
            return false;
        }
        self.video_url = Some(url);
        self.stream_url = None;
        true
    }

    /// Apply a playback command sent by `username`
    pub fn apply(&mut self, username: &str, command: PlaybackCommand) -> ControlOutcome {
        if !self.is_leader(username) {
            return ControlOutcome::Ignored;
        }

        match command {
            PlaybackCommand::Play(time) => {
                self.playback = Playback {
                    current_time: time,
                    is_playing: true,
                };
            },
            PlaybackCommand::Pause(time) => {
                self.playback = Playback {
                    current_time: time,
                    is_playing: false,
                };
            },
            PlaybackCommand::Seek(time) => self.playback.current_time = time,
            PlaybackCommand::Sync { time, is_playing } => {
                self.playback = Playback {
                    current_time: time,
                    is_playing,
                };
            },
        }
        ControlOutcome::Applied(command.relay())
    }

    pub fn mark_stream_ready(&mut self, url: impl Into<String>) {
        self.stream_url = Some(url.into());
    }

    /// Forget the announced stream; its output is about to be replaced
    pub fn clear_stream(&mut self) {
        self.stream_url = None;
    }

    /// Leader went away: stop playback and return the pause to broadcast
    pub fn leader_left(&mut self) -> ServerToClient {
        self.playback.is_playing = false;
        ServerToClient::Pause {
            time: self.playback.current_time,
        }
    }

    /// Frames pushed to a connection right after it authenticates
    pub fn initial_state(&self) -> Vec<ServerToClient> {
        let mut frames = Vec::with_capacity(3);
        if let Some(url) = &self.video_url {
            frames.push(ServerToClient::VideoSet { url: url.clone() });
        }
        if let Some(url) = &self.stream_url {
            frames.push(ServerToClient::StreamReady { url: url.clone() });
        }
        frames.push(ServerToClient::Sync {
            time: self.playback.current_time,
            is_playing: self.playback.is_playing,
        });
        frames
    }
}
