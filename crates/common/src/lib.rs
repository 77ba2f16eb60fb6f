// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between watch party clients and the server.
//! This module defines the realtime protocol frames and the HTTP bodies.

use serde::{Deserialize, Serialize};

/// Playback position in seconds
pub type Seconds = f64;

/// Messages sent from client to server over the realtime connection
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "msgType", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientToServer {
    /// Bind this connection to a party
    /// # Fields
    /// * `username` - Name the token was issued to
    /// * `party_id` - Party to join
    /// * `token` - Token returned by create-party or join-party
    Authenticate {
        username: String,
        party_id: String,
        token: String,
    },
    /// Leader started playback at `time`
    Play { party_id: String, time: Seconds },
    /// Leader paused playback at `time`
    Pause { party_id: String, time: Seconds },
    /// Leader jumped to `time`
    Seek { party_id: String, time: Seconds },
    /// Periodic leader heartbeat used for drift reconciliation
    Sync {
        party_id: String,
        time: Seconds,
        is_playing: bool,
    },
    /// Chat line from any member
    ChatMessage { party_id: String, message: String },
}

impl ClientToServer {
    /// Party the frame is addressed to
    pub fn party_id(&self) -> &str {
        match self {
            Self::Authenticate { party_id, .. }
            | Self::Play { party_id, .. }
            | Self::Pause { party_id, .. }
            | Self::Seek { party_id, .. }
            | Self::Sync { party_id, .. }
            | Self::ChatMessage { party_id, .. } => party_id,
        }
    }
}

/// Messages sent from server to client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "msgType", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerToClient {
    /// Authentication failed; the connection is closed right after
    AuthError { message: String },
    Play { time: Seconds },
    Pause { time: Seconds },
    Seek { time: Seconds },
    /// Full playback snapshot
    Sync { time: Seconds, is_playing: bool },
    /// Chat line relayed from another member
    /// # Fields
    /// * `user_id` - Sender's username
    /// * `message` - Verbatim chat text
    /// * `timestamp` - Server receive time, unix milliseconds
    ChatMessage {
        user_id: String,
        message: String,
        timestamp: i64,
    },
    /// Source video of the party
    VideoSet { url: String },
    /// Transcoded stream is playable at `url`
    StreamReady { url: String },
    /// Transcode job failed after it was accepted
    StreamError { message: String },
    /// Presence roster
    OnlineUsers { users: Vec<String>, leader: String },
    /// Frame could not be understood
    Error { message: String },
}

/// Body of `POST /api/create-party`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartyRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub video_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartyResponse {
    pub party_id: String,
    pub token: String,
}

/// Body of `POST /api/join-party`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JoinPartyRequest {
    pub party_id: String,
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JoinPartyResponse {
    pub success: bool,
    pub token: String,
}

/// Body of `POST /api/set-video`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SetVideoRequest {
    pub party_id: String,
    pub username: String,
    pub video_url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Body of `POST /api/start-stream`. Without `video_url` the party's own video is used.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StartStreamRequest {
    pub party_id: String,
    #[serde(default)]
    pub video_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StartStreamResponse {
    pub success: bool,
    pub stream_url: String,
}
