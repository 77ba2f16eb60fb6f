// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_ACTIVE: &str = "ws.active";
pub const WS_AUTH_FAILED: &str = "ws.auth_failed";
pub const PARTY_CREATED: &str = "party.created";
pub const PARTY_JOINED: &str = "party.joined";
pub const PARTY_ACTIVE: &str = "party.active";
pub const PARTY_REAPED: &str = "party.reaped";
pub const CONTROL_IGNORED: &str = "control.ignored";
pub const CHAT_RELAYED: &str = "chat.relayed";
pub const STREAM_READY: &str = "stream.ready";
pub const STREAM_TIMEOUT: &str = "stream.timeout";
pub const STREAM_FAILED: &str = "stream.failed";
