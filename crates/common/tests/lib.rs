use serde_json::json;
use watchparty_common::{ClientToServer, CreatePartyRequest, ServerToClient};

#[test]
fn test_client_frames_use_camel_case_tags() {
    let frame = ClientToServer::Sync {
        party_id: "abc123".to_string(),
        time: 12.5,
        is_playing: true,
    };

    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(
        value,
        json!({ "msgType": "sync", "partyId": "abc123", "time": 12.5, "isPlaying": true })
    );
}

#[test]
fn test_parse_authenticate_frame() {
    let raw = r#"{"msgType":"authenticate","username":"alice","partyId":"p1","token":"t"}"#;
    let parsed: ClientToServer = serde_json::from_str(raw).unwrap();

    assert_eq!(parsed.party_id(), "p1");
    assert!(matches!(parsed, ClientToServer::Authenticate { ref username, .. } if username == "alice"));
}

#[test]
fn test_chat_relay_shape() {
    let frame = ServerToClient::ChatMessage {
        user_id: "bob".to_string(),
        message: "hi".to_string(),
        timestamp: 1_700_000_000_000,
    };

    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(value["msgType"], "chatMessage");
    assert_eq!(value["userId"], "bob");
    assert_eq!(value["timestamp"], 1_700_000_000_000_i64);
}

#[test]
fn test_unknown_frame_is_rejected() {
    let raw = r#"{"msgType":"kick","partyId":"p1"}"#;
    assert!(serde_json::from_str::<ClientToServer>(raw).is_err());
}

#[test]
fn test_create_party_video_url_is_optional() {
    let parsed: CreatePartyRequest =
        serde_json::from_str(r#"{"username":"alice","password":"pw1"}"#).unwrap();
    assert!(parsed.video_url.is_none());
}
