// =============
// tests/protocol_tests.rs
// =============
//! Realtime protocol behaviour, driven through `ConnectionHandler`.
mod common;

use common::{online, party_with, settle, setup_test_env, TestClient};
use watchparty_backend::websocket::Flow;
use watchparty_common::{ClientToServer, ServerToClient};

#[tokio::test]
async fn test_bad_token_is_rejected_and_closed() {
    let (state, _root) = setup_test_env();
    let (created, _) = party_with(&state, "alice", &[]).await;

    let mut client = TestClient::new(&state);
    let flow = client.authenticate("alice", &created.party_id, "forged").await;

    assert_eq!(flow, Flow::Close);
    assert_eq!(
        client.drain(),
        vec![ServerToClient::AuthError {
            message: "Invalid credentials".to_string()
        }]
    );
    assert!(state.sessions.is_empty());
    assert!(!client.handler.is_authenticated());

    // nothing is accepted after a failed authentication
    let flow = client
        .send(ClientToServer::Play {
            party_id: created.party_id.clone(),
            time: 1.0,
        })
        .await;
    assert_eq!(flow, Flow::Close);
}

#[tokio::test]
async fn test_unknown_party_is_rejected() {
    let (state, _root) = setup_test_env();
    let mut client = TestClient::new(&state);

    assert_eq!(client.authenticate("alice", "nosuchparty", "t").await, Flow::Close);
    assert!(matches!(client.drain()[..], [ServerToClient::AuthError { .. }]));
    assert!(state.sessions.is_empty());
}

#[tokio::test]
async fn test_authenticate_pushes_state_and_presence() {
    let (state, _root) = setup_test_env();
    let created = state
        .parties
        .create_party("alice", "pw", Some("http://x/a.mp4".to_string()))
        .await
        .unwrap();

    let mut alice = TestClient::new(&state);
    assert_eq!(
        alice.authenticate("alice", &created.party_id, &created.token).await,
        Flow::Continue
    );

    assert_eq!(
        alice.drain(),
        vec![
            ServerToClient::VideoSet {
                url: "http://x/a.mp4".to_string()
            },
            ServerToClient::Sync {
                time: 0.0,
                is_playing: false
            },
            online(&["alice"], "alice"),
        ]
    );

    let session = state.sessions.get(&alice.handler.id()).unwrap();
    assert_eq!(session.username, "alice");
    assert_eq!(session.party_id, created.party_id);
}

#[tokio::test]
async fn test_presence_only_after_socket_authentication() {
    let (state, _root) = setup_test_env();
    let (created, tokens) = party_with(&state, "alice", &["bob"]).await;
    let id = created.party_id.clone();

    let mut alice = TestClient::new(&state);
    alice.authenticate("alice", &id, &created.token).await;
    let mut bob = TestClient::new(&state);
    settle(&state, &id).await;

    // bob joined over HTTP but has not authenticated his socket
    assert_eq!(alice.drain().last(), Some(&online(&["alice"], "alice")));
    let snapshot = state.parties.get(&id).unwrap().snapshot().await.unwrap();
    assert_eq!(snapshot.online_users, vec!["alice".to_string()]);

    bob.authenticate("bob", &id, &tokens[0]).await;
    assert_eq!(alice.drain(), vec![online(&["alice", "bob"], "alice")]);
}

#[tokio::test]
async fn test_duplicate_authenticate_is_ignored() {
    let (state, _root) = setup_test_env();
    let (created, _) = party_with(&state, "alice", &[]).await;

    let mut alice = TestClient::new(&state);
    alice.authenticate("alice", &created.party_id, &created.token).await;
    alice.drain();

    assert_eq!(
        alice.authenticate("alice", &created.party_id, "forged").await,
        Flow::Continue
    );
    assert!(alice.handler.is_authenticated());
    assert!(alice.drain().is_empty());
    assert_eq!(state.sessions.len(), 1);
}

#[tokio::test]
async fn test_control_before_authentication_is_ignored() {
    let (state, _root) = setup_test_env();
    let (created, _) = party_with(&state, "alice", &[]).await;

    let mut stranger = TestClient::new(&state);
    let flow = stranger
        .send(ClientToServer::Seek {
            party_id: created.party_id.clone(),
            time: 99.0,
        })
        .await;

    assert_eq!(flow, Flow::Continue);
    let snapshot = state
        .parties
        .get(&created.party_id)
        .unwrap()
        .snapshot()
        .await
        .unwrap();
    assert_eq!(snapshot.current_time, 0.0);
}

#[tokio::test]
async fn test_leader_seek_relayed_once_and_not_across_parties() {
    let (state, _root) = setup_test_env();
    let (first, first_tokens) = party_with(&state, "alice", &["bob"]).await;
    let (second, _) = party_with(&state, "carol", &[]).await;

    let mut alice = TestClient::new(&state);
    let mut bob = TestClient::new(&state);
    let mut carol = TestClient::new(&state);
    alice.authenticate("alice", &first.party_id, &first.token).await;
    bob.authenticate("bob", &first.party_id, &first_tokens[0]).await;
    carol.authenticate("carol", &second.party_id, &second.token).await;
    settle(&state, &first.party_id).await;
    settle(&state, &second.party_id).await;
    alice.drain();
    bob.drain();
    carol.drain();

    alice
        .send(ClientToServer::Seek {
            party_id: first.party_id.clone(),
            time: 42.0,
        })
        .await;
    settle(&state, &first.party_id).await;
    settle(&state, &second.party_id).await;

    assert_eq!(bob.drain(), vec![ServerToClient::Seek { time: 42.0 }]);
    assert!(alice.drain().is_empty());
    assert!(carol.drain().is_empty());

    let snapshot = state.parties.get(&second.party_id).unwrap().snapshot().await.unwrap();
    assert_eq!(snapshot.current_time, 0.0);
}

#[tokio::test]
async fn test_follower_control_is_dropped_silently() {
    let (state, _root) = setup_test_env();
    let (created, tokens) = party_with(&state, "alice", &["bob"]).await;
    let id = created.party_id.clone();

    let mut alice = TestClient::new(&state);
    let mut bob = TestClient::new(&state);
    alice.authenticate("alice", &id, &created.token).await;
    bob.authenticate("bob", &id, &tokens[0]).await;
    settle(&state, &id).await;
    alice.drain();
    bob.drain();

    let flow = bob
        .send(ClientToServer::Sync {
            party_id: id.clone(),
            time: 10.0,
            is_playing: true,
        })
        .await;
    settle(&state, &id).await;

    assert_eq!(flow, Flow::Continue);
    assert!(alice.drain().is_empty());
    assert!(bob.drain().is_empty());
    let snapshot = state.parties.get(&id).unwrap().snapshot().await.unwrap();
    assert!(!snapshot.is_playing);
    assert_eq!(snapshot.leader, "alice");
}

#[tokio::test]
async fn test_frame_for_other_party_is_dropped() {
    let (state, _root) = setup_test_env();
    let (first, _) = party_with(&state, "alice", &[]).await;
    let (second, second_tokens) = party_with(&state, "carol", &["alice"]).await;

    let mut alice = TestClient::new(&state);
    let mut watcher = TestClient::new(&state);
    alice.authenticate("alice", &first.party_id, &first.token).await;
    watcher.authenticate("alice", &second.party_id, &second_tokens[0]).await;
    settle(&state, &second.party_id).await;
    watcher.drain();

    // alice leads the first party, but addresses the second one
    alice
        .send(ClientToServer::Play {
            party_id: second.party_id.clone(),
            time: 5.0,
        })
        .await;
    settle(&state, &first.party_id).await;
    settle(&state, &second.party_id).await;

    assert!(watcher.drain().is_empty());
    let snapshot = state.parties.get(&first.party_id).unwrap().snapshot().await.unwrap();
    assert!(!snapshot.is_playing);
}

#[tokio::test]
async fn test_chat_relayed_to_others() {
    let (state, _root) = setup_test_env();
    let (created, tokens) = party_with(&state, "alice", &["bob"]).await;
    let id = created.party_id.clone();

    let mut alice = TestClient::new(&state);
    let mut bob = TestClient::new(&state);
    alice.authenticate("alice", &id, &created.token).await;
    bob.authenticate("bob", &id, &tokens[0]).await;
    settle(&state, &id).await;
    alice.drain();
    bob.drain();

    bob.send(ClientToServer::ChatMessage {
        party_id: id.clone(),
        message: "hi all".to_string(),
    })
    .await;
    // oversized lines are dropped
    bob.send(ClientToServer::ChatMessage {
        party_id: id.clone(),
        message: "x".repeat(5000),
    })
    .await;
    settle(&state, &id).await;

    let frames = alice.drain();
    assert_eq!(frames.len(), 1);
    assert!(matches!(
        &frames[0],
        ServerToClient::ChatMessage { user_id, message, .. } if user_id == "bob" && message == "hi all"
    ));
    assert!(bob.drain().is_empty());
}

#[tokio::test]
async fn test_follower_disconnect_updates_presence() {
    let (state, _root) = setup_test_env();
    let (created, tokens) = party_with(&state, "alice", &["bob", "carol"]).await;
    let id = created.party_id.clone();

    let mut alice = TestClient::new(&state);
    let mut bob = TestClient::new(&state);
    let mut carol = TestClient::new(&state);
    alice.authenticate("alice", &id, &created.token).await;
    bob.authenticate("bob", &id, &tokens[0]).await;
    carol.authenticate("carol", &id, &tokens[1]).await;
    settle(&state, &id).await;
    alice.drain();

    bob.handler.disconnect();
    settle(&state, &id).await;

    assert_eq!(alice.drain(), vec![online(&["alice", "carol"], "alice")]);
    assert!(state.sessions.get(&bob.handler.id()).is_none());
    assert_eq!(state.sessions.len(), 2);
    assert!(carol.handler.is_authenticated());
}

#[tokio::test]
async fn test_leader_disconnect_pauses_everyone() {
    let (state, _root) = setup_test_env();
    let (created, tokens) = party_with(&state, "alice", &["bob"]).await;
    let id = created.party_id.clone();

    let mut alice = TestClient::new(&state);
    let mut bob = TestClient::new(&state);
    alice.authenticate("alice", &id, &created.token).await;
    bob.authenticate("bob", &id, &tokens[0]).await;
    alice
        .send(ClientToServer::Play {
            party_id: id.clone(),
            time: 30.0,
        })
        .await;
    settle(&state, &id).await;
    bob.drain();

    drop(alice);
    settle(&state, &id).await;

    assert_eq!(
        bob.drain(),
        vec![
            ServerToClient::Pause { time: 30.0 },
            online(&["bob"], "alice"),
        ]
    );
    let snapshot = state.parties.get(&id).unwrap().snapshot().await.unwrap();
    assert!(!snapshot.is_playing);
    assert_eq!(snapshot.leader, "alice");
}

#[tokio::test]
async fn test_malformed_frame_gets_error_reply() {
    let (state, _root) = setup_test_env();
    let mut client = TestClient::new(&state);

    assert_eq!(client.handler.handle_text("{not json").await, Flow::Continue);
    assert_eq!(
        client.handler.handle_text(r#"{"msgType":"dance"}"#).await,
        Flow::Continue
    );

    let frames = client.drain();
    assert_eq!(frames.len(), 2);
    assert!(frames
        .iter()
        .all(|frame| matches!(frame, ServerToClient::Error { .. })));
}
