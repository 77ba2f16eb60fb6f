// ============================
// watchparty-backend/src/registry.rs
// ============================
//! Party registry: creation, membership and token issuance.
use dashmap::{mapref::entry::Entry, DashMap};
use metrics::{counter, gauge};
use tracing::info;

use crate::auth::{generate_party_id, CredentialStore};
use crate::error::AppError;
use crate::metrics::{PARTY_ACTIVE, PARTY_CREATED, PARTY_JOINED};
use crate::party::{Party, PartyId};
use crate::party_actor::{spawn_party_actor, PartyHandle};

/// Identifier and leader token of a new party
#[derive(Debug, Clone)]
pub struct PartyCreated {
    pub party_id: PartyId,
    pub token: String,
}

/// Registry of all live parties
pub struct PartyRegistry {
    parties: DashMap<PartyId, PartyHandle>,
    credentials: CredentialStore,
}

impl PartyRegistry {
    pub fn new(credentials: CredentialStore) -> Self {
        PartyRegistry {
            parties: DashMap::new(),
            credentials,
        }
    }

    /// Authenticate (or register) `username` and start a party it leads
    pub async fn create_party(
        &self,
        username: &str,
        password: &str,
        video_url: Option<String>,
    ) -> Result<PartyCreated, AppError> {
        self.credentials.authenticate(username, password).await?;

        let created = loop {
            let party_id = generate_party_id();
            if let Entry::Vacant(slot) = self.parties.entry(party_id.clone()) {
                let mut party = Party::new(party_id.clone(), username, video_url);
                let token = party.issue_token(username);
                slot.insert(spawn_party_actor(party));
                break PartyCreated { party_id, token };
            }
        };

        info!(party_id = %created.party_id, leader = %username, "party created");
        counter!(PARTY_CREATED).increment(1);
        gauge!(PARTY_ACTIVE).set(self.parties.len() as f64);
        Ok(created)
    }

    /// Add `username` to an existing party and mint its token
    pub async fn join_party(
        &self,
        party_id: &str,
        username: &str,
        password: &str,
    ) -> Result<String, AppError> {
        let party = self.get(party_id).ok_or(AppError::PartyNotFound)?;
        // a retired party is still listed until the reaper removes it
        if !party.is_open().await? {
            return Err(AppError::PartyNotFound);
        }
        self.credentials.authenticate(username, password).await?;
        let token = party.join(username).await?;

        info!(%party_id, %username, "joined party");
        counter!(PARTY_JOINED).increment(1);
        Ok(token)
    }

    /// Set the party's video once; only the leader may. Unknown parties yield `false`.
    pub async fn set_video_url(
        &self,
        party_id: &str,
        username: &str,
        url: &str,
    ) -> Result<bool, AppError> {
        match self.get(party_id) {
            Some(party) => party.set_video_url(username, url).await,
            None => Ok(false),
        }
    }

    /// Get a party handle by ID
    pub fn get(&self, party_id: &str) -> Option<PartyHandle> {
        self.parties.get(party_id).map(|entry| entry.value().clone())
    }

    /// Drop a party; its actor stops once the last handle is gone
    pub fn remove(&self, party_id: &str) -> Option<PartyHandle> {
        let removed = self.parties.remove(party_id).map(|(_, handle)| handle);
        if removed.is_some() {
            gauge!(PARTY_ACTIVE).set(self.parties.len() as f64);
        }
        removed
    }

    /// Get all live party IDs
    pub fn party_ids(&self) -> Vec<PartyId> {
        self.parties.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.parties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn registry() -> PartyRegistry {
        PartyRegistry::new(CredentialStore::new(4).unwrap())
    }

    #[tokio::test]
    async fn test_create_party() {
        let registry = registry();
        let created = registry
            .create_party("alice", "pw1", Some("http://x/a.mp4".to_string()))
            .await
            .unwrap();

        let snapshot = registry
            .get(&created.party_id)
            .unwrap()
            .snapshot()
            .await
            .unwrap();
        assert_eq!(snapshot.leader, "alice");
        assert_eq!(snapshot.members, vec!["alice".to_string()]);
        assert_eq!(snapshot.video_url.as_deref(), Some("http://x/a.mp4"));
        assert!(!snapshot.is_playing);
        assert!(!snapshot.stream_ready);
        assert!(!created.token.is_empty());
    }

    #[tokio::test]
    async fn test_create_with_wrong_password_has_no_side_effect() {
        let registry = registry();
        registry.create_party("alice", "pw1", None).await.unwrap();

        let err = registry.create_party("alice", "nope", None).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_join_party() {
        let registry = registry();
        let created = registry.create_party("alice", "pw1", None).await.unwrap();

        let first = registry
            .join_party(&created.party_id, "bob", "pw2")
            .await
            .unwrap();
        let second = registry
            .join_party(&created.party_id, "bob", "pw2")
            .await
            .unwrap();
        assert_ne!(first, second);

        let snapshot = registry
            .get(&created.party_id)
            .unwrap()
            .snapshot()
            .await
            .unwrap();
        assert_eq!(snapshot.members, vec!["alice", "bob", "bob"]);
        // joining never transfers leadership
        assert_eq!(snapshot.leader, "alice");
    }

    #[tokio::test]
    async fn test_join_unknown_party() {
        let registry = registry();
        let err = registry.join_party("missing", "bob", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::PartyNotFound));
        assert!(!registry.credentials().contains("bob"));
    }

    #[tokio::test]
    async fn test_join_with_wrong_password() {
        let registry = registry();
        let created = registry.create_party("alice", "pw1", None).await.unwrap();
        registry
            .join_party(&created.party_id, "bob", "right")
            .await
            .unwrap();

        let err = registry
            .join_party(&created.party_id, "bob", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
    }

    #[tokio::test]
    async fn test_join_retired_party_registers_nothing() {
        let registry = registry();
        let created = registry.create_party("alice", "pw1", None).await.unwrap();
        let party = registry.get(&created.party_id).unwrap();
        assert!(party.retire_if_idle(Duration::ZERO).await.unwrap());

        let err = registry
            .join_party(&created.party_id, "bob", "pw2")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PartyNotFound));
        assert!(!registry.credentials().contains("bob"));
    }

    #[tokio::test]
    async fn test_set_video_url_once() {
        let registry = registry();
        let created = registry.create_party("alice", "pw1", None).await.unwrap();
        let id = created.party_id;

        assert!(!registry.set_video_url(&id, "bob", "http://x/b.mp4").await.unwrap());
        assert!(registry.set_video_url(&id, "alice", "http://x/a.mp4").await.unwrap());
        assert!(!registry.set_video_url(&id, "alice", "http://x/c.mp4").await.unwrap());
        assert!(!registry.set_video_url("missing", "alice", "http://x/a.mp4").await.unwrap());

        let snapshot = registry.get(&id).unwrap().snapshot().await.unwrap();
        assert_eq!(snapshot.video_url.as_deref(), Some("http://x/a.mp4"));
    }

    #[tokio::test]
    async fn test_party_ids_are_unique() {
        let registry = registry();
        for _ in 0..20 {
            registry.create_party("alice", "pw1", None).await.unwrap();
        }
        let mut ids = registry.party_ids();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 20);
    }
}
