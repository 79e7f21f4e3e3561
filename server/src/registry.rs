//! Nickname registry for connected game clients
//!
//! This module tracks every client that has successfully claimed a nickname:
//! - Atomic check-and-insert so two connections can never claim the same name
//! - Lookup of a player's handle by nickname for challenge routing
//! - Player-list snapshots in registration order
//! - Idempotent removal when a connection goes away

use crate::player::PlayerHandle;
use log::info;
use shared::{GameMessage, MAX_NICKNAME_LEN};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegisterError {
    #[error("Nickname must not be empty")]
    Empty,
    #[error("Nickname is longer than {} characters", MAX_NICKNAME_LEN)]
    TooLong,
    #[error("Nickname contains invalid characters")]
    InvalidCharacters,
    #[error("Nickname '{0}' is already in use")]
    Duplicate(String),
}

/// Normalizes a requested nickname and checks it against the naming rules.
pub fn validate_nickname(raw: &str) -> Result<String, RegisterError> {
    let nickname = raw.trim();
    if nickname.is_empty() {
        return Err(RegisterError::Empty);
    }
    if nickname.chars().count() > MAX_NICKNAME_LEN {
        return Err(RegisterError::TooLong);
    }
    if nickname.chars().any(char::is_control) {
        return Err(RegisterError::InvalidCharacters);
    }
    Ok(nickname.to_string())
}

struct RegistryInner {
    players: HashMap<String, Arc<PlayerHandle>>,
    next_id: u64,
}

/// Process-wide map from nickname to connected player
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                players: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Claims a nickname for a connection
    ///
    /// Validation, the uniqueness check and the insert all happen under one
    /// write lock, so concurrent registrations of the same name resolve to
    /// exactly one winner. On success the new handle gets the next
    /// connection id, which also defines its position in player lists.
    pub async fn register(
        &self,
        nickname: &str,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<GameMessage>,
    ) -> Result<Arc<PlayerHandle>, RegisterError> {
        let nickname = validate_nickname(nickname)?;

        let mut inner = self.inner.write().await;
        if inner.players.contains_key(&nickname) {
            return Err(RegisterError::Duplicate(nickname));
        }

        let id = inner.next_id;
        inner.next_id += 1;

        let handle = Arc::new(PlayerHandle::new(id, nickname.clone(), addr, sender));
        inner.players.insert(nickname.clone(), Arc::clone(&handle));
        info!("Player {} registered from {} (connection {})", nickname, addr, id);

        Ok(handle)
    }

    /// Removes a nickname. Returns false if it was already gone.
    pub async fn unregister(&self, nickname: &str) -> bool {
        let removed = self.inner.write().await.players.remove(nickname);
        if let Some(handle) = &removed {
            info!("Player {} unregistered", handle.nickname());
        }
        removed.is_some()
    }

    pub async fn lookup(&self, nickname: &str) -> Option<Arc<PlayerHandle>> {
        self.inner.read().await.players.get(nickname).cloned()
    }

    /// Nicknames of every registered player except `excluding`, oldest first
    pub async fn snapshot(&self, excluding: &str) -> Vec<String> {
        let inner = self.inner.read().await;
        Self::sorted_names(&inner, excluding)
    }

    /// Sends each connected player the current list of everyone else.
    pub async fn broadcast_player_list(&self) {
        let inner = self.inner.read().await;
        for handle in inner.players.values() {
            let players = Self::sorted_names(&inner, handle.nickname());
            handle.send(GameMessage::PlayerList(players));
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.players.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.players.is_empty()
    }

    fn sorted_names(inner: &RegistryInner, excluding: &str) -> Vec<String> {
        let mut handles: Vec<&Arc<PlayerHandle>> = inner
            .players
            .values()
            .filter(|handle| handle.nickname() != excluding)
            .collect();
        handles.sort_by_key(|handle| handle.id());
        handles
            .into_iter()
            .map(|handle| handle.nickname().to_string())
            .collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    async fn register(
        registry: &ConnectionRegistry,
        nickname: &str,
    ) -> (
        Result<Arc<PlayerHandle>, RegisterError>,
        mpsc::UnboundedReceiver<GameMessage>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (registry.register(nickname, test_addr(), tx).await, rx)
    }

    #[test]
    fn test_validate_nickname() {
        assert_eq!(validate_nickname("  Ann "), Ok("Ann".to_string()));
        assert_eq!(validate_nickname(""), Err(RegisterError::Empty));
        assert_eq!(validate_nickname("   "), Err(RegisterError::Empty));
        assert_eq!(
            validate_nickname(&"a".repeat(MAX_NICKNAME_LEN + 1)),
            Err(RegisterError::TooLong)
        );
        assert_eq!(
            validate_nickname("An\u{7}n"),
            Err(RegisterError::InvalidCharacters)
        );
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = register(&registry, "Ann").await;
        let handle = handle.unwrap();

        assert_eq!(handle.nickname(), "Ann");
        assert_eq!(registry.len().await, 1);

        let found = registry.lookup("Ann").await.unwrap();
        assert_eq!(found.id(), handle.id());
        assert!(registry.lookup("Bob").await.is_none());
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = register(&registry, "Ann").await;
        let (second, _rx2) = register(&registry, "Ann").await;

        assert!(first.is_ok());
        assert_eq!(
            second.unwrap_err(),
            RegisterError::Duplicate("Ann".to_string())
        );
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_empty() {
        let registry = ConnectionRegistry::new();
        let (result, _rx) = register(&registry, "").await;

        assert_eq!(result.unwrap_err(), RegisterError::Empty);
        assert!(registry.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_single_winner() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut tasks = Vec::new();

        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let (tx, _rx) = mpsc::unbounded_channel();
                registry.register("Ann", test_addr(), tx).await.is_ok()
            }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_idempotent() {
        let registry = ConnectionRegistry::new();
        let (_handle, _rx) = register(&registry, "Ann").await;

        assert!(registry.unregister("Ann").await);
        assert!(!registry.unregister("Ann").await);
        assert!(!registry.unregister("Nobody").await);
        assert!(registry.is_empty().await);

        // The name is free again
        let (again, _rx2) = register(&registry, "Ann").await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_snapshot_excludes_requester() {
        let registry = ConnectionRegistry::new();
        let (_a, _rx1) = register(&registry, "Ann").await;
        let (_b, _rx2) = register(&registry, "Bob").await;
        let (_c, _rx3) = register(&registry, "Cid").await;

        assert_eq!(registry.snapshot("Ann").await, vec!["Bob", "Cid"]);
        assert_eq!(registry.snapshot("Bob").await, vec!["Ann", "Cid"]);
        assert_eq!(registry.snapshot("").await, vec!["Ann", "Bob", "Cid"]);
    }

    #[tokio::test]
    async fn test_broadcast_player_list() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_ann) = register(&registry, "Ann").await;
        let (_b, mut rx_bob) = register(&registry, "Bob").await;

        registry.broadcast_player_list().await;

        assert_eq!(
            rx_ann.try_recv().unwrap(),
            GameMessage::PlayerList(vec!["Bob".to_string()])
        );
        assert_eq!(
            rx_bob.try_recv().unwrap(),
            GameMessage::PlayerList(vec!["Ann".to_string()])
        );
    }
}
