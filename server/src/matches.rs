//! Registry of active matches
//!
//! Alongside the id-keyed map, the registry keeps a player-to-match index so
//! a player's next move is routed without scanning every match, and so a
//! player can never sit in two matches at once.
//!
//! Lock order: a `Match` may call into the registry while holding its own
//! lock, so the registry never awaits a match lock while holding its own.

use crate::game::{Match, MatchId};
use crate::player::PlayerHandle;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchRegistryError {
    #[error("Match {0} is already in progress")]
    Duplicate(String),
    #[error("{0} is already playing a match")]
    PlayerBusy(String),
}

#[derive(Default)]
struct MatchRegistryInner {
    matches: HashMap<MatchId, Arc<Match>>,
    by_player: HashMap<u64, MatchId>,
}

#[derive(Default)]
pub struct MatchRegistry {
    inner: RwLock<MatchRegistryInner>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new match. Fails if the pair already has a match in either
    /// ordering or if either participant is busy elsewhere.
    pub async fn create(&self, game: Arc<Match>) -> Result<(), MatchRegistryError> {
        let mut inner = self.inner.write().await;

        let id = game.id().clone();
        if inner.matches.contains_key(&id) || inner.matches.contains_key(&id.reversed()) {
            return Err(MatchRegistryError::Duplicate(id.to_string()));
        }
        if let Some(busy) = game
            .players()
            .iter()
            .find(|player| inner.by_player.contains_key(&player.id()))
        {
            return Err(MatchRegistryError::PlayerBusy(busy.nickname().to_string()));
        }

        for player in game.players() {
            inner.by_player.insert(player.id(), id.clone());
        }
        inner.matches.insert(id.clone(), game);
        info!("Match {} registered ({} active)", id, inner.matches.len());

        Ok(())
    }

    /// Removes a match by id. Idempotent.
    pub async fn remove(&self, id: &MatchId) -> Option<Arc<Match>> {
        let mut inner = self.inner.write().await;
        Self::remove_locked(&mut inner, id)
    }

    /// Removes `game` only if it is still the match registered under its id.
    pub async fn deregister(&self, game: &Match) -> bool {
        let mut inner = self.inner.write().await;
        let current = inner
            .matches
            .get(game.id())
            .is_some_and(|registered| std::ptr::eq(Arc::as_ptr(registered), game));
        if current {
            Self::remove_locked(&mut inner, game.id());
        }
        current
    }

    pub async fn find_by_player(&self, player: &PlayerHandle) -> Option<Arc<Match>> {
        let inner = self.inner.read().await;
        let id = inner.by_player.get(&player.id())?;
        inner.matches.get(id).cloned()
    }

    pub async fn is_playing(&self, player: &PlayerHandle) -> bool {
        self.inner.read().await.by_player.contains_key(&player.id())
    }

    /// True if `a` and `b` share a match, whichever of them issued the challenge
    pub async fn exists_for_pair(&self, a: &str, b: &str) -> bool {
        let id = MatchId::new(a, b);
        let inner = self.inner.read().await;
        inner.matches.contains_key(&id) || inner.matches.contains_key(&id.reversed())
    }

    /// Ends and removes every match `player` takes part in
    ///
    /// Matches are pulled out of the registry first and only then told about
    /// the disconnect, so no match lock is awaited under the registry lock.
    /// Returns the number of matches that were still running.
    pub async fn remove_all_for_player(&self, player: &PlayerHandle) -> usize {
        let removed: Vec<Arc<Match>> = {
            let mut inner = self.inner.write().await;
            let ids: Vec<MatchId> = inner
                .matches
                .iter()
                .filter(|(_, game)| game.has_player(player))
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter()
                .filter_map(|id| Self::remove_locked(&mut inner, id))
                .collect()
        };

        let mut ended = 0;
        for game in removed {
            if game.on_disconnect(player).await {
                ended += 1;
            }
        }
        if ended > 0 {
            debug!("Ended {} match(es) for {}", ended, player.nickname());
        }
        ended
    }

    pub async fn contains(&self, id: &MatchId) -> bool {
        self.inner.read().await.matches.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.matches.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.matches.is_empty()
    }

    fn remove_locked(inner: &mut MatchRegistryInner, id: &MatchId) -> Option<Arc<Match>> {
        let game = inner.matches.remove(id)?;
        for player in game.players() {
            if inner.by_player.get(&player.id()) == Some(id) {
                inner.by_player.remove(&player.id());
            }
        }
        info!("Match {} removed ({} active)", id, inner.matches.len());
        Some(game)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{MatchStatus, Outcome};
    use shared::GameMessage;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    type Inbox = mpsc::UnboundedReceiver<GameMessage>;

    fn player(id: u64, nickname: &str) -> (Arc<PlayerHandle>, Inbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        (
            Arc::new(PlayerHandle::new(id, nickname.to_string(), addr, tx)),
            rx,
        )
    }

    fn new_match(a: &Arc<PlayerHandle>, b: &Arc<PlayerHandle>) -> Arc<Match> {
        Arc::new(Match::new(
            MatchId::new(a.nickname(), b.nickname()),
            Arc::clone(a),
            Arc::clone(b),
        ))
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let registry = MatchRegistry::new();
        let (ann, _rx1) = player(1, "Ann");
        let (bob, _rx2) = player(2, "Bob");
        let (cid, _rx3) = player(3, "Cid");

        let game = new_match(&ann, &bob);
        registry.create(Arc::clone(&game)).await.unwrap();

        assert_eq!(registry.len().await, 1);
        assert!(registry.is_playing(&ann).await);
        assert!(!registry.is_playing(&cid).await);
        let found = registry.find_by_player(&bob).await.unwrap();
        assert!(Arc::ptr_eq(&found, &game));
        assert!(registry.find_by_player(&cid).await.is_none());
    }

    #[tokio::test]
    async fn test_pair_checked_in_both_orders() {
        let registry = MatchRegistry::new();
        let (ann, _rx1) = player(1, "Ann");
        let (bob, _rx2) = player(2, "Bob");

        registry.create(new_match(&ann, &bob)).await.unwrap();

        assert!(registry.exists_for_pair("Ann", "Bob").await);
        assert!(registry.exists_for_pair("Bob", "Ann").await);
        assert!(!registry.exists_for_pair("Ann", "Cid").await);

        let err = registry.create(new_match(&bob, &ann)).await.unwrap_err();
        assert_eq!(err, MatchRegistryError::Duplicate("Bob-Ann".to_string()));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_player_limited_to_one_match() {
        let registry = MatchRegistry::new();
        let (ann, _rx1) = player(1, "Ann");
        let (bob, _rx2) = player(2, "Bob");
        let (cid, _rx3) = player(3, "Cid");

        registry.create(new_match(&ann, &bob)).await.unwrap();
        let err = registry.create(new_match(&cid, &bob)).await.unwrap_err();

        assert_eq!(err, MatchRegistryError::PlayerBusy("Bob".to_string()));
        assert!(!registry.is_playing(&cid).await);
    }

    #[tokio::test]
    async fn test_remove_idempotent() {
        let registry = MatchRegistry::new();
        let (ann, _rx1) = player(1, "Ann");
        let (bob, _rx2) = player(2, "Bob");
        let game = new_match(&ann, &bob);
        registry.create(Arc::clone(&game)).await.unwrap();

        assert!(registry.remove(game.id()).await.is_some());
        assert!(registry.remove(game.id()).await.is_none());
        assert!(registry.is_empty().await);
        assert!(!registry.is_playing(&ann).await);
        assert!(!registry.is_playing(&bob).await);
    }

    #[tokio::test]
    async fn test_deregister_ignores_replaced_match() {
        let registry = MatchRegistry::new();
        let (ann, _rx1) = player(1, "Ann");
        let (bob, _rx2) = player(2, "Bob");

        let old = new_match(&ann, &bob);
        registry.create(Arc::clone(&old)).await.unwrap();
        registry.remove(old.id()).await;
        let new = new_match(&ann, &bob);
        registry.create(Arc::clone(&new)).await.unwrap();

        assert!(!registry.deregister(&old).await);
        assert!(registry.contains(new.id()).await);
        assert!(registry.deregister(&new).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_all_for_player() {
        let registry = MatchRegistry::new();
        let (ann, mut ann_rx) = player(1, "Ann");
        let (bob, mut bob_rx) = player(2, "Bob");
        let (cid, _rx3) = player(3, "Cid");
        let (dan, mut dan_rx) = player(4, "Dan");

        let game = new_match(&ann, &bob);
        registry.create(Arc::clone(&game)).await.unwrap();
        registry.create(new_match(&cid, &dan)).await.unwrap();

        assert_eq!(registry.remove_all_for_player(&bob).await, 1);
        assert_eq!(registry.remove_all_for_player(&bob).await, 0);

        assert!(!registry.contains(game.id()).await);
        assert_eq!(registry.len().await, 1);
        assert_eq!(game.status().await, MatchStatus::Finished(Outcome::Abandoned));
        assert_eq!(ann_rx.try_recv().unwrap(), GameMessage::OpponentDisconnected);
        assert!(ann_rx.try_recv().is_err());
        assert!(bob_rx.try_recv().is_err());
        assert!(dan_rx.try_recv().is_err());
    }
}
