//! Challenge negotiation between connected players
//!
//! At most one challenge is pending per target. A newer challenge to the
//! same target replaces the older one (last challenge wins); the replaced
//! challenger is not notified. Accept and reject must name the challenger on
//! record, so a stale or mismatched response never consumes someone else's
//! challenge.

use crate::game::{Match, MatchId};
use crate::matches::{MatchRegistry, MatchRegistryError};
use crate::player::PlayerHandle;
use crate::registry::ConnectionRegistry;
use log::{debug, info};
use shared::GameMessage;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("Player {0} is not available")]
    TargetUnavailable(String),
    #[error("A match with {0} is already in progress")]
    AlreadyInProgress(String),
    #[error("You cannot challenge yourself")]
    SelfChallenge,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AcceptError {
    #[error("No pending challenge from {0}")]
    Invalid(String),
    #[error("Challenger {0} is no longer available")]
    ChallengerGone(String),
    #[error("{0}")]
    AlreadyInProgress(#[from] MatchRegistryError),
}

pub struct ChallengeBroker {
    /// target nickname -> challenger nickname
    pending: RwLock<HashMap<String, String>>,
    players: Arc<ConnectionRegistry>,
    matches: Arc<MatchRegistry>,
}

impl ChallengeBroker {
    pub fn new(players: Arc<ConnectionRegistry>, matches: Arc<MatchRegistry>) -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
            players,
            matches,
        }
    }

    /// Records a challenge from `from` to `to` and forwards it to the target.
    pub async fn challenge(&self, from: &PlayerHandle, to: &str) -> Result<(), ChallengeError> {
        if from.nickname() == to {
            return Err(ChallengeError::SelfChallenge);
        }

        let target = self
            .players
            .lookup(to)
            .await
            .ok_or_else(|| ChallengeError::TargetUnavailable(to.to_string()))?;

        if self.matches.exists_for_pair(from.nickname(), to).await
            || self.matches.is_playing(from).await
            || self.matches.is_playing(&target).await
        {
            return Err(ChallengeError::AlreadyInProgress(to.to_string()));
        }

        self.record(from, &target).await
    }

    /// Stores the pending record and notifies `target`, unless the target
    /// left after it was looked up.
    async fn record(
        &self,
        from: &PlayerHandle,
        target: &PlayerHandle,
    ) -> Result<(), ChallengeError> {
        let to = target.nickname();
        let replaced = self
            .pending
            .write()
            .await
            .insert(to.to_string(), from.nickname().to_string());
        if let Some(previous) = replaced.filter(|previous| previous != from.nickname()) {
            debug!("Challenge from {} to {} replaced by {}", previous, to, from.nickname());
        }

        // Cleanup unregisters before clearing pending records.
        if !self.is_current(target).await {
            self.take_pending(to, from.nickname()).await;
            return Err(ChallengeError::TargetUnavailable(to.to_string()));
        }

        target.send(GameMessage::ChallengeRequest(from.nickname().to_string()));
        info!("{} challenged {}", from.nickname(), to);
        Ok(())
    }

    /// Consumes the pending challenge and starts a match
    ///
    /// Both players get `CHALLENGE_ACCEPTED` followed by the match start
    /// messages. The pending record is removed even when the challenger has
    /// meanwhile disconnected.
    pub async fn accept(
        &self,
        acceptor: &Arc<PlayerHandle>,
        claimed_challenger: &str,
    ) -> Result<Arc<Match>, AcceptError> {
        let challenger = self.claim(acceptor, claimed_challenger).await?;
        self.open_match(acceptor, challenger).await
    }

    async fn claim(
        &self,
        acceptor: &PlayerHandle,
        claimed_challenger: &str,
    ) -> Result<Arc<PlayerHandle>, AcceptError> {
        self.take_pending(acceptor.nickname(), claimed_challenger)
            .await
            .ok_or_else(|| AcceptError::Invalid(claimed_challenger.to_string()))?;

        self.players
            .lookup(claimed_challenger)
            .await
            .ok_or_else(|| AcceptError::ChallengerGone(claimed_challenger.to_string()))
    }

    async fn open_match(
        &self,
        acceptor: &Arc<PlayerHandle>,
        challenger: Arc<PlayerHandle>,
    ) -> Result<Arc<Match>, AcceptError> {
        let id = MatchId::new(challenger.nickname(), acceptor.nickname());
        let game = Arc::new(Match::new(id, Arc::clone(&challenger), Arc::clone(acceptor)));
        self.matches.create(Arc::clone(&game)).await?;

        // Cleanup unregisters before removing matches, so a challenger that
        // left since the lookup is caught here.
        if !self.is_current(&challenger).await {
            self.matches.deregister(&game).await;
            game.on_disconnect(&challenger).await;
            return Err(AcceptError::ChallengerGone(challenger.nickname().to_string()));
        }

        challenger.send(GameMessage::ChallengeAccepted(acceptor.nickname().to_string()));
        acceptor.send(GameMessage::ChallengeAccepted(challenger.nickname().to_string()));
        game.start().await;

        Ok(game)
    }

    /// Declines the pending challenge if it is from `claimed_challenger`.
    /// Anything else is ignored. Returns true if a challenge was consumed.
    pub async fn reject(&self, rejector: &PlayerHandle, claimed_challenger: &str) -> bool {
        if self
            .take_pending(rejector.nickname(), claimed_challenger)
            .await
            .is_none()
        {
            debug!(
                "Ignoring reject from {}: no pending challenge from {}",
                rejector.nickname(),
                claimed_challenger
            );
            return false;
        }

        if let Some(challenger) = self.players.lookup(claimed_challenger).await {
            challenger.send(GameMessage::ChallengeRejected(rejector.nickname().to_string()));
        }
        info!("{} rejected the challenge from {}", rejector.nickname(), claimed_challenger);
        true
    }

    /// Drops every pending challenge that involves `nickname` on either side.
    pub async fn remove_player(&self, nickname: &str) {
        self.pending
            .write()
            .await
            .retain(|target, challenger| target != nickname && challenger != nickname);
    }

    /// The challenger currently on record for `target`
    pub async fn pending_for(&self, target: &str) -> Option<String> {
        self.pending.read().await.get(target).cloned()
    }

    /// True while `player` is still the connection registered under its nickname
    async fn is_current(&self, player: &PlayerHandle) -> bool {
        self.players
            .lookup(player.nickname())
            .await
            .is_some_and(|current| current.id() == player.id())
    }

    async fn take_pending(&self, target: &str, claimed_challenger: &str) -> Option<String> {
        let mut pending = self.pending.write().await;
        if pending.get(target).map(String::as_str) != Some(claimed_challenger) {
            return None;
        }
        pending.remove(target)
    }
}
