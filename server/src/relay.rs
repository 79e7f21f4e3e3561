//! Video pairing relay
//!
//! Keeps the symmetric nickname pairs used for routing and the outbound
//! queue of every live video connection. Frames are opaque: the relay moves
//! bytes from one queue to another and never looks inside them.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardResult {
    Delivered,
    /// The sender has no registered opponent
    NoPair,
    /// The opponent has no live video connection
    RecipientUnreachable,
    /// The opponent's queue is full; the frame was discarded
    Dropped,
}

#[derive(Debug)]
struct VideoPeer {
    id: u64,
    sender: mpsc::Sender<Vec<u8>>,
}

pub struct VideoRelay {
    pairs: RwLock<HashMap<String, String>>,
    connections: RwLock<HashMap<String, VideoPeer>>,
    next_id: AtomicU64,
    queue_depth: usize,
}

impl VideoRelay {
    /// `queue_depth` bounds how many frames may wait for a slow recipient.
    pub fn new(queue_depth: usize) -> Self {
        Self {
            pairs: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_depth: queue_depth.max(1),
        }
    }

    /// Pairs `a` with `b` in both directions, breaking any earlier pairing
    /// either of them had.
    pub async fn register_pair(&self, a: &str, b: &str) {
        let mut pairs = self.pairs.write().await;
        for (name, partner) in [(a, b), (b, a)] {
            if let Some(old) = pairs.insert(name.to_string(), partner.to_string()) {
                if old != partner && pairs.get(&old).map(String::as_str) == Some(name) {
                    pairs.remove(&old);
                }
            }
        }
        info!("Video pair registered: {} <-> {}", a, b);
    }

    /// Removes `a`'s pairing and its opponent's reciprocal entry. Idempotent.
    pub async fn unregister_pair(&self, a: &str) -> Option<String> {
        let mut pairs = self.pairs.write().await;
        let opponent = pairs.remove(a)?;
        if pairs.get(&opponent).map(String::as_str) == Some(a) {
            pairs.remove(&opponent);
        }
        info!("Video pair removed: {} <-> {}", a, opponent);
        Some(opponent)
    }

    pub async fn paired_with(&self, nickname: &str) -> Option<String> {
        self.pairs.read().await.get(nickname).cloned()
    }

    /// Registers the video connection for `nickname`, replacing any earlier
    /// one. Returns the connection id and the queue its frames arrive on.
    pub async fn register_connection(&self, nickname: &str) -> (u64, mpsc::Receiver<Vec<u8>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.queue_depth);

        let replaced = self
            .connections
            .write()
            .await
            .insert(nickname.to_string(), VideoPeer { id, sender });
        if let Some(old) = replaced {
            warn!("Video connection {} for {} replaced by {}", old.id, nickname, id);
        }
        (id, receiver)
    }

    /// Removes the video connection for `nickname` if it is still connection
    /// `id`. Idempotent.
    pub async fn remove_connection(&self, nickname: &str, id: u64) -> bool {
        let mut connections = self.connections.write().await;
        if connections.get(nickname).map(|peer| peer.id) != Some(id) {
            return false;
        }
        connections.remove(nickname);
        true
    }

    pub async fn has_connection(&self, nickname: &str) -> bool {
        self.connections.read().await.contains_key(nickname)
    }

    /// Hands a frame to the sender's paired opponent without waiting.
    pub async fn forward_frame(&self, sender: &str, frame: Vec<u8>) -> ForwardResult {
        let Some(recipient) = self.paired_with(sender).await else {
            debug!("No video pair registered for {}", sender);
            return ForwardResult::NoPair;
        };

        let connections = self.connections.read().await;
        let Some(peer) = connections.get(&recipient) else {
            debug!("Video recipient {} not connected", recipient);
            return ForwardResult::RecipientUnreachable;
        };

        match peer.sender.try_send(frame) {
            Ok(()) => ForwardResult::Delivered,
            Err(TrySendError::Full(_)) => {
                debug!("Video queue for {} full, dropping frame", recipient);
                ForwardResult::Dropped
            }
            Err(TrySendError::Closed(_)) => ForwardResult::RecipientUnreachable,
        }
    }
}
