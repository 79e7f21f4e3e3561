use crate::challenge::ChallengeBroker;
use crate::matches::MatchRegistry;
use crate::registry::ConnectionRegistry;
use crate::relay::VideoRelay;
use std::sync::Arc;

/// Shared components handed to every connection task
///
/// Constructed once per server; cloning only bumps reference counts.
#[derive(Clone)]
pub struct ServerState {
    pub players: Arc<ConnectionRegistry>,
    pub matches: Arc<MatchRegistry>,
    pub challenges: Arc<ChallengeBroker>,
    pub video: Arc<VideoRelay>,
}

impl ServerState {
    pub fn new(video_queue_depth: usize) -> Self {
        let players = Arc::new(ConnectionRegistry::new());
        let matches = Arc::new(MatchRegistry::new());
        let challenges = Arc::new(ChallengeBroker::new(
            Arc::clone(&players),
            Arc::clone(&matches),
        ));

        Self {
            players,
            matches,
            challenges,
            video: Arc::new(VideoRelay::new(video_queue_depth)),
        }
    }
}
