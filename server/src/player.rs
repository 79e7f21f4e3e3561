use log::debug;
use shared::GameMessage;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// A registered game connection as seen by the rest of the server
///
/// The handle is created by the connection registry when a nickname is
/// accepted and is shared (via `Arc`) with the challenge broker and any match
/// the player joins. Messages pushed through `send` are queued on the
/// connection's writer task, so sending never blocks and never touches the
/// socket directly.
#[derive(Debug)]
pub struct PlayerHandle {
    id: u64,
    nickname: String,
    addr: SocketAddr,
    sender: mpsc::UnboundedSender<GameMessage>,
}

impl PlayerHandle {
    pub fn new(
        id: u64,
        nickname: String,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<GameMessage>,
    ) -> Self {
        Self {
            id,
            nickname,
            addr,
            sender,
        }
    }

    /// Connection id, unique for the lifetime of the server process
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queues a message for the player. Returns false once the connection's
    /// writer has gone away.
    pub fn send(&self, message: GameMessage) -> bool {
        let kind = message.message_type();
        if self.sender.send(message).is_err() {
            debug!("Dropping {} for {}: connection closed", kind, self.nickname);
            return false;
        }
        true
    }
}

impl PartialEq for PlayerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PlayerHandle {}
