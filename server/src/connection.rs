//! Per-connection task for the game protocol
//!
//! Each accepted socket gets a reader loop (this task) and a writer task.
//! The writer drains the connection's outbound channel, which is the sink
//! behind the player's `PlayerHandle`; every other component only ever
//! queues messages on it. When either side of the socket fails the
//! connection is torn down and the player is removed from every registry.

use crate::game::MoveResult;
use crate::player::PlayerHandle;
use crate::state::ServerState;
use log::{debug, info, warn};
use shared::{decode_message, read_frame, write_message, GameMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Serves one game client until it disconnects.
pub async fn handle_game_connection(stream: TcpStream, addr: SocketAddr, state: ServerState) {
    info!("Game connection from {}", addr);

    let (mut reader, writer) = stream.into_split();
    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    let mut writer_task = tokio::spawn(run_writer(writer, outbound_rx, addr));

    let mut session = GameSession::new(addr, state, outbound);
    session.send(GameMessage::SetNickname);

    loop {
        let frame = tokio::select! {
            frame = read_frame(&mut reader) => frame,
            _ = &mut writer_task => {
                debug!("Writer for {} stopped", addr);
                break;
            }
        };

        match frame {
            Ok(Some(body)) => match decode_message(&body) {
                Ok(message) => session.handle_message(message).await,
                Err(e) => {
                    warn!("Malformed message from {}: {}", addr, e);
                    session.send(GameMessage::ProtocolError(e.to_string()));
                }
            },
            Ok(None) => {
                debug!("{} closed the connection", addr);
                break;
            }
            Err(e) => {
                warn!("Dropping game connection {}: {}", addr, e);
                break;
            }
        }
    }

    session.cleanup().await;
    writer_task.abort();
    info!("Game connection from {} closed", addr);
}

async fn run_writer(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<GameMessage>,
    addr: SocketAddr,
) {
    while let Some(message) = outbound.recv().await {
        if let Err(e) = write_message(&mut writer, &message).await {
            warn!("Failed to send {} to {}: {}", message.message_type(), addr, e);
            break;
        }
    }
}

/// Protocol state of one game connection
pub struct GameSession {
    addr: SocketAddr,
    state: ServerState,
    outbound: mpsc::UnboundedSender<GameMessage>,
    player: Option<Arc<PlayerHandle>>,
}

impl GameSession {
    pub fn new(
        addr: SocketAddr,
        state: ServerState,
        outbound: mpsc::UnboundedSender<GameMessage>,
    ) -> Self {
        Self {
            addr,
            state,
            outbound,
            player: None,
        }
    }

    pub fn player(&self) -> Option<&Arc<PlayerHandle>> {
        self.player.as_ref()
    }

    fn send(&self, message: GameMessage) {
        // A closed channel means the writer is gone; the reader loop notices.
        let _ = self.outbound.send(message);
    }

    pub async fn handle_message(&mut self, message: GameMessage) {
        let player = match &self.player {
            Some(player) => Arc::clone(player),
            None => return self.handle_registration(message).await,
        };

        match message {
            GameMessage::ListPlayers => {
                let players = self.state.players.snapshot(player.nickname()).await;
                self.send(GameMessage::PlayerList(players));
            }
            GameMessage::Challenge(target) => {
                match self.state.challenges.challenge(&player, &target).await {
                    Ok(()) => self.send(GameMessage::ChallengeSent(target)),
                    Err(e) => self.send(GameMessage::ChallengeError(e.to_string())),
                }
            }
            GameMessage::ChallengeAccept(challenger) => {
                if let Err(e) = self.state.challenges.accept(&player, &challenger).await {
                    self.send(GameMessage::ChallengeError(e.to_string()));
                }
            }
            GameMessage::ChallengeReject(challenger) => {
                self.state.challenges.reject(&player, &challenger).await;
            }
            GameMessage::Move(position) => self.handle_move(&player, &position).await,
            GameMessage::Nickname(_) => {
                self.send(GameMessage::NicknameError(format!(
                    "Already registered as {}",
                    player.nickname()
                )));
            }
            other => {
                warn!(
                    "Unexpected {} from {} ({})",
                    other.message_type(),
                    player.nickname(),
                    self.addr
                );
                self.send(GameMessage::ProtocolError(format!(
                    "Unexpected message type {}",
                    other.message_type()
                )));
            }
        }
    }

    async fn handle_registration(&mut self, message: GameMessage) {
        let nickname = match message {
            GameMessage::Nickname(nickname) => nickname,
            other => {
                self.send(GameMessage::ProtocolError(format!(
                    "Expected NICKNAME, got {}",
                    other.message_type()
                )));
                self.send(GameMessage::SetNickname);
                return;
            }
        };

        match self
            .state
            .players
            .register(&nickname, self.addr, self.outbound.clone())
            .await
        {
            Ok(player) => {
                self.send(GameMessage::NicknameSuccess(player.nickname().to_string()));
                self.player = Some(player);
                self.state.players.broadcast_player_list().await;
            }
            Err(e) => {
                debug!("Rejected nickname {:?} from {}: {}", nickname, self.addr, e);
                self.send(GameMessage::NicknameError(e.to_string()));
                self.send(GameMessage::SetNickname);
            }
        }
    }

    async fn handle_move(&self, player: &Arc<PlayerHandle>, position: &str) {
        let Some(game) = self.state.matches.find_by_player(player).await else {
            self.send(GameMessage::ProtocolError("No active match".to_string()));
            return;
        };

        let result = game.apply_move(player, position, &self.state.matches).await;
        if result != MoveResult::Applied {
            debug!(
                "Move {:?} by {} in {}: {:?}",
                position,
                player.nickname(),
                game.id(),
                result
            );
        }
    }

    /// Removes the player from every registry. Safe to call more than once.
    pub async fn cleanup(&mut self) {
        let Some(player) = self.player.take() else {
            return;
        };

        self.state.players.unregister(player.nickname()).await;
        self.state.challenges.remove_player(player.nickname()).await;
        self.state.matches.remove_all_for_player(&player).await;
        self.state.players.broadcast_player_list().await;

        info!("Player {} disconnected", player.nickname());
    }
}
