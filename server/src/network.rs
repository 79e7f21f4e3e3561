//! Server network layer: the game and video TCP listeners and their accept loops

use crate::config::Config;
use crate::connection::handle_game_connection;
use crate::state::ServerState;
use crate::video::handle_video_connection;
use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Both listeners plus the shared state every connection task works against
pub struct Server {
    game_listener: TcpListener,
    video_listener: TcpListener,
    state: ServerState,
}

impl Server {
    pub async fn bind(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let game_listener = TcpListener::bind(config.game_addr()).await?;
        let video_listener = TcpListener::bind(config.video_addr()).await?;

        info!("Game server listening on {}", game_listener.local_addr()?);
        info!("Video relay listening on {}", video_listener.local_addr()?);

        Ok(Server {
            game_listener,
            video_listener,
            state: ServerState::new(config.video_queue),
        })
    }

    pub fn game_addr(&self) -> std::io::Result<SocketAddr> {
        self.game_listener.local_addr()
    }

    pub fn video_addr(&self) -> std::io::Result<SocketAddr> {
        self.video_listener.local_addr()
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Runs both accept loops until the task is dropped
    pub async fn run(self) {
        let Server {
            game_listener,
            video_listener,
            state,
        } = self;

        info!("Server started successfully");

        tokio::join!(
            Self::accept_game(game_listener, state.clone()),
            Self::accept_video(video_listener, state),
        );
    }

    async fn accept_game(listener: TcpListener, state: ServerState) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
                    }
                    tokio::spawn(handle_game_connection(stream, addr, state.clone()));
                }
                Err(e) => {
                    error!("Error accepting game connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    async fn accept_video(listener: TcpListener, state: ServerState) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    tokio::spawn(handle_video_connection(
                        stream,
                        addr,
                        Arc::clone(&state.video),
                    ));
                }
                Err(e) => {
                    error!("Error accepting video connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{read_message, write_message, GameMessage};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_bind_ephemeral_ports() {
        let server = Server::bind(&Config::ephemeral()).await.unwrap();

        let game = server.game_addr().unwrap();
        let video = server.video_addr().unwrap();
        assert_ne!(game.port(), 0);
        assert_ne!(video.port(), 0);
        assert_ne!(game.port(), video.port());
    }

    #[tokio::test]
    async fn test_bind_port_in_use_fails() {
        let first = Server::bind(&Config::ephemeral()).await.unwrap();
        let mut config = Config::ephemeral();
        config.game_port = first.game_addr().unwrap().port();

        assert!(Server::bind(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_new_connection_prompted_for_nickname() {
        let server = Server::bind(&Config::ephemeral()).await.unwrap();
        let addr = server.game_addr().unwrap();
        tokio::spawn(server.run());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let first = read_message(&mut stream).await.unwrap();
        assert_eq!(first, Some(GameMessage::SetNickname));

        write_message(&mut stream, &GameMessage::Nickname("Ann".to_string()))
            .await
            .unwrap();
        let reply = read_message(&mut stream).await.unwrap();
        assert_eq!(reply, Some(GameMessage::NicknameSuccess("Ann".to_string())));
    }
}
