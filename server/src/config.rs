use clap::Parser;
use shared::{DEFAULT_GAME_PORT, DEFAULT_VIDEO_PORT};

/// Listener and relay settings for the game server
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// IP address both listeners bind to
    #[arg(short = 'H', long, env = "TTT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for game protocol connections
    #[arg(short, long, env = "TTT_GAME_PORT", default_value_t = DEFAULT_GAME_PORT)]
    pub game_port: u16,

    /// Port for video relay connections
    #[arg(short, long, env = "TTT_VIDEO_PORT", default_value_t = DEFAULT_VIDEO_PORT)]
    pub video_port: u16,

    /// Frames that may queue for a slow video recipient before new ones are dropped
    #[arg(long, env = "TTT_VIDEO_QUEUE", default_value_t = 8)]
    pub video_queue: usize,
}

impl Config {
    pub fn game_addr(&self) -> String {
        format!("{}:{}", self.host, self.game_port)
    }

    pub fn video_addr(&self) -> String {
        format!("{}:{}", self.host, self.video_port)
    }

    /// Loopback config on OS-assigned ports, used by tests
    pub fn ephemeral() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            game_port: 0,
            video_port: 0,
            video_queue: 8,
        }
    }
}
