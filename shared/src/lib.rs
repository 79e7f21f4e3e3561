use serde::{Deserialize, Serialize};
use std::fmt;

pub mod codec;
pub mod video;

pub use codec::{
    decode_message, encode_message, read_frame, read_message, write_message, FrameError,
};

pub const DEFAULT_GAME_PORT: u16 = 12345;
pub const DEFAULT_VIDEO_PORT: u16 = 12347;
pub const BOARD_CELLS: usize = 9;
pub const MAX_NICKNAME_LEN: usize = 32;

/// The eight three-in-a-row lines of a 3x3 board: rows, columns, diagonals.
pub const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn other(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::X => write!(f, "X"),
            Mark::O => write!(f, "O"),
        }
    }
}

/// Final result carried by `GameMessage::GameOver`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Winner(Mark),
    Tie,
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::Winner(mark) => write!(f, "{}", mark),
            GameResult::Tie => write!(f, "TIE"),
        }
    }
}

/// Every message exchanged on a game connection, in either direction.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum GameMessage {
    // Registration
    SetNickname,
    Nickname(String),
    NicknameSuccess(String),
    NicknameError(String),

    // Lobby
    ListPlayers,
    PlayerList(Vec<String>),

    // Challenges
    Challenge(String),
    ChallengeRequest(String),
    ChallengeSent(String),
    ChallengeAccept(String),
    ChallengeAccepted(String),
    ChallengeReject(String),
    ChallengeRejected(String),
    ChallengeError(String),

    // Match
    GameStart { mark: Mark, opponent: String },
    YourTurn,
    OpponentTurn,
    NotYourTurn,
    InvalidMove,
    OpponentDisconnected,
    Move(String),
    Board { position: u8, mark: Mark },
    GameOver(GameResult),

    ProtocolError(String),
}

impl GameMessage {
    /// Protocol type name of the message as it appears in logs and docs.
    pub fn message_type(&self) -> &'static str {
        match self {
            GameMessage::SetNickname => "SET_NICKNAME",
            GameMessage::Nickname(_) => "NICKNAME",
            GameMessage::NicknameSuccess(_) => "NICKNAME_SUCCESS",
            GameMessage::NicknameError(_) => "NICKNAME_ERROR",
            GameMessage::ListPlayers | GameMessage::PlayerList(_) => "LIST_PLAYERS",
            GameMessage::Challenge(_) => "CHALLENGE",
            GameMessage::ChallengeRequest(_) => "CHALLENGE_REQUEST",
            GameMessage::ChallengeSent(_) => "CHALLENGE_SENT",
            GameMessage::ChallengeAccept(_) => "CHALLENGE_ACCEPT",
            GameMessage::ChallengeAccepted(_) => "CHALLENGE_ACCEPTED",
            GameMessage::ChallengeReject(_) => "CHALLENGE_REJECT",
            GameMessage::ChallengeRejected(_) => "CHALLENGE_REJECTED",
            GameMessage::ChallengeError(_) => "CHALLENGE_ERROR",
            GameMessage::GameStart { .. } => "GAME_START",
            GameMessage::YourTurn => "YOUR_TURN",
            GameMessage::OpponentTurn => "OPPONENT_TURN",
            GameMessage::NotYourTurn => "NOT_YOUR_TURN",
            GameMessage::InvalidMove => "INVALID_MOVE",
            GameMessage::OpponentDisconnected => "OPPONENT_DISCONNECTED",
            GameMessage::Move(_) => "MOVE",
            GameMessage::Board { .. } => "BOARD",
            GameMessage::GameOver(_) => "GAME_OVER",
            GameMessage::ProtocolError(_) => "PROTOCOL_ERROR",
        }
    }
}
