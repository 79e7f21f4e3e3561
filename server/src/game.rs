//! Board rules and the per-match state machine
//!
//! A `Match` owns one board and its two participants. Every move goes through
//! `Match::apply_move`, which holds the match's own lock for the whole
//! validate, apply, broadcast and deregister sequence. Notifications are
//! queued on the players' outbound channels, so no socket I/O happens while
//! the lock is held. Unrelated matches never contend with each other.

use crate::matches::MatchRegistry;
use crate::player::PlayerHandle;
use log::{debug, info};
use shared::{GameMessage, GameResult, Mark, BOARD_CELLS, WINNING_LINES};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Board {
    cells: [Option<Mark>; BOARD_CELLS],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, position: usize) -> Option<Mark> {
        self.cells.get(position).copied().flatten()
    }

    pub fn is_free(&self, position: usize) -> bool {
        position < BOARD_CELLS && self.cells[position].is_none()
    }

    /// Writes a mark into an empty cell. Returns false without touching the
    /// board if the cell is out of range or taken.
    pub fn place(&mut self, position: usize, mark: Mark) -> bool {
        if !self.is_free(position) {
            return false;
        }
        self.cells[position] = Some(mark);
        true
    }

    /// The mark holding three in a row, if any
    pub fn winner(&self) -> Option<Mark> {
        WINNING_LINES.iter().find_map(|&[a, b, c]| {
            let mark = self.cells[a]?;
            (self.cells[b] == Some(mark) && self.cells[c] == Some(mark)).then_some(mark)
        })
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Terminal result of the board, checking for a winner before a tie
    pub fn result(&self) -> Option<GameResult> {
        if let Some(mark) = self.winner() {
            Some(GameResult::Winner(mark))
        } else if self.is_full() {
            Some(GameResult::Tie)
        } else {
            None
        }
    }
}

/// Registry key for a match: challenger first, acceptor second
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchId {
    first: String,
    second: String,
}

impl MatchId {
    pub fn new(first: &str, second: &str) -> Self {
        Self {
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    pub fn reversed(&self) -> Self {
        Self::new(&self.second, &self.first)
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won(Mark),
    Tie,
    /// A participant disconnected before the board was decided
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    InProgress { turn: Mark },
    Finished(Outcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    /// The move was applied and the match continues
    Applied,
    NotYourTurn,
    InvalidMove,
    /// The match is over, either because of this move or before it
    GameOver(Outcome),
}

#[derive(Debug)]
struct MatchState {
    board: Board,
    turn: Mark,
    finished: Option<Outcome>,
}

/// One game between exactly two players. `players[0]` plays X and moves first.
#[derive(Debug)]
pub struct Match {
    id: MatchId,
    players: [Arc<PlayerHandle>; 2],
    state: Mutex<MatchState>,
}

impl Match {
    pub fn new(id: MatchId, first: Arc<PlayerHandle>, second: Arc<PlayerHandle>) -> Self {
        Self {
            id,
            players: [first, second],
            state: Mutex::new(MatchState {
                board: Board::new(),
                turn: Mark::X,
                finished: None,
            }),
        }
    }

    pub fn id(&self) -> &MatchId {
        &self.id
    }

    pub fn players(&self) -> &[Arc<PlayerHandle>; 2] {
        &self.players
    }

    pub fn has_player(&self, player: &PlayerHandle) -> bool {
        self.players.iter().any(|p| p.as_ref() == player)
    }

    pub fn mark_of(&self, player: &PlayerHandle) -> Option<Mark> {
        if self.players[0].as_ref() == player {
            Some(Mark::X)
        } else if self.players[1].as_ref() == player {
            Some(Mark::O)
        } else {
            None
        }
    }

    fn player_with(&self, mark: Mark) -> &PlayerHandle {
        match mark {
            Mark::X => &self.players[0],
            Mark::O => &self.players[1],
        }
    }

    fn broadcast(&self, message: GameMessage) {
        for player in &self.players {
            player.send(message.clone());
        }
    }

    /// Sends each participant its mark and opponent, then gives X the first turn.
    pub async fn start(&self) {
        let state = self.state.lock().await;
        if state.finished.is_some() {
            debug!("Match {} ended before it started", self.id);
            return;
        }
        let [first, second] = &self.players;

        first.send(GameMessage::GameStart {
            mark: Mark::X,
            opponent: second.nickname().to_string(),
        });
        second.send(GameMessage::GameStart {
            mark: Mark::O,
            opponent: first.nickname().to_string(),
        });
        first.send(GameMessage::YourTurn);

        info!("Match {} started", self.id);
    }

    pub async fn status(&self) -> MatchStatus {
        let state = self.state.lock().await;
        match state.finished {
            Some(outcome) => MatchStatus::Finished(outcome),
            None => MatchStatus::InProgress { turn: state.turn },
        }
    }

    pub async fn board(&self) -> Board {
        self.state.lock().await.board
    }

    /// Validates and applies one move
    ///
    /// The whole sequence runs under the match lock: a rejected move leaves
    /// the board untouched and only the actor hears about it, an accepted
    /// move is broadcast to both players, and a decided board is removed from
    /// `registry` before the lock is released.
    pub async fn apply_move(
        &self,
        actor: &PlayerHandle,
        position: &str,
        registry: &MatchRegistry,
    ) -> MoveResult {
        let mut state = self.state.lock().await;

        if let Some(outcome) = state.finished {
            debug!("Ignoring move from {} in finished match {}", actor.nickname(), self.id);
            return MoveResult::GameOver(outcome);
        }

        if self.mark_of(actor) != Some(state.turn) {
            actor.send(GameMessage::NotYourTurn);
            return MoveResult::NotYourTurn;
        }

        let position = match position.trim().parse::<usize>() {
            Ok(position) if state.board.is_free(position) => position,
            _ => {
                actor.send(GameMessage::InvalidMove);
                return MoveResult::InvalidMove;
            }
        };

        let mark = state.turn;
        state.board.place(position, mark);
        self.broadcast(GameMessage::Board {
            position: position as u8,
            mark,
        });

        if let Some(result) = state.board.result() {
            let outcome = match result {
                GameResult::Winner(mark) => Outcome::Won(mark),
                GameResult::Tie => Outcome::Tie,
            };
            state.finished = Some(outcome);
            self.broadcast(GameMessage::GameOver(result));
            registry.deregister(self).await;
            info!("Match {} over: {}", self.id, result);
            return MoveResult::GameOver(outcome);
        }

        state.turn = mark.other();
        self.player_with(state.turn).send(GameMessage::YourTurn);
        self.player_with(mark).send(GameMessage::OpponentTurn);

        MoveResult::Applied
    }

    /// Ends the match because `player` left. The remaining participant is
    /// told once; returns false if the match had already finished.
    pub async fn on_disconnect(&self, player: &PlayerHandle) -> bool {
        let mut state = self.state.lock().await;
        if state.finished.is_some() {
            return false;
        }
        state.finished = Some(Outcome::Abandoned);

        for other in self.players.iter().filter(|p| p.as_ref() != player) {
            other.send(GameMessage::OpponentDisconnected);
        }
        info!("Match {} abandoned by {}", self.id, player.nickname());
        true
    }
}
