//! Turns remote snapshots into what the local player should see.

use tracing::{debug, warn};

use crate::board::{Board, Cell, GameResult, Symbol, WinLine};
use crate::error::SessionError;
use crate::remote::model::{GameId, GameStatus, PlayerId, RemoteGame, Seat};
use crate::remote::session::{GameService, Subscription};

const NO_OPPONENT_YET: &str = "Waiting for opponent";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Outcome {
    WaitingForOpponent,
    MyTurn,
    OpponentsTurn,
    IWon,
    OpponentWon,
    Draw,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        matches!(self, Outcome::IWon | Outcome::OpponentWon | Outcome::Draw)
    }
}

/// Local view of one snapshot, as seen from `local_id`'s chair.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SessionView {
    pub game_id: GameId,
    pub am_i_player1: bool,
    pub opponent_name: Option<String>,
    pub is_my_turn: bool,
    /// Player 1's cells show [`Seat::First`]'s symbol, player 2's the
    /// second's, no matter which of them is local.
    pub board: Board<Symbol>,
    pub outcome: Outcome,
    pub winning_line: Option<WinLine>,
}

impl SessionView {
    pub fn derive(snapshot: &RemoteGame, local_id: &str) -> Self {
        let am_i_player1 = snapshot.player1.id == local_id;
        let opponent_name = if am_i_player1 {
            snapshot.player2.as_ref().map(|p| p.name.clone())
        } else {
            Some(snapshot.player1.name.clone())
        };
        let is_my_turn =
            snapshot.status == GameStatus::InProgress && snapshot.current_player_id == local_id;

        let board = snapshot.board.map(|holder| {
            if *holder == snapshot.player1.id {
                Seat::First.symbol()
            } else {
                Seat::Second.symbol()
            }
        });

        let outcome = match (snapshot.status, &snapshot.winner_id) {
            (GameStatus::Waiting, _) => Outcome::WaitingForOpponent,
            (GameStatus::InProgress, _) if is_my_turn => Outcome::MyTurn,
            (GameStatus::InProgress, _) => Outcome::OpponentsTurn,
            (GameStatus::Finished, Some(winner)) if winner == local_id => Outcome::IWon,
            (GameStatus::Finished, Some(_)) => Outcome::OpponentWon,
            (GameStatus::Finished, None) => Outcome::Draw,
        };

        let winning_line = match snapshot.board.evaluate() {
            GameResult::Win { line, .. } if snapshot.winner_id.is_some() => Some(line),
            _ => None,
        };

        Self {
            game_id: snapshot.id.clone(),
            am_i_player1,
            opponent_name,
            is_my_turn,
            board,
            outcome,
            winning_line,
        }
    }

    pub fn opponent_display_name(&self) -> &str {
        self.opponent_name.as_deref().unwrap_or(NO_OPPONENT_YET)
    }

    pub fn is_game_over(&self) -> bool {
        self.outcome.is_terminal()
    }

    pub fn is_waiting(&self) -> bool {
        self.outcome == Outcome::WaitingForOpponent
    }

    pub fn my_symbol(&self) -> Symbol {
        if self.am_i_player1 {
            Seat::First.symbol()
        } else {
            Seat::Second.symbol()
        }
    }

    pub fn status_message(&self) -> String {
        let opponent = self.opponent_display_name();
        match self.outcome {
            Outcome::WaitingForOpponent => "Waiting for opponent...".to_string(),
            Outcome::MyTurn => "Your turn".to_string(),
            Outcome::OpponentsTurn => format!("{opponent}'s turn"),
            Outcome::IWon => "You won!".to_string(),
            Outcome::OpponentWon => format!("{opponent} won!"),
            Outcome::Draw => "Draw!".to_string(),
        }
    }
}

/// One open online game from the local player's side: holds the
/// subscription for as long as the game is open and folds every snapshot
/// into a [`SessionView`]. Errors are kept for display, never raised.
pub struct OnlineGame {
    service: GameService,
    local_id: PlayerId,
    subscription: Subscription,
    view: Option<SessionView>,
    last_error: Option<String>,
}

impl OnlineGame {
    pub fn open(service: &GameService, game_id: &str, local_id: impl Into<PlayerId>) -> Self {
        Self {
            service: service.clone(),
            local_id: local_id.into(),
            subscription: service.subscribe(game_id),
            view: None,
            last_error: None,
        }
    }

    pub fn game_id(&self) -> &str {
        self.subscription.game_id()
    }

    pub fn view(&self) -> Option<&SessionView> {
        self.view.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    /// Waits for the next snapshot and returns the refreshed view. `None`
    /// means the stream is over; a transport failure is left in
    /// [`last_error`](Self::last_error).
    pub async fn next_view(&mut self) -> Option<&SessionView> {
        match self.subscription.next().await? {
            Ok(snapshot) => {
                self.apply(&snapshot);
                self.view.as_ref()
            }
            Err(e) => {
                warn!(game_id = %self.game_id(), "snapshot stream failed: {e}");
                self.last_error = Some(e.to_string());
                None
            }
        }
    }

    /// Folds `snapshot` into the view. Snapshots for other games are ignored.
    pub fn apply(&mut self, snapshot: &RemoteGame) {
        if snapshot.id != self.game_id() {
            debug!(expected = %self.game_id(), got = %snapshot.id, "ignoring foreign snapshot");
            return;
        }
        self.view = Some(SessionView::derive(snapshot, &self.local_id));
    }

    /// Submits a move after checking it against the last snapshot. Taking
    /// `&mut self` keeps a second move from starting while one is in flight.
    /// The board itself only changes when the commit comes back through the
    /// subscription.
    pub async fn make_move(&mut self, position: usize) -> Result<(), SessionError> {
        let result = self.check_move(position);
        let result = match result {
            Ok(()) => self
                .service
                .submit_move(self.subscription.game_id(), position, &self.local_id)
                .await
                .map(drop),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            self.last_error = Some(e.to_string());
        }
        result
    }

    fn check_move(&self, position: usize) -> Result<(), SessionError> {
        let Some(view) = &self.view else {
            return Err(SessionError::WaitingForOpponent);
        };
        match view.outcome {
            Outcome::WaitingForOpponent => return Err(SessionError::WaitingForOpponent),
            Outcome::OpponentsTurn => return Err(SessionError::NotYourTurn),
            Outcome::IWon | Outcome::OpponentWon | Outcome::Draw => {
                return Err(SessionError::GameFinished)
            }
            Outcome::MyTurn => {}
        }
        match view.board.get(position) {
            None => Err(SessionError::OutOfRange(position)),
            Some(Cell::HeldBy(_)) => Err(SessionError::OccupiedCell(position)),
            Some(Cell::Empty) => Ok(()),
        }
    }

    /// Leaves the game, releasing its subscription. Dropping an `OnlineGame`
    /// does the same.
    pub fn leave(self) {
        debug!(game_id = %self.game_id(), "leaving game");
    }
}
