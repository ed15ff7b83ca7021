use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::board::{Board, GameResult, Symbol};
use crate::error::{RemoteError, SessionError};

/// Opaque session identifier.
pub type GameId = String;

/// Stable identifier of a participant.
pub type PlayerId = String;

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
}

impl PlayerInfo {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum GameStatus {
    Waiting,
    InProgress,
    Finished,
}

impl GameStatus {
    /// Value stored in the `status` index field.
    pub const fn as_str(self) -> &'static str {
        match self {
            GameStatus::Waiting => "waiting",
            GameStatus::InProgress => "inProgress",
            GameStatus::Finished => "finished",
        }
    }
}

/// The seat a player took: the host sits first, the joiner second.
/// Seats, not "me" and "them", decide which symbol a cell shows.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Seat {
    First,
    Second,
}

impl Seat {
    pub const fn symbol(self) -> Symbol {
        match self {
            Seat::First => Symbol::X,
            Seat::Second => Symbol::O,
        }
    }
}

/// Index fields written next to every game document.
pub(crate) const STATUS_FIELD: &str = "status";
pub(crate) const PLAYER1_FIELD: &str = "player1";
pub(crate) const PLAYER2_FIELD: &str = "player2";

/// One snapshot of a shared game document.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct RemoteGame {
    pub id: GameId,
    pub player1: PlayerInfo,
    pub player2: Option<PlayerInfo>,
    pub status: GameStatus,
    pub board: Board<PlayerId>,
    pub current_player_id: PlayerId,
    pub winner_id: Option<PlayerId>,
    pub created_at: DateTime<Utc>,
    pub last_move_at: Option<DateTime<Utc>>,
}

impl RemoteGame {
    pub fn new(id: GameId, host: PlayerInfo, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            current_player_id: host.id.clone(),
            player1: host,
            player2: None,
            status: GameStatus::Waiting,
            board: Board::default(),
            winner_id: None,
            created_at,
            last_move_at: None,
        }
    }

    pub fn seat_of(&self, player_id: &str) -> Option<Seat> {
        if self.player1.id == player_id {
            Some(Seat::First)
        } else if self.player2.as_ref().is_some_and(|p| p.id == player_id) {
            Some(Seat::Second)
        } else {
            None
        }
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.seat_of(player_id).is_some()
    }

    pub fn is_open(&self) -> bool {
        self.status == GameStatus::Waiting && self.player2.is_none()
    }

    /// Seats `joiner` second and starts the game. The turn stays with the host.
    pub fn join(&self, joiner: PlayerInfo) -> Result<RemoteGame, SessionError> {
        if self.player2.is_some() {
            return Err(SessionError::GameFull);
        }
        if self.status == GameStatus::Finished {
            return Err(SessionError::GameFinished);
        }
        if self.player1.id == joiner.id {
            return Err(SessionError::OwnGame);
        }

        let mut next = self.clone();
        next.player2 = Some(joiner);
        next.status = GameStatus::InProgress;
        Ok(next)
    }

    /// Validates `player_id` marking `position` and returns the game as it
    /// should be committed. Checks run in order: finished, waiting, turn,
    /// then the tile itself.
    pub fn apply_move(
        &self,
        position: usize,
        player_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RemoteGame, SessionError> {
        match self.status {
            GameStatus::Finished => return Err(SessionError::GameFinished),
            GameStatus::Waiting => return Err(SessionError::WaitingForOpponent),
            GameStatus::InProgress => {}
        }
        if self.current_player_id != player_id {
            return Err(SessionError::NotYourTurn);
        }

        let mut next = self.clone();
        next.board = self.board.place(position, player_id.to_string())?;
        next.last_move_at = Some(now);
        match next.board.evaluate() {
            GameResult::Win { winner, .. } => {
                next.winner_id = Some(winner);
                next.status = GameStatus::Finished;
            }
            GameResult::Draw => {
                next.status = GameStatus::Finished;
            }
            GameResult::Ongoing => {
                next.current_player_id = self
                    .opponent_of(player_id)
                    .ok_or(SessionError::WaitingForOpponent)?
                    .id
                    .clone();
            }
        }
        Ok(next)
    }

    /// The player across the board from `player_id`, once both seats are taken.
    pub fn opponent_of(&self, player_id: &str) -> Option<&PlayerInfo> {
        match self.seat_of(player_id)? {
            Seat::First => self.player2.as_ref(),
            Seat::Second => Some(&self.player1),
        }
    }

    pub(crate) fn index_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert(STATUS_FIELD.to_string(), self.status.as_str().to_string());
        fields.insert(PLAYER1_FIELD.to_string(), self.player1.id.clone());
        if let Some(player2) = &self.player2 {
            fields.insert(PLAYER2_FIELD.to_string(), player2.id.clone());
        }
        fields
    }

    pub fn encode(&self) -> Result<Bytes, RemoteError> {
        ron::ser::to_string(self)
            .map(Bytes::from)
            .map_err(RemoteError::Encode)
    }

    pub fn decode(body: &[u8]) -> Result<Self, RemoteError> {
        ron::de::from_bytes(body).map_err(RemoteError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Cell;

    fn started() -> RemoteGame {
        RemoteGame::new("g".into(), PlayerInfo::new("p1", "Ana"), Utc::now())
            .join(PlayerInfo::new("p2", "Luis"))
            .unwrap()
    }

    #[test]
    fn new_game_waits_with_host_to_move() {
        let game = RemoteGame::new("g".into(), PlayerInfo::new("p1", "Ana"), Utc::now());
        assert_eq!(game.status, GameStatus::Waiting);
        assert_eq!(game.current_player_id, "p1");
        assert!(game.player2.is_none());
        assert!(game.is_open());
        assert_eq!(game.board.mark_count(), 0);
    }

    #[test]
    fn join_keeps_turn_with_host() {
        let game = started();
        assert_eq!(game.status, GameStatus::InProgress);
        assert_eq!(game.current_player_id, "p1");
        assert_eq!(game.seat_of("p2"), Some(Seat::Second));
        assert!(matches!(
            game.join(PlayerInfo::new("p3", "Eva")),
            Err(SessionError::GameFull)
        ));
    }

    #[test]
    fn host_cannot_join_own_game() {
        let game = RemoteGame::new("g".into(), PlayerInfo::new("p1", "Ana"), Utc::now());
        assert!(matches!(
            game.join(PlayerInfo::new("p1", "Ana")),
            Err(SessionError::OwnGame)
        ));
    }

    #[test]
    fn move_passes_turn() {
        let game = started().apply_move(4, "p1", Utc::now()).unwrap();
        assert_eq!(game.board.get(4), Some(&Cell::HeldBy("p1".to_string())));
        assert_eq!(game.current_player_id, "p2");
        assert!(game.last_move_at.is_some());
    }

    #[test]
    fn move_rejections() {
        let game = started();
        assert!(matches!(
            game.apply_move(0, "p2", Utc::now()),
            Err(SessionError::NotYourTurn)
        ));
        let game = game.apply_move(0, "p1", Utc::now()).unwrap();
        assert!(matches!(
            game.apply_move(0, "p2", Utc::now()),
            Err(SessionError::OccupiedCell(0))
        ));
        assert!(matches!(
            game.apply_move(9, "p2", Utc::now()),
            Err(SessionError::OutOfRange(9))
        ));

        let waiting = RemoteGame::new("w".into(), PlayerInfo::new("p1", "Ana"), Utc::now());
        assert!(matches!(
            waiting.apply_move(0, "p1", Utc::now()),
            Err(SessionError::WaitingForOpponent)
        ));
    }

    #[test]
    fn winning_move_finishes() {
        let mut game = started();
        for (position, player) in [(0, "p1"), (3, "p2"), (1, "p1"), (4, "p2"), (2, "p1")] {
            game = game.apply_move(position, player, Utc::now()).unwrap();
        }
        assert_eq!(game.status, GameStatus::Finished);
        assert_eq!(game.winner_id.as_deref(), Some("p1"));
        assert!(matches!(
            game.apply_move(5, "p2", Utc::now()),
            Err(SessionError::GameFinished)
        ));
    }

    #[test]
    fn full_board_finishes_without_winner() {
        let mut game = started();
        let moves = [
            (0, "p1"),
            (1, "p2"),
            (2, "p1"),
            (4, "p2"),
            (3, "p1"),
            (5, "p2"),
            (7, "p1"),
            (6, "p2"),
            (8, "p1"),
        ];
        for (position, player) in moves {
            game = game.apply_move(position, player, Utc::now()).unwrap();
        }
        assert_eq!(game.status, GameStatus::Finished);
        assert_eq!(game.winner_id, None);
    }

    #[test]
    fn document_body_decodes_back() {
        let game = started().apply_move(8, "p1", Utc::now()).unwrap();
        let body = game.encode().unwrap();
        assert_eq!(RemoteGame::decode(&body).unwrap(), game);
        assert!(matches!(
            RemoteGame::decode(b"not a game"),
            Err(RemoteError::Decode(_))
        ));
    }

    #[test]
    fn index_fields_track_seats_and_status() {
        let fields = started().index_fields();
        assert_eq!(fields.get(STATUS_FIELD).map(String::as_str), Some("inProgress"));
        assert_eq!(fields.get(PLAYER2_FIELD).map(String::as_str), Some("p2"));
    }
}
