use thiserror::Error;

use crate::remote::model::GameId;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Error)]
pub enum InvalidMoveError {
    #[error("position {0} is off the board")]
    OutOfRange(usize),
    #[error("tile {0} is already marked")]
    Occupied(usize),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Error)]
pub enum RulesError {
    #[error(transparent)]
    InvalidMove(#[from] InvalidMoveError),
    #[error("the game is over, reset to play again")]
    GameOver,
    #[error("it is {0}'s turn")]
    NotYourTurn(crate::board::Symbol),
}

/// Failures reported by a [`GameStore`](crate::remote::store::GameStore).
#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum StoreError {
    #[error("document {0} does not exist")]
    NotFound(String),
    #[error("document {0} already exists")]
    AlreadyExists(String),
    /// The document moved past the revision the update was conditioned on.
    #[error("document {id} is at revision {actual}, expected {expected}")]
    Conflict { id: String, expected: u64, actual: u64 },
    #[error("connection to the store was lost")]
    Disconnected,
    #[error("store transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("store request failed: {0}")]
    Store(#[from] StoreError),
    #[error("could not encode game document: {0}")]
    Encode(#[source] ron::Error),
    #[error("could not decode game document: {0}")]
    Decode(#[source] ron::error::SpannedError),
}

/// Everything a remote session operation can fail with. All of these are
/// recoverable: the caller shows them and resyncs from the next snapshot.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("game {0} not found")]
    GameNotFound(GameId),
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("tile {0} is already occupied")]
    OccupiedCell(usize),
    #[error("position {0} is off the board")]
    OutOfRange(usize),
    #[error("the game already has two players")]
    GameFull,
    #[error("the game is finished")]
    GameFinished,
    #[error("still waiting for an opponent to join")]
    WaitingForOpponent,
    #[error("you cannot join your own game")]
    OwnGame,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl From<StoreError> for SessionError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => SessionError::GameNotFound(id),
            e => SessionError::Remote(RemoteError::Store(e)),
        }
    }
}

impl From<InvalidMoveError> for SessionError {
    fn from(value: InvalidMoveError) -> Self {
        match value {
            InvalidMoveError::OutOfRange(position) => SessionError::OutOfRange(position),
            InvalidMoveError::Occupied(position) => SessionError::OccupiedCell(position),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("could not access profile file")]
    Io(#[from] std::io::Error),
    #[error("could not encode profile")]
    Encode(#[source] ron::Error),
    #[error("profile file is malformed")]
    Decode(#[source] ron::error::SpannedError),
}
