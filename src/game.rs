use serde::{Deserialize, Serialize};

use crate::board::{Board, GameResult, Symbol, WinLine};
use crate::error::RulesError;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Conclusion {
    Win { player: Symbol, line: WinLine },
    Draw,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum State {
    Playing(Symbol),
    Concluded(Conclusion),
}

/// Offline rules engine. `X` always opens; once concluded, only
/// [`Game::reset`] gets the game moving again.
#[derive(Debug, Clone)]
pub struct Game {
    board: Board,
    state: State,
    revision: u64,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    pub fn new() -> Self {
        Game {
            board: Board::default(),
            state: State::Playing(Symbol::X),
            revision: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn whos_turn(&self) -> Option<Symbol> {
        match self.state {
            State::Playing(turn) => Some(turn),
            State::Concluded(_) => None,
        }
    }

    pub fn is_over(&self) -> bool {
        matches!(self.state, State::Concluded(_))
    }

    /// Bumped on every accepted move and every reset. Work scheduled against
    /// an older revision is stale and must not be applied.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Marks `position` for `mover`, who must hold the turn.
    pub fn submit_move(&mut self, position: usize, mover: Symbol) -> Result<State, RulesError> {
        let State::Playing(turn) = self.state else {
            return Err(RulesError::GameOver);
        };
        if mover != turn {
            return Err(RulesError::NotYourTurn(turn));
        }

        self.board = self.board.place(position, turn)?;
        self.revision += 1;
        self.state = match self.board.evaluate() {
            GameResult::Ongoing => State::Playing(!turn),
            GameResult::Win { winner, line } => State::Concluded(Conclusion::Win {
                player: winner,
                line,
            }),
            GameResult::Draw => State::Concluded(Conclusion::Draw),
        };

        Ok(self.state)
    }

    pub fn reset(&mut self) {
        self.board = Board::default();
        self.state = State::Playing(Symbol::X);
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Cell;
    use crate::error::InvalidMoveError;

    fn play(game: &mut Game, positions: &[usize]) -> State {
        let mut state = game.state();
        for &position in positions {
            let mover = game.whos_turn().unwrap();
            state = game.submit_move(position, mover).unwrap();
        }
        state
    }

    #[test]
    fn turns_alternate_starting_with_x() {
        let mut game = Game::new();
        assert_eq!(game.state(), State::Playing(Symbol::X));
        assert_eq!(game.submit_move(0, Symbol::X), Ok(State::Playing(Symbol::O)));
        assert_eq!(game.submit_move(4, Symbol::O), Ok(State::Playing(Symbol::X)));
        assert_eq!(game.board()[crate::board::TileId::A1], Cell::HeldBy(Symbol::X));
        assert_eq!(game.board()[crate::board::TileId::B2], Cell::HeldBy(Symbol::O));
    }

    #[test]
    fn rejected_move_keeps_turn() {
        let mut game = Game::new();
        play(&mut game, &[4]);
        let revision = game.revision();

        assert_eq!(
            game.submit_move(4, Symbol::O),
            Err(RulesError::InvalidMove(InvalidMoveError::Occupied(4)))
        );
        assert_eq!(
            game.submit_move(12, Symbol::O),
            Err(RulesError::InvalidMove(InvalidMoveError::OutOfRange(12)))
        );
        assert_eq!(game.state(), State::Playing(Symbol::O));
        assert_eq!(game.revision(), revision);
    }

    #[test]
    fn wrong_mover_is_rejected() {
        let mut game = Game::new();
        assert_eq!(
            game.submit_move(0, Symbol::O),
            Err(RulesError::NotYourTurn(Symbol::X))
        );
        assert_eq!(game.board().mark_count(), 0);
        assert_eq!(game.revision(), 0);

        play(&mut game, &[0]);
        assert_eq!(
            game.submit_move(8, Symbol::X),
            Err(RulesError::NotYourTurn(Symbol::O))
        );
        assert_eq!(game.board().get(8), Some(&Cell::Empty));
        assert_eq!(game.state(), State::Playing(Symbol::O));
    }

    #[test]
    fn win_is_terminal() {
        let mut game = Game::new();
        let state = play(&mut game, &[0, 3, 1, 4, 2]);
        assert_eq!(
            state,
            State::Concluded(Conclusion::Win {
                player: Symbol::X,
                line: WinLine::ALL[0]
            })
        );
        assert!(game.is_over());
        assert_eq!(game.whos_turn(), None);
        assert_eq!(game.submit_move(8, Symbol::O), Err(RulesError::GameOver));
        assert_eq!(game.board().mark_count(), 5);
    }

    #[test]
    fn draw_is_terminal() {
        let mut game = Game::new();
        let state = play(&mut game, &[0, 1, 2, 4, 3, 5, 7, 6, 8]);
        assert_eq!(state, State::Concluded(Conclusion::Draw));
        assert_eq!(game.submit_move(0, Symbol::X), Err(RulesError::GameOver));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut game = Game::new();
        play(&mut game, &[0, 3, 1, 4, 2]);

        game.reset();
        let once = (game.board().clone(), game.state());
        game.reset();
        let twice = (game.board().clone(), game.state());

        assert_eq!(once, twice);
        assert_eq!(twice, (Board::default(), State::Playing(Symbol::X)));
    }

    #[test]
    fn reset_invalidates_revision() {
        let mut game = Game::new();
        let before = game.revision();
        game.reset();
        assert!(game.revision() > before);
    }
}
