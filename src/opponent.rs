//! Computer opponent for offline play.

use rand::{seq::IteratorRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::board::{Board, Cell, Symbol, WinLine};

const CENTER: usize = 4;
const CORNERS: [usize; 4] = [0, 2, 6, 8];

#[derive(
    Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Difficulty {
    /// Any empty tile.
    Easy,
    /// A coin flip between easy and hard on every move.
    #[default]
    Medium,
    /// Win, else block, else center, else a corner, else anything.
    Hard,
}

impl Difficulty {
    /// Picks a tile for `me` to mark. Returns `None` only when the board is full.
    pub fn choose_move<R: Rng + ?Sized>(
        self,
        board: &Board,
        me: Symbol,
        rng: &mut R,
    ) -> Option<usize> {
        match self {
            Difficulty::Easy => random_move(board, rng),
            Difficulty::Medium if rng.gen_bool(0.5) => heuristic_move(board, me),
            Difficulty::Medium => random_move(board, rng),
            Difficulty::Hard => heuristic_move(board, me),
        }
    }
}

pub fn choose_move<R: Rng + ?Sized>(
    board: &Board,
    me: Symbol,
    difficulty: Difficulty,
    rng: &mut R,
) -> Option<usize> {
    difficulty.choose_move(board, me, rng)
}

fn random_move<R: Rng + ?Sized>(board: &Board, rng: &mut R) -> Option<usize> {
    board.empty_positions().choose(rng)
}

// Greedy and one ply deep: it can still be forked.
fn heuristic_move(board: &Board, me: Symbol) -> Option<usize> {
    completing_tile(board, me)
        .or_else(|| completing_tile(board, !me))
        .or_else(|| board.get(CENTER).filter(|c| c.is_empty()).map(|_| CENTER))
        .or_else(|| {
            CORNERS
                .into_iter()
                .find(|&p| board.get(p).is_some_and(Cell::is_empty))
        })
        .or_else(|| board.empty_positions().next())
}

/// First empty tile, in [`WinLine::ALL`] order, that would give `who` three in a row.
fn completing_tile(board: &Board, who: Symbol) -> Option<usize> {
    WinLine::ALL.iter().find_map(|line| {
        let mut held = 0;
        let mut empty = None;
        for position in line.positions() {
            match board.get(position)? {
                Cell::HeldBy(holder) if *holder == who => held += 1,
                Cell::HeldBy(_) => return None,
                Cell::Empty => empty = Some(position),
            }
        }
        if held == 2 {
            empty
        } else {
            None
        }
    })
}
