use std::{
    fmt::Display,
    ops::{Index, Not},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::error::InvalidMoveError;

pub const NUM_TILES: usize = 9;

/// The mark a seat draws on the board. `X` always moves first.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Symbol {
    #[default]
    X,
    O,
}

impl Not for Symbol {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::X => write!(f, "X"),
            Symbol::O => write!(f, "O"),
        }
    }
}

// rank:
// 3: 6 7 8
// 2: 3 4 5
// 1: 0 1 2
//    A B C : file
#[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct TileId(u8);
impl TileId {
    pub const A1: TileId = TileId(0);
    pub const B1: TileId = TileId(1);
    pub const C1: TileId = TileId(2);
    pub const A2: TileId = TileId(3);
    pub const B2: TileId = TileId(4);
    pub const C2: TileId = TileId(5);
    pub const A3: TileId = TileId(6);
    pub const B3: TileId = TileId(7);
    pub const C3: TileId = TileId(8);

    pub const fn new(position: usize) -> Option<Self> {
        if position >= NUM_TILES {
            None
        } else {
            Some(Self(position as u8))
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl FromStr for TileId {
    type Err = ();

    /// Accepts a file/rank name (`b2`) or a raw position (`4`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        match bytes {
            [digit @ b'0'..=b'8'] => TileId::new((digit - b'0') as usize).ok_or(()),
            [file, rank @ b'1'..=b'3'] => {
                let file = match file.to_ascii_lowercase() {
                    b'a' => 0,
                    b'b' => 1,
                    b'c' => 2,
                    _ => return Err(()),
                };
                TileId::new((rank - b'1') as usize * 3 + file).ok_or(())
            }
            _ => Err(()),
        }
    }
}

impl Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let file = (b'A' + self.0 % 3) as char;
        write!(f, "{}{}", file, self.0 / 3 + 1)
    }
}

/// One board square: empty, or held by whoever `T` identifies.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum Cell<T> {
    Empty,
    HeldBy(T),
}

impl<T> Default for Cell<T> {
    fn default() -> Self {
        Cell::Empty
    }
}

impl<T> Cell<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn holder(&self) -> Option<&T> {
        match self {
            Cell::Empty => None,
            Cell::HeldBy(holder) => Some(holder),
        }
    }
}

/// Three positions that win when held by the same mark.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct WinLine([usize; 3]);

impl WinLine {
    /// Rows, then columns, then diagonals.
    pub const ALL: [WinLine; 8] = [
        WinLine([0, 1, 2]),
        WinLine([3, 4, 5]),
        WinLine([6, 7, 8]),
        WinLine([0, 3, 6]),
        WinLine([1, 4, 7]),
        WinLine([2, 5, 8]),
        WinLine([0, 4, 8]),
        WinLine([2, 4, 6]),
    ];

    pub const fn positions(&self) -> [usize; 3] {
        self.0
    }

    pub fn contains(&self, position: usize) -> bool {
        self.0.contains(&position)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum GameResult<T> {
    Ongoing,
    Win { winner: T, line: WinLine },
    Draw,
}

/// A 3x3 grid. The offline game marks cells with [`Symbol`]s, an online
/// game marks them with the id of the player holding the cell.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Board<T = Symbol> {
    tiles: [Cell<T>; NUM_TILES],
}

impl<T> Default for Board<T> {
    fn default() -> Self {
        Self {
            tiles: std::array::from_fn(|_| Cell::Empty),
        }
    }
}

impl<T> Board<T> {
    pub fn get(&self, position: usize) -> Option<&Cell<T>> {
        self.tiles.get(position)
    }

    pub fn cells(&self) -> &[Cell<T>; NUM_TILES] {
        &self.tiles
    }

    pub fn empty_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_empty())
            .map(|(position, _)| position)
    }

    pub fn mark_count(&self) -> usize {
        self.tiles.iter().filter(|cell| !cell.is_empty()).count()
    }

    pub fn is_full(&self) -> bool {
        self.mark_count() == NUM_TILES
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> Board<U> {
        Board {
            tiles: std::array::from_fn(|i| match &self.tiles[i] {
                Cell::Empty => Cell::Empty,
                Cell::HeldBy(holder) => Cell::HeldBy(f(holder)),
            }),
        }
    }
}

impl<T: Clone + PartialEq> Board<T> {
    /// Returns the board with `mark` placed at `position`. `self` is left
    /// untouched whether or not the placement succeeds.
    pub fn place(&self, position: usize, mark: T) -> Result<Self, InvalidMoveError> {
        let tile = TileId::new(position).ok_or(InvalidMoveError::OutOfRange(position))?;
        if !self[tile].is_empty() {
            return Err(InvalidMoveError::Occupied(position));
        }

        let mut next = self.clone();
        next.tiles[tile.index()] = Cell::HeldBy(mark);
        Ok(next)
    }

    pub fn evaluate(&self) -> GameResult<T> {
        for line in WinLine::ALL {
            let [a, b, c] = line.positions();
            if let Cell::HeldBy(holder) = &self.tiles[a] {
                if self.tiles[b] == self.tiles[a] && self.tiles[c] == self.tiles[a] {
                    return GameResult::Win {
                        winner: holder.clone(),
                        line,
                    };
                }
            }
        }

        if self.is_full() {
            GameResult::Draw
        } else {
            GameResult::Ongoing
        }
    }
}

impl<T> Index<TileId> for Board<T> {
    type Output = Cell<T>;

    fn index(&self, tile: TileId) -> &Self::Output {
        &self.tiles[tile.index()]
    }
}

impl<T: Display> Display for Board<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, rank) in self.tiles.chunks_exact(3).enumerate().rev() {
            write!(f, "{}│ ", i + 1)?;
            for tile in rank {
                match tile {
                    Cell::HeldBy(holder) => write!(f, "{holder}")?,
                    Cell::Empty => write!(f, "-")?,
                };
            }

            writeln!(f)?;
        }
        write!(f, " ╰─────\n   ABC")?;
        Ok(())
    }
}
