//! The local toppling rule shared by every stabilizer.

use crate::Cell;

/// A cell with at least this many grains is active.
pub const THRESHOLD: Cell = 4;

/// Outcome of toppling one cell as many times as it can at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topple {
	/// Grains left in the cell.
	pub keep: Cell,
	/// Grains sent to each of the four neighbour positions.
	pub distribute: Cell,
}

impl Topple {
	pub fn is_active(&self) -> bool {
		self.distribute > 0
	}
}

#[inline]
pub fn topple(grains: Cell) -> Topple {
	Topple {
		keep: grains % THRESHOLD,
		distribute: grains / THRESHOLD,
	}
}

#[inline]
pub fn is_active(grains: Cell) -> bool {
	grains >= THRESHOLD
}

/// In-bounds von Neumann neighbours of `(i, j)` on a `rows`x`cols` grid.
/// Positions that would fall off the grid are skipped: their share is lost.
pub fn neighbours(i: usize, j: usize, rows: usize, cols: usize) -> impl Iterator<Item = (usize, usize)> {
	let up = if i > 0 { Some((i - 1, j)) } else { None };
	let down = if i + 1 < rows { Some((i + 1, j)) } else { None };
	let left = if j > 0 { Some((i, j - 1)) } else { None };
	let right = if j + 1 < cols { Some((i, j + 1)) } else { None };
	up.into_iter().chain(down).chain(left).chain(right)
}
