//! Abelian sandpile stabilization on a finite grid with absorbing edges.
//!
//! Three interchangeable schemes relax a [`Grid`] to its stable configuration:
//! a sequential reference sweep, a shared-memory red-black sweep on a rayon
//! pool, and a row-block decomposition whose workers talk only through
//! message passing. All of them reach the same stable grid.

use std::fmt;

pub mod checkerboard;
pub mod config;
pub mod distributed;
pub mod error;
pub mod io;
pub mod partition;
pub mod serial;
pub mod topple;
pub mod transport;

pub use checkerboard::CheckerboardStabilizer;
pub use distributed::DistributedStabilizer;
pub use error::{Result, SandpileError};
pub use serial::SerialStabilizer;

/// Grain count of a single cell.
pub type Cell = u32;

/// Summary of one `stabilize` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Relaxation {
	/// Sweeps performed, the final quiet one included.
	pub iterations: u64,
	/// Single topplings performed in total.
	pub topples: u64,
}

/// A scheme that relaxes a grid in place until no cell is active.
pub trait Stabilizer {
	fn name(&self) -> &'static str;
	fn stabilize(&self, grid: &mut Grid) -> Result<Relaxation>;
}

/// Rectangular grid of grain counts, stored row-major in one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
	rows: usize,
	cols: usize,
	cells: Vec<Cell>,
}

impl Grid {
	pub fn new(rows: usize, cols: usize) -> Result<Grid> {
		Grid::filled(rows, cols, 0)
	}

	pub fn filled(rows: usize, cols: usize, value: Cell) -> Result<Grid> {
		let len = area(rows, cols).ok_or(SandpileError::Dimensions { rows, cols, len: 0 })?;
		Ok(Grid {
			rows,
			cols,
			cells: vec![value; len],
		})
	}

	pub fn from_cells(rows: usize, cols: usize, cells: Vec<Cell>) -> Result<Grid> {
		if area(rows, cols) != Some(cells.len()) {
			return Err(SandpileError::Dimensions { rows, cols, len: cells.len() });
		}
		Ok(Grid { rows, cols, cells })
	}

	pub fn from_rows(rows: Vec<Vec<Cell>>) -> Result<Grid> {
		let n = rows.len();
		let m = rows.first().map_or(0, Vec::len);
		if rows.iter().any(|row| row.len() != m) {
			return Err(SandpileError::Dimensions {
				rows: n,
				cols: m,
				len: rows.iter().map(Vec::len).sum(),
			});
		}
		Grid::from_cells(n, m, rows.into_iter().flatten().collect())
	}

	pub fn rows(&self) -> usize {
		self.rows
	}

	pub fn cols(&self) -> usize {
		self.cols
	}

	#[inline]
	pub fn index(&self, i: usize, j: usize) -> usize {
		i * self.cols + j
	}

	pub fn get(&self, i: usize, j: usize) -> Option<Cell> {
		if i < self.rows && j < self.cols {
			Some(self.cells[self.index(i, j)])
		} else {
			None
		}
	}

	pub fn set(&mut self, i: usize, j: usize, value: Cell) {
		let idx = self.index(i, j);
		self.cells[idx] = value;
	}

	pub fn row(&self, i: usize) -> &[Cell] {
		&self.cells[i * self.cols..(i + 1) * self.cols]
	}

	pub fn cells(&self) -> &[Cell] {
		&self.cells
	}

	pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
		&mut self.cells
	}

	pub fn total_grains(&self) -> u64 {
		self.cells.iter().map(|&c| c as u64).sum()
	}

	pub fn active_cells(&self) -> usize {
		self.cells.iter().filter(|&&c| topple::is_active(c)).count()
	}

	pub fn is_stable(&self) -> bool {
		self.cells.iter().all(|&c| !topple::is_active(c))
	}

	/// Positions where `self` and `other` differ. Grids must share a shape.
	pub fn mismatches(&self, other: &Grid) -> Result<Vec<(usize, usize)>> {
		if self.rows != other.rows || self.cols != other.cols {
			return Err(SandpileError::ShapeMismatch {
				left_rows: self.rows,
				left_cols: self.cols,
				right_rows: other.rows,
				right_cols: other.cols,
			});
		}
		Ok(self
			.cells
			.iter()
			.zip(&other.cells)
			.enumerate()
			.filter(|(_, (a, b))| a != b)
			.map(|(k, _)| (k / self.cols, k % self.cols))
			.collect())
	}
}

/// Number of cells of a `rows`x`cols` grid; `None` when empty or too large to index.
pub fn area(rows: usize, cols: usize) -> Option<usize> {
	match rows.checked_mul(cols) {
		Some(0) | None => None,
		n => n,
	}
}

impl fmt::Display for Grid {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let vis = [" ", ".", ":", "&"];
		let mut s = String::with_capacity((self.cols + 1) * self.rows);
		for i in 0..self.rows {
			for &el in self.row(i) {
				s += vis.get(el as usize).copied().unwrap_or("#");
			}
			s += "\n";
		}
		write!(f, "{}", s)
	}
}
