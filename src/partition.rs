//! Row-block decomposition: splitting a grid across workers, putting it back
//! together, and the per-worker block with its two ghost rows.

use std::mem;
use std::ops::Range;

use crate::topple::topple;
use crate::{Cell, Grid, Result, SandpileError};

/// Contiguous row ranges, one per worker, covering `0..rows` in order.
/// The first `rows % workers` ranges get one extra row.
pub fn row_ranges(rows: usize, workers: usize) -> Vec<Range<usize>> {
	let base = rows / workers;
	let extra = rows % workers;
	let mut start = 0;
	(0..workers)
		.map(|w| {
			let len = base + if w < extra { 1 } else { 0 };
			let range = start..start + len;
			start += len;
			range
		})
		.collect()
}

/// Number of cells in each worker's chunk of a flat row-major buffer.
pub fn chunk_counts(ranges: &[Range<usize>], cols: usize) -> Vec<usize> {
	ranges.iter().map(|r| r.len() * cols).collect()
}

/// Cuts a flat buffer into consecutive chunks of the given sizes.
pub fn split(cells: &[Cell], counts: &[usize]) -> Result<Vec<Vec<Cell>>> {
	if counts.iter().sum::<usize>() != cells.len() {
		return Err(SandpileError::Dimensions {
			rows: counts.len(),
			cols: 0,
			len: cells.len(),
		});
	}
	let mut offset = 0;
	Ok(counts
		.iter()
		.map(|&n| {
			let chunk = cells[offset..offset + n].to_vec();
			offset += n;
			chunk
		})
		.collect())
}

/// Concatenates per-worker blocks back into a grid, in partition order.
pub fn join(rows: usize, cols: usize, blocks: Vec<Vec<Cell>>) -> Result<Grid> {
	Grid::from_cells(rows, cols, blocks.into_iter().flatten().collect())
}

/// One worker's rows, padded with a ghost row above and below.
///
/// Row 0 and row `rows + 1` of each buffer are the ghosts. They are read
/// when relaxing and written only by the halo exchange; a side with no
/// neighbour keeps its zero ghost forever.
#[derive(Debug, Clone)]
pub struct RowBlock {
	start: usize,
	rows: usize,
	cols: usize,
	current: Vec<Cell>,
	next: Vec<Cell>,
}

impl RowBlock {
	pub fn new(start: usize, cols: usize, owned: Vec<Cell>) -> Result<RowBlock> {
		if cols == 0 || owned.is_empty() || owned.len() % cols != 0 {
			return Err(SandpileError::Dimensions {
				rows: 0,
				cols,
				len: owned.len(),
			});
		}
		let rows = owned.len() / cols;
		let mut current = vec![0; (rows + 2) * cols];
		current[cols..(rows + 1) * cols].copy_from_slice(&owned);
		Ok(RowBlock {
			start,
			rows,
			cols,
			next: vec![0; current.len()],
			current,
		})
	}

	/// Global index of the first owned row.
	pub fn start(&self) -> usize {
		self.start
	}

	pub fn rows(&self) -> usize {
		self.rows
	}

	pub fn cols(&self) -> usize {
		self.cols
	}

	fn padded_row(&self, i: usize) -> &[Cell] {
		&self.current[i * self.cols..(i + 1) * self.cols]
	}

	pub fn first_row(&self) -> &[Cell] {
		self.padded_row(1)
	}

	pub fn last_row(&self) -> &[Cell] {
		self.padded_row(self.rows)
	}

	pub fn top_ghost(&self) -> &[Cell] {
		self.padded_row(0)
	}

	pub fn bottom_ghost(&self) -> &[Cell] {
		self.padded_row(self.rows + 1)
	}

	fn set_padded_row(&mut self, i: usize, row: &[Cell]) -> Result<()> {
		if row.len() != self.cols {
			return Err(SandpileError::transport(format!(
				"ghost row of {} cells for a block {} wide",
				row.len(),
				self.cols
			)));
		}
		self.current[i * self.cols..(i + 1) * self.cols].copy_from_slice(row);
		Ok(())
	}

	pub fn set_top_ghost(&mut self, row: &[Cell]) -> Result<()> {
		self.set_padded_row(0, row)
	}

	pub fn set_bottom_ghost(&mut self, row: &[Cell]) -> Result<()> {
		let i = self.rows + 1;
		self.set_padded_row(i, row)
	}

	pub fn owned(&self) -> &[Cell] {
		&self.current[self.cols..(self.rows + 1) * self.cols]
	}

	/// One synchronous step over the owned rows, then swaps buffers.
	///
	/// Each owned cell collects its own remainder plus the share of every
	/// neighbour, ghosts included. Shares an owned cell sends into a ghost
	/// row are not kept here: the neighbour that owns that row collects
	/// them itself from its own ghost copy of our edge row.
	/// Returns the topplings of owned cells.
	pub fn relax(&mut self) -> u64 {
		let cols = self.cols;
		let cur = &self.current;
		let share = |i: usize, j: usize| topple(cur[i * cols + j]).distribute;
		let mut count = 0;
		for i in 1..=self.rows {
			for j in 0..cols {
				let t = topple(cur[i * cols + j]);
				count += t.distribute as u64;
				let mut g = t.keep + share(i - 1, j) + share(i + 1, j);
				if j > 0 {
					g += share(i, j - 1);
				}
				if j + 1 < cols {
					g += share(i, j + 1);
				}
				self.next[i * cols + j] = g;
			}
		}
		mem::swap(&mut self.current, &mut self.next);
		count
	}
}
