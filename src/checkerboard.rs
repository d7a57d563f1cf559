//! Shared-memory stabilizer: in-place red-black sweeps on a rayon pool.
//!
//! Cells are split by the parity of `i + j`. Two cells of one colour are
//! never neighbours, so during a phase each active cell is the only writer
//! of its own slot. The slots it feeds belong to the other colour and may
//! be fed by several cells at once, hence the atomic adds.
//!
//! Unlike a synchronous sweep, an in-place sweep can pile four full shares
//! onto a cell that has not toppled yet, so cells are held as `u64` while
//! relaxing. No cell can exceed the grid's total, which fits easily.

use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::topple::{neighbours, THRESHOLD};
use crate::{Cell, Grid, Relaxation, Result, SandpileError, Stabilizer};

const WIDE_THRESHOLD: u64 = THRESHOLD as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
	Red,
	Black,
}

impl Colour {
	fn parity(self) -> usize {
		match self {
			Colour::Red => 0,
			Colour::Black => 1,
		}
	}
}

pub struct CheckerboardStabilizer {
	pool: rayon::ThreadPool,
}

impl CheckerboardStabilizer {
	pub fn new(workers: usize) -> Result<Self> {
		if workers == 0 {
			return Err(SandpileError::config("shared-memory pool needs at least one worker"));
		}
		let pool = rayon::ThreadPoolBuilder::new()
			.num_threads(workers)
			.thread_name(|i| format!("sandpile-{}", i))
			.build()?;
		debug!(workers, "built shared-memory pool");
		Ok(CheckerboardStabilizer { pool })
	}

	pub fn workers(&self) -> usize {
		self.pool.current_num_threads()
	}
}

/// Topples every active cell of one colour; returns the topplings performed.
///
/// Relaxed ordering is enough: the end of the parallel loop joins every
/// worker, which orders these writes before the next phase reads them.
fn phase(cells: &[AtomicU64], rows: usize, cols: usize, colour: Colour) -> u64 {
	(0..rows)
		.into_par_iter()
		.map(|i| {
			let mut count = 0;
			let first = (i + colour.parity()) % 2;
			for j in (first..cols).step_by(2) {
				let cell = &cells[i * cols + j];
				let grains = cell.load(Ordering::Relaxed);
				if grains < WIDE_THRESHOLD {
					continue;
				}
				let share = grains / WIDE_THRESHOLD;
				cell.store(grains % WIDE_THRESHOLD, Ordering::Relaxed);
				count += share;
				for (ni, nj) in neighbours(i, j, rows, cols) {
					cells[ni * cols + nj].fetch_add(share, Ordering::Relaxed);
				}
			}
			count
		})
		.sum()
}

impl Stabilizer for CheckerboardStabilizer {
	fn name(&self) -> &'static str {
		"shared"
	}

	fn stabilize(&self, grid: &mut Grid) -> Result<Relaxation> {
		let (rows, cols) = (grid.rows(), grid.cols());
		let cells: Vec<AtomicU64> = grid.cells().iter().map(|&g| AtomicU64::new(g.into())).collect();

		let report = self.pool.install(|| {
			let mut report = Relaxation::default();
			loop {
				let red = phase(&cells, rows, cols, Colour::Red);
				let black = phase(&cells, rows, cols, Colour::Black);
				report.iterations += 1;
				if red + black == 0 {
					break;
				}
				report.topples += red + black;
				trace!(iteration = report.iterations, red, black, "red-black sweep");
			}
			report
		});

		for (k, (dst, src)) in grid.cells_mut().iter_mut().zip(cells).enumerate() {
			let grains = src.into_inner();
			*dst = Cell::try_from(grains).map_err(|_| SandpileError::Overflow {
				row: k / cols,
				col: k % cols,
				grains,
			})?;
		}
		Ok(report)
	}
}
