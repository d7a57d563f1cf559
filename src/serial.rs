//! Sequential reference: synchronous sweeps over two swapped buffers.

use std::mem;

use tracing::trace;

use crate::topple::{neighbours, topple};
use crate::{Cell, Grid, Relaxation, Result, Stabilizer};

#[derive(Debug, Clone, Copy, Default)]
pub struct SerialStabilizer;

impl SerialStabilizer {
	pub fn new() -> SerialStabilizer {
		SerialStabilizer
	}
}

/// Computes `next` from `current` in one synchronous step.
/// Returns the number of topplings, zero when `current` was already stable.
pub(crate) fn sweep(current: &[Cell], next: &mut [Cell], rows: usize, cols: usize) -> u64 {
	for el in next.iter_mut() {
		*el = 0;
	}
	let mut count = 0;
	for i in 0..rows {
		for j in 0..cols {
			let t = topple(current[i * cols + j]);
			next[i * cols + j] += t.keep;
			if t.is_active() {
				count += t.distribute as u64;
				for (ni, nj) in neighbours(i, j, rows, cols) {
					next[ni * cols + nj] += t.distribute;
				}
			}
		}
	}
	count
}

impl Stabilizer for SerialStabilizer {
	fn name(&self) -> &'static str {
		"serial"
	}

	fn stabilize(&self, grid: &mut Grid) -> Result<Relaxation> {
		let (rows, cols) = (grid.rows(), grid.cols());
		let mut current = grid.cells().to_vec();
		let mut next = vec![0; current.len()];
		let mut report = Relaxation::default();
		loop {
			let count = sweep(&current, &mut next, rows, cols);
			report.iterations += 1;
			if count == 0 {
				break;
			}
			report.topples += count;
			mem::swap(&mut current, &mut next);
			trace!(iteration = report.iterations, topples = count, "serial sweep");
		}
		grid.cells_mut().copy_from_slice(&current);
		Ok(report)
	}
}
