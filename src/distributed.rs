//! Distributed stabilizer: row blocks on workers with private memory.
//!
//! Every iteration each worker trades edge rows with its vertical
//! neighbours, relaxes its block against those ghost copies, and then joins
//! a global vote. Nobody leaves the loop until the vote says the whole grid
//! is quiet, so the halo exchange of every iteration is always paired.

use std::thread;

use tracing::{debug, trace, warn};

use crate::partition::{self, RowBlock};
use crate::transport::{ChannelTransport, Tag, Transport};
use crate::{Grid, Relaxation, Result, SandpileError, Stabilizer};

const ROOT: usize = 0;

#[derive(Debug, Clone, Copy)]
pub struct DistributedStabilizer {
	workers: usize,
}

impl DistributedStabilizer {
	pub fn new(workers: usize) -> Result<Self> {
		if workers == 0 {
			return Err(SandpileError::config("distributed run needs at least one worker"));
		}
		Ok(DistributedStabilizer { workers })
	}

	pub fn workers(&self) -> usize {
		self.workers
	}
}

/// Which ghost row a received edge row belongs in.
#[derive(Debug, Clone, Copy)]
enum Ghost {
	Top,
	Bottom,
}

/// Step 1: send our edge rows out, take theirs in as ghosts.
fn exchange_halo<T: Transport>(t: &mut T, block: &mut RowBlock) -> Result<()> {
	let rank = t.rank();
	let above = rank.checked_sub(1);
	let below = if rank + 1 < t.size() { Some(rank + 1) } else { None };

	let mut requests = Vec::with_capacity(4);
	let mut ghosts = Vec::with_capacity(2);
	if let Some(up) = above {
		requests.push(t.isend(up, Tag::EdgeUp, block.first_row())?);
		requests.push(t.irecv(up, Tag::EdgeDown));
		ghosts.push(Ghost::Top);
	}
	if let Some(down) = below {
		requests.push(t.isend(down, Tag::EdgeDown, block.last_row())?);
		requests.push(t.irecv(down, Tag::EdgeUp));
		ghosts.push(Ghost::Bottom);
	}

	let rows = t.wait_all(&requests)?;
	for (ghost, row) in ghosts.into_iter().zip(&rows) {
		match ghost {
			Ghost::Top => block.set_top_ghost(row)?,
			Ghost::Bottom => block.set_bottom_ghost(row)?,
		}
	}
	Ok(())
}

/// The whole life of one worker: receive its rows, iterate to global
/// quiet, hand the rows back. Only `ROOT` passes in and gets back a grid.
pub fn run_worker<T: Transport>(t: &mut T, grid: Option<&Grid>, rows: usize, cols: usize) -> Result<Option<(Grid, Relaxation)>> {
	let ranges = partition::row_ranges(rows, t.size());
	let counts = partition::chunk_counts(&ranges, cols);
	let range = ranges[t.rank()].clone();

	let owned = t.scatter(ROOT, grid.map(Grid::cells), &counts)?;
	let mut block = RowBlock::new(range.start, cols, owned)?;
	debug!(rank = t.rank(), start = block.start(), rows = block.rows(), "worker holds its block");

	let mut iterations = 0;
	let mut topples = 0;
	loop {
		exchange_halo(t, &mut block)?;
		let count = block.relax();
		topples += count;
		iterations += 1;
		trace!(rank = t.rank(), iteration = iterations, topples = count, "local relaxation");
		if !t.all_reduce_or(count > 0)? {
			break;
		}
	}

	let total = t.reduce_sum(ROOT, topples)?;
	let gathered = t.gather(ROOT, block.owned())?;
	match (gathered, total) {
		(Some(cells), Some(topples)) => {
			let grid = Grid::from_cells(rows, cols, cells)?;
			Ok(Some((grid, Relaxation { iterations, topples })))
		}
		_ => Ok(None),
	}
}

impl Stabilizer for DistributedStabilizer {
	fn name(&self) -> &'static str {
		"distributed"
	}

	fn stabilize(&self, grid: &mut Grid) -> Result<Relaxation> {
		let (rows, cols) = (grid.rows(), grid.cols());
		let workers = if self.workers > rows {
			warn!(requested = self.workers, rows, "more workers than rows, using one per row");
			rows
		} else {
			self.workers
		};
		debug!(workers, rows, cols, "starting distributed run");

		let source: &Grid = grid;
		let results: Vec<Result<Option<(Grid, Relaxation)>>> = thread::scope(|s| {
			let handles: Vec<_> = ChannelTransport::mesh(workers)
				.into_iter()
				.map(|mut t| {
					let input = if t.rank() == ROOT { Some(source) } else { None };
					thread::Builder::new()
						.name(format!("sandpile-rank-{}", t.rank()))
						.spawn_scoped(s, move || run_worker(&mut t, input, rows, cols))
				})
				.collect();
			handles
				.into_iter()
				.enumerate()
				.map(|(rank, handle)| match handle {
					Ok(h) => h.join().unwrap_or(Err(SandpileError::WorkerPanicked(rank))),
					Err(e) => Err(SandpileError::Io(e)),
				})
				.collect()
		});

		let mut outcome = None;
		let mut failure = None;
		for (rank, result) in results.into_iter().enumerate() {
			match result {
				Ok(Some(done)) => outcome = Some(done),
				Ok(None) => {}
				Err(e) => {
					debug!(rank, error = %e, "worker failed");
					// Peers of a failed worker only report that it left.
					if failure.is_none() || !matches!(e, SandpileError::Transport(_)) {
						failure = Some(e);
					}
				}
			}
		}
		if let Some(e) = failure {
			return Err(e);
		}
		let (stable, report) = outcome.ok_or_else(|| SandpileError::transport("root worker returned no grid"))?;
		*grid = stable;
		Ok(report)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::SerialStabilizer;

	#[test]
	fn zero_workers_is_a_config_error() {
		assert!(matches!(DistributedStabilizer::new(0), Err(SandpileError::Config(_))));
	}

	#[test]
	fn one_worker_is_the_reference() {
		let mut a = Grid::filled(5, 6, 6).unwrap();
		let mut b = a.clone();
		let ra = DistributedStabilizer::new(1).unwrap().stabilize(&mut a).unwrap();
		let rb = SerialStabilizer::new().stabilize(&mut b).unwrap();
		assert_eq!(a, b);
		assert_eq!(ra, rb);
	}

	#[test]
	fn same_trajectory_as_reference_for_uneven_split() {
		let mut a = Grid::from_cells(7, 3, (0..21).map(|k| (k * 5) % 11).collect()).unwrap();
		let mut b = a.clone();
		let ra = DistributedStabilizer::new(3).unwrap().stabilize(&mut a).unwrap();
		let rb = SerialStabilizer::new().stabilize(&mut b).unwrap();
		assert_eq!(a, b);
		// Global Jacobi steps: iteration counts agree too.
		assert_eq!(ra, rb);
	}

	#[test]
	fn too_many_workers_fall_back_to_one_per_row() {
		let mut g = Grid::from_cells(2, 2, vec![4, 4, 4, 4]).unwrap();
		DistributedStabilizer::new(8).unwrap().stabilize(&mut g).unwrap();
		assert_eq!(g.cells(), &[2, 2, 2, 2]);
	}

	#[test]
	fn halo_pairs_edge_rows() {
		let mut mesh = ChannelTransport::mesh(2);
		let mut lower = mesh.pop().unwrap();
		let mut upper = mesh.pop().unwrap();
		let mut top = RowBlock::new(0, 2, vec![1, 2, 3, 4]).unwrap();
		let mut bottom = RowBlock::new(2, 2, vec![5, 6, 7, 8]).unwrap();
		thread::scope(|s| {
			s.spawn(|| exchange_halo(&mut upper, &mut top).unwrap());
			s.spawn(|| exchange_halo(&mut lower, &mut bottom).unwrap());
		});
		assert_eq!(top.top_ghost(), &[0, 0]);
		assert_eq!(top.bottom_ghost(), &[5, 6]);
		assert_eq!(bottom.top_ghost(), &[3, 4]);
		assert_eq!(bottom.bottom_ghost(), &[0, 0]);
	}
}
