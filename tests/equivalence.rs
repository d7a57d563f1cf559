use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sandpile_relax::{
	Cell, CheckerboardStabilizer, DistributedStabilizer, Grid, Relaxation, SandpileError, SerialStabilizer,
	Stabilizer,
};

fn random_grid(rows: usize, cols: usize, max: u32, seed: u64) -> Grid {
	let mut rng = StdRng::seed_from_u64(seed);
	let cells = (0..rows * cols).map(|_| rng.gen_range(0..=max)).collect();
	Grid::from_cells(rows, cols, cells).unwrap()
}

fn all_schemes() -> Vec<Box<dyn Stabilizer>> {
	vec![
		Box::new(SerialStabilizer::new()),
		Box::new(CheckerboardStabilizer::new(1).unwrap()),
		Box::new(CheckerboardStabilizer::new(4).unwrap()),
		Box::new(DistributedStabilizer::new(1).unwrap()),
		Box::new(DistributedStabilizer::new(3).unwrap()),
		Box::new(DistributedStabilizer::new(4).unwrap()),
	]
}

fn stabilized(s: &dyn Stabilizer, grid: &Grid) -> (Grid, Relaxation) {
	let mut g = grid.clone();
	let report = s.stabilize(&mut g).unwrap();
	(g, report)
}

#[test]
fn every_scheme_ends_stable_and_identical() {
	for (seed, &(rows, cols, max)) in [(9, 7, 12), (16, 16, 30), (1, 20, 50), (20, 1, 50), (13, 11, 7)].iter().enumerate() {
		let input = random_grid(rows, cols, max, seed as u64);
		let (reference, expected) = stabilized(&SerialStabilizer::new(), &input);
		assert!(reference.is_stable());
		for s in all_schemes() {
			let (out, report) = stabilized(s.as_ref(), &input);
			assert!(out.is_stable(), "{} left active cells", s.name());
			assert_eq!(out, reference, "{} disagrees on {}x{}", s.name(), rows, cols);
			assert_eq!(report.topples, expected.topples, "{} toppled a different number of times", s.name());
		}
	}
}

#[test]
fn partition_invariance_for_ten_rows() {
	let input = random_grid(10, 6, 40, 10);
	let (reference, _) = stabilized(&SerialStabilizer::new(), &input);
	for &workers in &[1, 2, 3, 4, 10] {
		let (out, _) = stabilized(&DistributedStabilizer::new(workers).unwrap(), &input);
		assert_eq!(out, reference, "{} workers", workers);
	}
}

#[test]
fn stable_grid_is_left_alone() {
	let input = random_grid(8, 9, 3, 77);
	assert!(input.is_stable());
	for s in all_schemes() {
		let (out, report) = stabilized(s.as_ref(), &input);
		assert_eq!(out, input, "{} changed a stable grid", s.name());
		assert_eq!(report.topples, 0);
		assert_eq!(report.iterations, 1);
	}
}

#[test]
fn corner_loses_grains_over_the_edge() {
	let mut input = Grid::new(3, 3).unwrap();
	input.set(0, 0, 4);
	for s in all_schemes() {
		let (out, report) = stabilized(s.as_ref(), &input);
		assert_eq!(out.get(0, 0), Some(0));
		assert_eq!(out.get(0, 1), Some(1));
		assert_eq!(out.get(1, 0), Some(1));
		assert_eq!(out.total_grains(), 2);
		assert!(out.total_grains() < input.total_grains());
		assert_eq!(report.topples, 1);
	}
}

#[test]
fn centre_grain_spreads_without_loss() {
	let mut input = Grid::new(3, 3).unwrap();
	input.set(1, 1, 4);
	let expected = Grid::from_rows(vec![vec![0, 1, 0], vec![1, 0, 1], vec![0, 1, 0]]).unwrap();
	for s in all_schemes() {
		let (out, _) = stabilized(s.as_ref(), &input);
		assert_eq!(out, expected, "{}", s.name());
		assert_eq!(out.total_grains(), 4);
	}
}

#[test]
fn single_cell_keeps_remainder() {
	let input = Grid::from_cells(1, 1, vec![10]).unwrap();
	for s in all_schemes() {
		let (out, report) = stabilized(s.as_ref(), &input);
		assert_eq!(out.cells(), &[2], "{}", s.name());
		assert_eq!(report.topples, 2);
	}
}

#[test]
fn uniform_four_grid_terminates() {
	// The generator's default input, scaled down.
	let input = Grid::filled(24, 24, 4).unwrap();
	let grains = input.total_grains();
	let (reference, _) = stabilized(&SerialStabilizer::new(), &input);
	for s in all_schemes() {
		let (out, report) = stabilized(s.as_ref(), &input);
		assert_eq!(out, reference, "{}", s.name());
		// Every sweep but the last topples at least once.
		assert!(report.iterations <= report.topples + 1);
		assert!(out.total_grains() <= grains);
	}
}

#[test]
fn cells_near_the_limit_agree_across_schemes() {
	let mut rng = StdRng::seed_from_u64(2024);
	let inputs = vec![
		Grid::from_cells(1, 2, vec![Cell::MAX, Cell::MAX]).unwrap(),
		Grid::filled(3, 3, Cell::MAX).unwrap(),
		Grid::from_cells(4, 3, (0..12).map(|_| rng.gen_range(Cell::MAX - 1000..=Cell::MAX)).collect()).unwrap(),
	];
	for input in inputs {
		let (reference, expected) = stabilized(&SerialStabilizer::new(), &input);
		assert!(reference.is_stable());
		for s in all_schemes() {
			let (out, report) = stabilized(s.as_ref(), &input);
			assert_eq!(out, reference, "{} on {}x{}", s.name(), input.rows(), input.cols());
			assert_eq!(report.topples, expected.topples, "{}", s.name());
		}
	}
}

#[test]
fn oversized_dimensions_are_rejected() {
	assert!(matches!(Grid::filled(usize::MAX, 2, 0), Err(SandpileError::Dimensions { .. })));
	assert!(matches!(Grid::filled(2, usize::MAX / 2 + 1, 1), Err(SandpileError::Dimensions { .. })));
}
