use sandpile_relax::{
	config::{Command, Config, Run, Scheme, Source},
	io as grid_io,
	CheckerboardStabilizer,
	DistributedStabilizer,
	Grid,
	Result,
	SerialStabilizer,
	Stabilizer,
};

use std::{
	io::{self, Write},
	path::{Path, PathBuf},
	process,
	time::Instant,
};

use tracing::{error, info};

fn main() {
	let config = match Config::new(&mut std::env::args()) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("{}", e);
			process::exit(2)
		}
	};
	tracing_subscriber::fmt()
		.with_max_level(config.log_level)
		.with_writer(io::stderr)
		.init();

	let outcome = match config.command {
		Command::Run(run) => simulate(&run).map(|()| true),
		Command::Compare { reference, candidate } => compare(&reference, &candidate),
	};
	match outcome {
		Ok(true) => {}
		Ok(false) => process::exit(1),
		Err(e) => {
			error!("{}", e);
			process::exit(1)
		}
	}
}

fn stabilizer(scheme: Scheme) -> Result<Box<dyn Stabilizer>> {
	Ok(match scheme {
		Scheme::Serial => Box::new(SerialStabilizer::new()),
		Scheme::Shared(workers) => {
			let s = CheckerboardStabilizer::new(workers)?;
			info!(workers = s.workers(), "shared-memory pool ready");
			Box::new(s)
		}
		Scheme::Distributed(workers) => {
			let s = DistributedStabilizer::new(workers)?;
			info!(workers = s.workers(), "distributed workers requested");
			Box::new(s)
		}
	})
}

fn simulate(run: &Run) -> Result<()> {
	let text_out = match &run.source {
		Source::File(input) => grid_io::output_filename(input)?,
		Source::All(v) => PathBuf::from(format!("output_all-{}.txt", v)),
	};
	let stabilizer = stabilizer(run.scheme)?;
	let mut grid = match &run.source {
		Source::File(input) => grid_io::load_grid(input, run.rows, run.cols)?,
		Source::All(v) => Grid::filled(run.rows, run.cols, *v)?,
	};
	info!(
		rows = run.rows,
		cols = run.cols,
		grains = grid.total_grains(),
		active = grid.active_cells(),
		"grid loaded"
	);

	let start = Instant::now();
	let report = stabilizer.stabilize(&mut grid)?;
	let elapsed = start.elapsed();
	info!(
		scheme = stabilizer.name(),
		iterations = report.iterations,
		topples = report.topples,
		grains = grid.total_grains(),
		"{} time: {:.6} seconds",
		stabilizer.name(),
		elapsed.as_secs_f64()
	);

	grid_io::save_grid(&text_out, &grid)?;
	info!(path = %text_out.display(), "stable grid written");
	grid_io::png(&grid, &run.image)?;
	info!(path = %run.image.display(), "image written");
	if run.ascii {
		let stdout = io::stdout();
		let mut out = stdout.lock();
		write!(out, "{}", grid)?;
	}
	Ok(())
}

fn compare(reference: &Path, candidate: &Path) -> Result<bool> {
	let a = grid_io::load_grid_lines(reference)?;
	let b = grid_io::load_grid_lines(candidate)?;
	println!("Comparing '{}'  vs  '{}'", reference.display(), candidate.display());
	let bad = a.mismatches(&b)?;
	let size = a.cells().len();
	println!("Shapes match: ({}, {})", a.rows(), a.cols());
	println!(
		"cells equal = {} / {} ({:.2} % match)",
		size - bad.len(),
		size,
		100.0 * (size - bad.len()) as f64 / size as f64
	);
	if !bad.is_empty() {
		println!("first differing indices (row, col):");
		for &(i, j) in bad.iter().take(5) {
			println!("    ({}, {}) : reference={}  candidate={}", i, j, a.row(i)[j], b.row(i)[j]);
		}
	}
	Ok(bad.is_empty())
}
