use thiserror::Error;

/// Everything that can stop a run. None of these are retried.
#[derive(Error, Debug)]
pub enum SandpileError {
	#[error("Configuration error: {0}")]
	Config(String),

	#[error("Grid of {rows}x{cols} cannot hold {len} cells")]
	Dimensions { rows: usize, cols: usize, len: usize },

	#[error("Grids differ in shape: {left_rows}x{left_cols} against {right_rows}x{right_cols}")]
	ShapeMismatch {
		left_rows: usize,
		left_cols: usize,
		right_rows: usize,
		right_cols: usize,
	},

	#[error("Cell ({row}, {col}) holds {grains} grains, more than a cell can store")]
	Overflow { row: usize, col: usize, grains: u64 },

	#[error("Expected {expected} values, found only {found}")]
	MissingValues { expected: usize, found: usize },

	#[error("Value #{index} is not a grain count: {token:?}")]
	Parse { index: usize, token: String },

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Worker pool error: {0}")]
	ThreadPool(#[from] rayon::ThreadPoolBuildError),

	#[error("Transport error: {0}")]
	Transport(String),

	#[error("Worker {0} died")]
	WorkerPanicked(usize),
}

pub type Result<T> = std::result::Result<T, SandpileError>;

impl SandpileError {
	pub fn config(msg: impl Into<String>) -> Self {
		Self::Config(msg.into())
	}

	pub fn transport(msg: impl Into<String>) -> Self {
		Self::Transport(msg.into())
	}
}
