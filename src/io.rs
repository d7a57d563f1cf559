//! Text and image adapters around the stabilizers.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::{Cell, Grid, Result, SandpileError};

const INPUT_PREFIX: &str = "input";
const OUTPUT_PREFIX: &str = "output";

/// Reads the first `rows * cols` whitespace-separated counts, row-major.
/// Anything after them is ignored.
pub fn read_grid<R: Read>(mut reader: R, rows: usize, cols: usize) -> Result<Grid> {
	let mut text = String::new();
	reader.read_to_string(&mut text)?;
	let expected = crate::area(rows, cols).ok_or(SandpileError::Dimensions { rows, cols, len: 0 })?;
	let mut cells = Vec::new();
	for (index, token) in text.split_whitespace().take(expected).enumerate() {
		cells.push(parse_cell(index, token)?);
	}
	if cells.len() < expected {
		return Err(SandpileError::MissingValues {
			expected,
			found: cells.len(),
		});
	}
	Grid::from_cells(rows, cols, cells)
}

pub fn load_grid<P: AsRef<Path>>(path: P, rows: usize, cols: usize) -> Result<Grid> {
	read_grid(BufReader::new(File::open(path)?), rows, cols)
}

/// Reads a grid whose shape is given by its lines, as written by `write_grid`.
pub fn read_grid_lines<R: BufRead>(reader: R) -> Result<Grid> {
	let mut rows = Vec::new();
	let mut index = 0;
	for line in reader.lines() {
		let line = line?;
		if line.trim().is_empty() {
			continue;
		}
		let mut row = Vec::new();
		for token in line.split_whitespace() {
			row.push(parse_cell(index, token)?);
			index += 1;
		}
		rows.push(row);
	}
	Grid::from_rows(rows)
}

pub fn load_grid_lines<P: AsRef<Path>>(path: P) -> Result<Grid> {
	read_grid_lines(BufReader::new(File::open(path)?))
}

fn parse_cell(index: usize, token: &str) -> Result<Cell> {
	token.parse::<Cell>().map_err(|_| SandpileError::Parse {
		index,
		token: token.to_owned(),
	})
}

/// One line per row, counts separated by single spaces.
pub fn write_grid<W: Write>(mut w: W, grid: &Grid) -> io::Result<()> {
	for i in 0..grid.rows() {
		let mut first = true;
		for el in grid.row(i) {
			if !first {
				w.write_all(b" ")?;
			}
			write!(w, "{}", el)?;
			first = false;
		}
		w.write_all(b"\n")?;
	}
	w.flush()
}

pub fn save_grid<P: AsRef<Path>>(path: P, grid: &Grid) -> Result<()> {
	write_grid(BufWriter::new(File::create(path)?), grid)?;
	Ok(())
}

/// `data/input_64.txt` becomes `data/output_64.txt`: the file name is kept
/// from its first `input` on, with that word swapped for `output`.
pub fn output_filename<P: AsRef<Path>>(input: P) -> Result<PathBuf> {
	let input = input.as_ref();
	let name = input
		.file_name()
		.and_then(|n| n.to_str())
		.ok_or_else(|| SandpileError::config(format!("{} has no file name", input.display())))?;
	let at = name.find(INPUT_PREFIX).ok_or_else(|| {
		SandpileError::config(format!("Input file name must contain '{}': {}", INPUT_PREFIX, name))
	})?;
	let renamed = format!("{}{}", OUTPUT_PREFIX, &name[at + INPUT_PREFIX.len()..]);
	Ok(input.with_file_name(renamed))
}

const COLOURS: [[u8; 4]; 5] = [
	[0, 0, 0, 255],
	[0, 255, 0, 255],
	[0, 0, 255, 255],
	[255, 0, 0, 255],
	// An unstable cell; should never show up in a finished run.
	[255, 255, 255, 255],
];

fn colour(el: Cell) -> &'static [u8; 4] {
	&COLOURS[(el as usize).min(COLOURS.len() - 1)]
}

/// RGBA pixels, one per cell, `cols` wide and `rows` high.
pub fn pixels(grid: &Grid) -> Vec<u8> {
	let mut pixels = vec![0; grid.cells().len() * 4];
	for (p, &el) in pixels.chunks_exact_mut(4).zip(grid.cells()) {
		p.copy_from_slice(colour(el));
	}
	pixels
}

pub fn write_png<W: Write>(w: W, grid: &Grid) -> io::Result<()> {
	repng::encode(w, grid.cols() as u32, grid.rows() as u32, &pixels(grid))
}

pub fn png<P: AsRef<Path>>(grid: &Grid, fname: P) -> Result<()> {
	write_png(BufWriter::new(File::create(fname)?), grid)?;
	Ok(())
}
