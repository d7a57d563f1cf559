//! Command line and environment configuration for the `sandpile` binary.

use std::env;
use std::path::PathBuf;

use tracing::Level;

use crate::{Cell, Result, SandpileError};

const DEFAULT_DISTRIBUTED_WORKERS: usize = 4;

const USAGE: &str = "\
Usage:
  sandpile <scheme> N M <input> <image.png> [ascii]
  sandpile compare <reference.txt> <candidate.txt>
where <scheme> is 'serial', 'shared', 'shared-K', 'distributed', or 'distributed-K' (K workers)
and <input> is a text file whose name contains 'input', or 'all-V' for a grid filled with V.
Example (with cargo, use 'cargo run --release --' instead of 'sandpile'):
sandpile shared-8 512 512 input_512.txt out/512.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
	Serial,
	Shared(usize),
	Distributed(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
	File(PathBuf),
	All(Cell),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
	pub scheme: Scheme,
	pub rows: usize,
	pub cols: usize,
	pub source: Source,
	pub image: PathBuf,
	pub ascii: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
	Run(Run),
	Compare { reference: PathBuf, candidate: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	pub command: Command,
	pub log_level: Level,
}

impl Config {
	/// Parses the process arguments (program name first) with the
	/// `SANDPILE_WORKERS` and `SANDPILE_LOG` environment variables.
	pub fn new(args: &mut dyn Iterator<Item = String>) -> Result<Config> {
		Config::parse(args, &|key| env::var(key).ok())
	}

	pub fn parse(args: &mut dyn Iterator<Item = String>, env: &dyn Fn(&str) -> Option<String>) -> Result<Config> {
		args.next();
		let log_level = match env("SANDPILE_LOG") {
			Some(level) => level
				.parse::<Level>()
				.map_err(|_| SandpileError::config(format!("SANDPILE_LOG must be a log level, got: {}", level)))?,
			None => Level::INFO,
		};
		let env_workers = match env("SANDPILE_WORKERS") {
			Some(s) => Some(parse_workers(&s)?),
			None => None,
		};

		let first = args.next().ok_or_else(|| usage("Please specify a scheme or 'compare' as the 1st command line argument."))?;
		if first == "compare" {
			let reference = args.next().ok_or_else(|| usage("Please specify the reference grid file."))?;
			let candidate = args.next().ok_or_else(|| usage("Please specify the grid file to compare."))?;
			return Ok(Config {
				command: Command::Compare {
					reference: reference.into(),
					candidate: candidate.into(),
				},
				log_level,
			});
		}

		let scheme = match first.as_str() {
			"serial" => Scheme::Serial,
			"shared" => Scheme::Shared(env_workers.unwrap_or_else(rayon::current_num_threads)),
			"distributed" => Scheme::Distributed(env_workers.unwrap_or(DEFAULT_DISTRIBUTED_WORKERS)),
			s if s.starts_with("shared-") => Scheme::Shared(parse_workers(&s[7..])?),
			s if s.starts_with("distributed-") => Scheme::Distributed(parse_workers(&s[12..])?),
			s => return Err(usage(&format!("Unknown scheme: {}", s))),
		};

		let rows = parse_dimension(args.next(), "N")?;
		let cols = parse_dimension(args.next(), "M")?;
		let source = match args.next() {
			Some(s) if s.starts_with("all-") => match s[4..].parse::<Cell>() {
				Ok(v) => Source::All(v),
				Err(_) => return Err(SandpileError::config("In input 'all-V', V must be a 32-bit number.")),
			},
			Some(s) => Source::File(s.into()),
			None => return Err(usage("Please specify the input grid file.")),
		};
		let image: PathBuf = args
			.next()
			.ok_or_else(|| usage("Please specify name for output png file."))?
			.into();
		let ascii = match args.next() {
			None => false,
			Some(ref s) if s == "ascii" => true,
			Some(s) => return Err(usage(&format!("Unexpected argument: {}", s))),
		};
		if let Some(extra) = args.next() {
			return Err(usage(&format!("Unexpected argument: {}", extra)));
		}

		Ok(Config {
			command: Command::Run(Run {
				scheme,
				rows,
				cols,
				source,
				image,
				ascii,
			}),
			log_level,
		})
	}
}

fn usage(msg: &str) -> SandpileError {
	SandpileError::config(format!("{}\n{}", msg, USAGE))
}

fn parse_workers(s: &str) -> Result<usize> {
	match s.parse::<usize>() {
		Ok(k) if k > 0 => Ok(k),
		_ => Err(SandpileError::config(format!("Worker count must be a positive number, got: {}", s))),
	}
}

fn parse_dimension(arg: Option<String>, name: &str) -> Result<usize> {
	let s = arg.ok_or_else(|| usage(&format!("Please specify grid size {}.", name)))?;
	match s.parse::<usize>() {
		Ok(n) if n > 0 => Ok(n),
		_ => Err(SandpileError::config(format!("{} must be a positive number, got: {}", name, s))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(line: &str, env: &[(&str, &str)]) -> Result<Config> {
		let mut args = line.split_whitespace().map(String::from);
		let lookup = |key: &str| env.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string());
		Config::parse(&mut args, &lookup)
	}

	#[test]
	fn positional_run() {
		let c = parse("sandpile shared-8 3 5 input_3.txt out.png ascii", &[]).unwrap();
		assert_eq!(c.log_level, Level::INFO);
		assert_eq!(
			c.command,
			Command::Run(Run {
				scheme: Scheme::Shared(8),
				rows: 3,
				cols: 5,
				source: Source::File("input_3.txt".into()),
				image: "out.png".into(),
				ascii: true,
			})
		);
	}

	#[test]
	fn generated_source_and_env_workers() {
		let c = parse("sandpile distributed 10 10 all-4 out.png", &[("SANDPILE_WORKERS", "3"), ("SANDPILE_LOG", "debug")]).unwrap();
		assert_eq!(c.log_level, Level::DEBUG);
		match c.command {
			Command::Run(run) => {
				assert_eq!(run.scheme, Scheme::Distributed(3));
				assert_eq!(run.source, Source::All(4));
				assert!(!run.ascii);
			}
			other => panic!("expected a run, got {:?}", other),
		}
	}

	#[test]
	fn compare_command() {
		let c = parse("sandpile compare a.txt b.txt", &[]).unwrap();
		assert_eq!(
			c.command,
			Command::Compare {
				reference: "a.txt".into(),
				candidate: "b.txt".into(),
			}
		);
	}

	#[test]
	fn bad_arguments() {
		assert!(parse("sandpile", &[]).is_err());
		assert!(parse("sandpile torus 3 3 input.txt a.png", &[]).is_err());
		assert!(parse("sandpile shared-0 3 3 input.txt a.png", &[]).is_err());
		assert!(parse("sandpile serial 0 3 input.txt a.png", &[]).is_err());
		assert!(parse("sandpile serial 3 3 all-x a.png", &[]).is_err());
		assert!(parse("sandpile serial 3 3 input.txt", &[]).is_err());
		assert!(parse("sandpile serial 3 3 input.txt a.png png", &[]).is_err());
		assert!(parse("sandpile serial 3 3 input.txt a.png", &[("SANDPILE_LOG", "loud")]).is_err());
	}
}
