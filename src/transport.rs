//! Message passing between distributed workers.
//!
//! [`Transport`] is everything the row-block protocol needs from a
//! communicator: tagged point-to-point rows, a wait on a set of transfers,
//! a logical-OR all-reduce, and uneven scatter/gather. [`ChannelTransport`]
//! implements it with one mpsc channel per ordered pair of workers, so a
//! worker that dies closes exactly the channels that lead out of it and its
//! peers see a receive error instead of waiting forever.

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender};

use tracing::trace;

use crate::{Cell, Result, SandpileError};

/// Identifies what a message is for, so receives match the right send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
	/// A worker's first row, travelling to the worker above.
	EdgeUp,
	/// A worker's last row, travelling to the worker below.
	EdgeDown,
	Vote,
	Verdict,
	Scatter,
	Gather,
	Count,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
	Cells(Vec<Cell>),
	Flag(bool),
	Count(u64),
}

#[derive(Debug)]
struct Envelope {
	tag: Tag,
	payload: Payload,
}

/// A transfer started by `isend` or `irecv`, completed by `wait_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
	Send,
	Receive { source: usize, tag: Tag },
}

pub trait Transport {
	fn rank(&self) -> usize;
	fn size(&self) -> usize;

	/// Starts sending `row` to `dest`. Never blocks.
	fn isend(&mut self, dest: usize, tag: Tag, row: &[Cell]) -> Result<Request>;

	/// Announces a receive of one row from `source`.
	fn irecv(&mut self, source: usize, tag: Tag) -> Request;

	/// Blocks until every request is complete. Returns the received rows
	/// in the order their receive requests appear in `requests`.
	fn wait_all(&mut self, requests: &[Request]) -> Result<Vec<Vec<Cell>>>;

	/// Logical OR of every worker's `flag`, identical on all workers.
	fn all_reduce_or(&mut self, flag: bool) -> Result<bool>;

	/// Sum of every worker's `value`, known only to `root`.
	fn reduce_sum(&mut self, root: usize, value: u64) -> Result<Option<u64>>;

	/// `root` passes the whole buffer; every worker gets its chunk of `counts[rank]` cells.
	fn scatter(&mut self, root: usize, data: Option<&[Cell]>, counts: &[usize]) -> Result<Vec<Cell>>;

	/// Inverse of `scatter`: `root` gets all chunks concatenated in rank order.
	fn gather(&mut self, root: usize, local: &[Cell]) -> Result<Option<Vec<Cell>>>;
}

/// One worker's end of a fully connected channel mesh.
pub struct ChannelTransport {
	rank: usize,
	size: usize,
	outgoing: Vec<Option<Sender<Envelope>>>,
	incoming: Vec<Option<Receiver<Envelope>>>,
	/// Messages that arrived ahead of the receive asking for them, per source.
	pending: Vec<VecDeque<Envelope>>,
}

impl ChannelTransport {
	/// Connects `size` workers pairwise and returns their endpoints in rank order.
	pub fn mesh(size: usize) -> Vec<ChannelTransport> {
		let mut endpoints: Vec<ChannelTransport> = (0..size)
			.map(|rank| ChannelTransport {
				rank,
				size,
				outgoing: (0..size).map(|_| None).collect(),
				incoming: (0..size).map(|_| None).collect(),
				pending: (0..size).map(|_| VecDeque::new()).collect(),
			})
			.collect();
		for from in 0..size {
			for to in 0..size {
				if from == to {
					continue;
				}
				let (tx, rx) = channel();
				endpoints[from].outgoing[to] = Some(tx);
				endpoints[to].incoming[from] = Some(rx);
			}
		}
		endpoints
	}

	fn post(&self, dest: usize, tag: Tag, payload: Payload) -> Result<()> {
		let tx = self
			.outgoing
			.get(dest)
			.and_then(Option::as_ref)
			.ok_or_else(|| SandpileError::transport(format!("worker {} has no route to {}", self.rank, dest)))?;
		tx.send(Envelope { tag, payload })
			.map_err(|_| SandpileError::transport(format!("worker {} is gone ({:?} from {})", dest, tag, self.rank)))
	}

	fn take(&mut self, source: usize, tag: Tag) -> Result<Payload> {
		let queue = self
			.pending
			.get_mut(source)
			.ok_or_else(|| SandpileError::transport(format!("no worker {}", source)))?;
		if let Some(pos) = queue.iter().position(|e| e.tag == tag) {
			if let Some(envelope) = queue.remove(pos) {
				return Ok(envelope.payload);
			}
		}
		let rx = self
			.incoming
			.get(source)
			.and_then(Option::as_ref)
			.ok_or_else(|| SandpileError::transport(format!("worker {} has no route from {}", self.rank, source)))?;
		loop {
			let envelope = rx
				.recv()
				.map_err(|_| SandpileError::transport(format!("worker {} is gone ({:?} to {})", source, tag, self.rank)))?;
			if envelope.tag == tag {
				return Ok(envelope.payload);
			}
			trace!(rank = self.rank, source, tag = ?envelope.tag, "message held for a later receive");
			self.pending[source].push_back(envelope);
		}
	}

	fn take_cells(&mut self, source: usize, tag: Tag) -> Result<Vec<Cell>> {
		match self.take(source, tag)? {
			Payload::Cells(cells) => Ok(cells),
			other => Err(unexpected(source, tag, &other)),
		}
	}
}

fn unexpected(source: usize, tag: Tag, payload: &Payload) -> SandpileError {
	SandpileError::transport(format!("unexpected {:?} payload from {} for {:?}", payload, source, tag))
}

impl Transport for ChannelTransport {
	fn rank(&self) -> usize {
		self.rank
	}

	fn size(&self) -> usize {
		self.size
	}

	fn isend(&mut self, dest: usize, tag: Tag, row: &[Cell]) -> Result<Request> {
		self.post(dest, tag, Payload::Cells(row.to_vec()))?;
		Ok(Request::Send)
	}

	fn irecv(&mut self, source: usize, tag: Tag) -> Request {
		Request::Receive { source, tag }
	}

	fn wait_all(&mut self, requests: &[Request]) -> Result<Vec<Vec<Cell>>> {
		let mut rows = Vec::new();
		for request in requests {
			if let Request::Receive { source, tag } = *request {
				rows.push(self.take_cells(source, tag)?);
			}
		}
		Ok(rows)
	}

	fn all_reduce_or(&mut self, flag: bool) -> Result<bool> {
		const ROOT: usize = 0;
		if self.rank == ROOT {
			let mut any = flag;
			for source in 1..self.size {
				match self.take(source, Tag::Vote)? {
					Payload::Flag(f) => any |= f,
					other => return Err(unexpected(source, Tag::Vote, &other)),
				}
			}
			for dest in 1..self.size {
				self.post(dest, Tag::Verdict, Payload::Flag(any))?;
			}
			Ok(any)
		} else {
			self.post(ROOT, Tag::Vote, Payload::Flag(flag))?;
			match self.take(ROOT, Tag::Verdict)? {
				Payload::Flag(any) => Ok(any),
				other => Err(unexpected(ROOT, Tag::Verdict, &other)),
			}
		}
	}

	fn reduce_sum(&mut self, root: usize, value: u64) -> Result<Option<u64>> {
		if self.rank != root {
			self.post(root, Tag::Count, Payload::Count(value))?;
			return Ok(None);
		}
		let mut total = value;
		for source in (0..self.size).filter(|&s| s != root) {
			match self.take(source, Tag::Count)? {
				Payload::Count(c) => total += c,
				other => return Err(unexpected(source, Tag::Count, &other)),
			}
		}
		Ok(Some(total))
	}

	fn scatter(&mut self, root: usize, data: Option<&[Cell]>, counts: &[usize]) -> Result<Vec<Cell>> {
		if counts.len() != self.size {
			return Err(SandpileError::transport(format!(
				"{} chunk sizes for {} workers",
				counts.len(),
				self.size
			)));
		}
		if self.rank != root {
			let chunk = self.take_cells(root, Tag::Scatter)?;
			if chunk.len() != counts[self.rank] {
				return Err(SandpileError::transport(format!(
					"worker {} expected {} cells, got {}",
					self.rank,
					counts[self.rank],
					chunk.len()
				)));
			}
			return Ok(chunk);
		}
		let data = data.ok_or_else(|| SandpileError::transport("scatter root has no data"))?;
		let mut chunks = crate::partition::split(data, counts)?;
		for (dest, chunk) in chunks.iter_mut().enumerate() {
			if dest != root {
				self.post(dest, Tag::Scatter, Payload::Cells(std::mem::take(chunk)))?;
			}
		}
		Ok(chunks.swap_remove(root))
	}

	fn gather(&mut self, root: usize, local: &[Cell]) -> Result<Option<Vec<Cell>>> {
		if self.rank != root {
			self.post(root, Tag::Gather, Payload::Cells(local.to_vec()))?;
			return Ok(None);
		}
		let mut all = Vec::new();
		for source in 0..self.size {
			if source == root {
				all.extend_from_slice(local);
			} else {
				all.extend(self.take_cells(source, Tag::Gather)?);
			}
		}
		Ok(Some(all))
	}
}
