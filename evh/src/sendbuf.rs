// Copyright (c) 2024, The EWS Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::constants::*;
use ews_err::*;
use std::fs::File;
use std::io::Read;

// Optional streaming source attached to a send buffer. While present, the drain path refills
// the ring from this file whenever the ring runs empty.
pub(crate) struct FileStream {
	pub(crate) file: File,
	pub(crate) remaining: u64,
}

/// Per-connection ring buffer. All bytes queued for a connection pass through this buffer so
/// that submission order is preserved across partial writes and drains.
pub struct SendBuf {
	buf: Vec<u8>,
	head: usize,
	size: usize,
	pub(crate) file: Option<FileStream>,
}

impl SendBuf {
	pub fn new(capacity: usize) -> Self {
		Self {
			buf: vec![0u8; capacity],
			head: 0,
			size: 0,
			file: None,
		}
	}

	/// Number of queued bytes.
	pub fn len(&self) -> usize {
		self.size
	}

	/// True when either ring bytes or a streaming source remain.
	pub fn has_data(&self) -> bool {
		self.size > 0 || self.is_streaming()
	}

	pub fn is_streaming(&self) -> bool {
		match &self.file {
			Some(fs) => fs.remaining > 0,
			None => false,
		}
	}

	pub fn free_space(&self) -> usize {
		self.buf.len() - self.size
	}

	/// Contiguous readable slice starting at the read cursor. May be shorter than
	/// [`SendBuf::len`] when the data wraps; call again after [`SendBuf::consume`].
	pub fn peek(&self) -> &[u8] {
		let end = if self.head + self.size > self.buf.len() {
			self.buf.len()
		} else {
			self.head + self.size
		};
		&self.buf[self.head..end]
	}

	/// Advance the read cursor by `n` bytes.
	pub fn consume(&mut self, n: usize) {
		let n = if n > self.size { self.size } else { n };
		self.head = (self.head + n) % self.buf.len();
		self.size -= n;
		if self.size == 0 {
			self.head = 0;
		}
	}

	/// Append bytes to the ring. Fails with [`ews_err::ErrorKind::CapacityExceeded`] when
	/// there is not enough free space; no partial queue occurs.
	pub fn queue(&mut self, data: &[u8]) -> Result<(), Error> {
		if data.len() > self.free_space() {
			let text = format!(
				"send buffer full: need {} bytes, {} free",
				data.len(),
				self.free_space()
			);
			return Err(err!(ErrKind::CapacityExceeded, text));
		}
		let cap = self.buf.len();
		let mut tail = (self.head + self.size) % cap;
		let first = if tail + data.len() > cap {
			cap - tail
		} else {
			data.len()
		};
		self.buf[tail..tail + first].clone_from_slice(&data[0..first]);
		if first < data.len() {
			tail = 0;
			self.buf[tail..data.len() - first].clone_from_slice(&data[first..]);
		}
		self.size += data.len();
		Ok(())
	}

	/// Contiguous free region at the write cursor for zero-copy fills. Commit what was
	/// written with [`SendBuf::commit`].
	pub fn write_ptr(&mut self) -> &mut [u8] {
		let cap = self.buf.len();
		let tail = (self.head + self.size) % cap;
		let end = if tail >= self.head && self.size < cap {
			cap
		} else {
			self.head
		};
		&mut self.buf[tail..end]
	}

	/// Mark `n` bytes written through [`SendBuf::write_ptr`] as queued.
	pub fn commit(&mut self, n: usize) {
		let free = self.free_space();
		let n = if n > free { free } else { n };
		self.size += n;
	}

	/// Attach a streaming file source of `len` bytes. Drains refill the ring from this
	/// source until it is exhausted or [`SendBuf::stop_file`] is called.
	pub fn start_file(&mut self, file: File, len: u64) {
		self.file = Some(FileStream {
			file,
			remaining: len,
		});
	}

	pub fn stop_file(&mut self) {
		self.file = None;
	}

	/// Fill ring slack from the streaming source. Returns the number of bytes moved into
	/// the ring. A short read ends the stream.
	pub(crate) fn refill_from_file(&mut self) -> Result<usize, Error> {
		let mut total = 0;
		loop {
			let remaining = match &self.file {
				Some(fs) => fs.remaining,
				None => break,
			};
			if remaining == 0 {
				self.file = None;
				break;
			}
			// contiguous slack at the write cursor
			let cap = self.buf.len();
			let tail = (self.head + self.size) % cap;
			let end = if tail >= self.head && self.size < cap {
				cap
			} else {
				self.head
			};
			if end <= tail {
				break;
			}
			let mut want = end - tail;
			if want as u64 > remaining {
				want = remaining as usize;
			}
			let rlen = match &mut self.file {
				Some(fs) => fs.file.read(&mut self.buf[tail..tail + want])?,
				None => 0,
			};
			if rlen == 0 {
				// eof before the advertised length; stop streaming
				self.file = None;
				break;
			}
			self.size += rlen;
			match &mut self.file {
				Some(fs) => fs.remaining -= rlen as u64,
				None => {}
			}
			total += rlen;
		}
		Ok(total)
	}

	/// Drop all queued bytes and any streaming source.
	pub fn clear(&mut self) {
		self.head = 0;
		self.size = 0;
		self.file = None;
	}
}

impl Default for SendBuf {
	fn default() -> Self {
		Self::new(SEND_BUF_SIZE)
	}
}
