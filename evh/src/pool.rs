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

#[cfg(target_os = "linux")]
use crate::linux::Handle;

use crate::constants::*;
use crate::types::{ConnSlot, ConnState, INVALID_HANDLE};
use crate::SendBuf;
use ews_deps::rand::random;
use ews_err::*;

/// Fixed array of connection slots tracked by three word-sized bitmasks: which slots are
/// active, which have queued writes, and which carry websocket connections. The masks allow
/// O(1) allocation (lowest zero bit) and popcount/trailing-zero iteration.
///
/// Invariants: bit `i` of `active_mask` is set iff `slots[i].state != Free`;
/// `ws_active_mask` and `write_pending_mask` are subsets of `active_mask`; a free slot has
/// `handle == INVALID_HANDLE`.
pub struct ConnPool {
	slots: Vec<ConnSlot>,
	active_mask: u32,
	write_pending_mask: u32,
	ws_active_mask: u32,
	size: usize,
}

impl ConnPool {
	/// Build a pool with `size` slots. `size` may not exceed
	/// [`crate::EVH_MAX_CONNECTIONS`] because the masks are single words.
	pub fn new(size: usize) -> Result<Self, Error> {
		if size == 0 || size > EVH_MAX_CONNECTIONS {
			let text = format!(
				"pool size must be between 1 and {}, got {}",
				EVH_MAX_CONNECTIONS, size
			);
			return Err(err!(ErrKind::IllegalArgument, text));
		}
		let mut slots = Vec::with_capacity(size);
		for i in 0..size {
			slots.push(ConnSlot {
				handle: INVALID_HANDLE,
				id: 0,
				state: ConnState::Free,
				flags: 0,
				pool_index: i,
				last_activity: 0,
				sendbuf: SendBuf::new(SEND_BUF_SIZE),
				user_ctx: None,
			});
		}
		Ok(Self {
			slots,
			active_mask: 0,
			write_pending_mask: 0,
			ws_active_mask: 0,
			size,
		})
	}

	pub fn size(&self) -> usize {
		self.size
	}

	/// Allocate the lowest free slot, marking it active and [`crate::ConnState::New`].
	/// Returns [`None`] when every slot is taken.
	pub fn alloc(&mut self) -> Option<usize> {
		let idx = (!self.active_mask).trailing_zeros() as usize;
		if idx >= self.size {
			return None;
		}
		self.active_mask |= 1 << idx;
		let slot = &mut self.slots[idx];
		slot.handle = INVALID_HANDLE;
		slot.id = random();
		slot.state = ConnState::New;
		slot.flags = 0;
		slot.last_activity = 0;
		slot.sendbuf.clear();
		slot.user_ctx = None;
		Some(idx)
	}

	/// Release a slot: clears all three mask bits and resets the slot to
	/// [`crate::ConnState::Free`]. A no-op for out-of-range or already free indexes.
	pub fn free(&mut self, idx: usize) {
		if idx >= self.size {
			return;
		}
		let bit = 1u32 << idx;
		self.active_mask &= !bit;
		self.write_pending_mask &= !bit;
		self.ws_active_mask &= !bit;
		let slot = &mut self.slots[idx];
		slot.handle = INVALID_HANDLE;
		slot.state = ConnState::Free;
		slot.flags = 0;
		slot.sendbuf.clear();
		slot.user_ctx = None;
	}

	pub fn mark_ws_active(&mut self, idx: usize, active: bool) {
		if idx >= self.size || self.active_mask & (1 << idx) == 0 {
			return;
		}
		if active {
			self.ws_active_mask |= 1 << idx;
		} else {
			self.ws_active_mask &= !(1 << idx);
		}
	}

	pub fn mark_write_pending(&mut self, idx: usize, pending: bool) {
		if idx >= self.size || self.active_mask & (1 << idx) == 0 {
			return;
		}
		if pending {
			self.write_pending_mask |= 1 << idx;
		} else {
			self.write_pending_mask &= !(1 << idx);
		}
	}

	/// Locate the active slot bound to the specified handle. Only active bits are visited.
	pub fn find_by_fd(&self, handle: Handle) -> Option<usize> {
		let mut mask = self.active_mask;
		while mask != 0 {
			let idx = mask.trailing_zeros() as usize;
			if self.slots[idx].handle == handle {
				return Some(idx);
			}
			mask &= !(1 << idx);
		}
		None
	}

	pub fn count_active(&self) -> u32 {
		self.active_mask.count_ones()
	}

	pub fn active_mask(&self) -> u32 {
		self.active_mask
	}

	pub fn write_pending_mask(&self) -> u32 {
		self.write_pending_mask
	}

	pub fn ws_active_mask(&self) -> u32 {
		self.ws_active_mask
	}

	pub fn slot(&self, idx: usize) -> Option<&ConnSlot> {
		if idx >= self.size {
			None
		} else {
			Some(&self.slots[idx])
		}
	}

	pub fn slot_mut(&mut self, idx: usize) -> Option<&mut ConnSlot> {
		if idx >= self.size {
			None
		} else {
			Some(&mut self.slots[idx])
		}
	}

	/// Collect the indexes currently set in `mask` (e.g. a snapshot of the active mask).
	pub fn indexes(mask: u32) -> Vec<usize> {
		let mut ret = vec![];
		let mut mask = mask;
		while mask != 0 {
			let idx = mask.trailing_zeros() as usize;
			ret.push(idx);
			mask &= !(1 << idx);
		}
		ret
	}
}
