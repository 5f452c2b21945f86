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

use crate::pool::ConnPool;
use crate::sendbuf::SendBuf;
use ews_err::Error;
use std::any::Any;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Sentinel for a slot with no socket attached.
pub const INVALID_HANDLE: Handle = -1;

/// Lifecycle of a connection slot.
#[derive(PartialEq, Copy, Clone, Debug)]
pub enum ConnState {
	/// The slot is not in use.
	Free,
	/// Accepted, no bytes processed yet.
	New,
	/// An http request line / header block is being parsed.
	ReadingHeaders,
	/// Headers complete, body bytes outstanding.
	ReadingBody,
	/// The connection was upgraded and now carries websocket frames.
	WebSocket,
	/// Close requested; pending writes may still drain.
	Closing,
	/// Closed; the loop will run the close callback and free the slot.
	Closed,
}

/// One fixed-capacity connection record. Slots are owned by the [`crate::ConnPool`] and
/// addressed by index; the index is cached in the slot for reverse lookups.
pub struct ConnSlot {
	pub(crate) handle: Handle,
	pub(crate) id: u128,
	pub(crate) state: ConnState,
	pub(crate) flags: u8,
	pub(crate) pool_index: usize,
	pub(crate) last_activity: u64,
	pub(crate) sendbuf: SendBuf,
	pub(crate) user_ctx: Option<Box<dyn Any + Send>>,
}

impl ConnSlot {
	pub fn handle(&self) -> Handle {
		self.handle
	}

	pub fn id(&self) -> u128 {
		self.id
	}

	pub fn state(&self) -> ConnState {
		self.state
	}

	pub fn set_state(&mut self, state: ConnState) {
		self.state = state;
	}

	pub fn pool_index(&self) -> usize {
		self.pool_index
	}

	pub fn last_activity(&self) -> u64 {
		self.last_activity
	}

	pub fn touch(&mut self, tick: u64) {
		self.last_activity = tick;
	}

	pub fn set_flag(&mut self, flag: u8) {
		self.flags |= flag;
	}

	pub fn unset_flag(&mut self, flag: u8) {
		self.flags &= !flag;
	}

	pub fn is_set(&self, flag: u8) -> bool {
		self.flags & flag != 0
	}

	pub fn sendbuf(&self) -> &SendBuf {
		&self.sendbuf
	}

	pub fn sendbuf_mut(&mut self) -> &mut SendBuf {
		&mut self.sendbuf
	}

	pub fn user_ctx(&mut self) -> &mut Option<Box<dyn Any + Send>> {
		&mut self.user_ctx
	}

	pub fn set_user_ctx(&mut self, user_ctx: Box<dyn Any + Send>) {
		self.user_ctx = Some(user_ctx);
	}
}

/// The view of the engine handed to every callback. All operations are non-blocking except
/// [`crate::EvhContext::send_all`], which drains through the send buffer before returning.
pub struct EvhContext<'a> {
	pub(crate) pool: &'a mut ConnPool,
	pub(crate) user_data: &'a mut Option<Box<dyn Any + Send>>,
	pub(crate) tick: u64,
}

/// The main trait of this crate. Built with
/// [`crate::EvhBuilder::build_event_loop`]; the callbacks must all be set before
/// [`crate::EventLoop::start`] is called.
pub trait EventLoop<OnAccept, OnRead, OnWriteReady, OnClose, OnHousekeeper>
where
	OnAccept: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
	OnRead: FnMut(&mut EvhContext<'_>, usize, &[u8]) -> Result<(), Error> + Send + 'static + Unpin,
	OnWriteReady: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
	OnClose: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
	OnHousekeeper: FnMut(&mut EvhContext<'_>) -> Result<(), Error> + Send + 'static + Unpin,
{
	/// Called once for every accepted connection after its slot is allocated.
	fn set_on_accept(&mut self, on_accept: OnAccept) -> Result<(), Error>;
	/// Called with each chunk of bytes read from a connection, in arrival order.
	fn set_on_read(&mut self, on_read: OnRead) -> Result<(), Error>;
	/// Called when a write-pending connection's send buffer has fully drained.
	fn set_on_write_ready(&mut self, on_write_ready: OnWriteReady) -> Result<(), Error>;
	/// Called for each connection observed in [`crate::ConnState::Closed`] before its slot
	/// is freed.
	fn set_on_close(&mut self, on_close: OnClose) -> Result<(), Error>;
	/// Called once per readiness-wait timeout, after the inactivity scan.
	fn set_on_housekeeper(&mut self, on_housekeeper: OnHousekeeper) -> Result<(), Error>;
	/// Bind the listener and start the loop thread.
	fn start(&mut self) -> Result<(), Error>;
	/// Request a stop and join the loop thread. Websocket connections are given a bounded
	/// drain period.
	fn stop(&mut self) -> Result<(), Error>;
	/// Build a controller that can stop the loop from another owner.
	fn controller(&mut self) -> Result<EvhController, Error>;
}

/// Stops a running event loop. Obtained from [`crate::EventLoop::controller`].
pub struct EvhController {
	pub(crate) running: Arc<AtomicBool>,
	pub(crate) stop_requested: Arc<AtomicBool>,
	pub(crate) join_handle: Option<JoinHandle<()>>,
}

/// Builder struct used to build [`crate::EventLoop`] implementations.
pub struct EvhBuilder {}

// Crate local structures

#[derive(Clone, Debug)]
pub(crate) struct EvhConfig {
	pub(crate) addr: String,
	pub(crate) port: u16,
	pub(crate) backlog: usize,
	pub(crate) timeout_millis: u64,
	pub(crate) select_timeout_millis: u64,
	pub(crate) recv_buffer_size: usize,
	pub(crate) nodelay: bool,
	pub(crate) reuseaddr: bool,
	pub(crate) max_connections: usize,
	pub(crate) debug: bool,
}

pub(crate) struct EvhCallbacks<OnAccept, OnRead, OnWriteReady, OnClose, OnHousekeeper>
where
	OnAccept: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
	OnRead: FnMut(&mut EvhContext<'_>, usize, &[u8]) -> Result<(), Error> + Send + 'static + Unpin,
	OnWriteReady: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
	OnClose: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
	OnHousekeeper: FnMut(&mut EvhContext<'_>) -> Result<(), Error> + Send + 'static + Unpin,
{
	pub(crate) on_accept: Option<Pin<Box<OnAccept>>>,
	pub(crate) on_read: Option<Pin<Box<OnRead>>>,
	pub(crate) on_write_ready: Option<Pin<Box<OnWriteReady>>>,
	pub(crate) on_close: Option<Pin<Box<OnClose>>>,
	pub(crate) on_housekeeper: Option<Pin<Box<OnHousekeeper>>>,
}

pub(crate) struct EventLoopImpl<OnAccept, OnRead, OnWriteReady, OnClose, OnHousekeeper>
where
	OnAccept: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
	OnRead: FnMut(&mut EvhContext<'_>, usize, &[u8]) -> Result<(), Error> + Send + 'static + Unpin,
	OnWriteReady: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
	OnClose: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
	OnHousekeeper: FnMut(&mut EvhContext<'_>) -> Result<(), Error> + Send + 'static + Unpin,
{
	pub(crate) config: EvhConfig,
	pub(crate) callbacks: Option<EvhCallbacks<OnAccept, OnRead, OnWriteReady, OnClose, OnHousekeeper>>,
	pub(crate) running: Arc<AtomicBool>,
	pub(crate) stop_requested: Arc<AtomicBool>,
	pub(crate) join_handle: Option<JoinHandle<()>>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum EventType {
	Read,
	Write,
	ReadWrite,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct Event {
	pub(crate) handle: Handle,
	pub(crate) etype: EventType,
}

impl Event {
	pub(crate) fn new(handle: Handle, etype: EventType) -> Self {
		Self { handle, etype }
	}

	pub(crate) fn empty() -> Self {
		Self {
			etype: EventType::Read,
			handle: 0,
		}
	}
}

#[derive(PartialEq)]
pub(crate) enum EventTypeIn {
	Read,
	Write,
}

pub(crate) struct EventIn {
	pub(crate) handle: Handle,
	pub(crate) etype: EventTypeIn,
}

impl EventIn {
	pub(crate) fn new(handle: Handle, etype: EventTypeIn) -> Self {
		Self { handle, etype }
	}
}
