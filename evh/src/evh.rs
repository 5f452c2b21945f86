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
use crate::linux::*;

use crate::constants::*;
use crate::pool::ConnPool;
use crate::types::{
	ConnSlot, ConnState, Event, EventIn, EventType, EventTypeIn, EvhCallbacks, EvhConfig,
	EvhContext, EvhController, EventLoopImpl,
};
use crate::EventLoop;
use ews_conf::ConfigOptionName as CN;
use ews_conf::{Config, ConfigBuilder, ConfigOption};
use ews_err::*;
use ews_log::*;
use std::any::Any;
use std::fs::File;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::spawn;
use std::time::Instant;

info!();

impl<'a> EvhContext<'a> {
	/// The connection pool. Exposed so callbacks can inspect masks and slots.
	pub fn pool(&mut self) -> &mut ConnPool {
		self.pool
	}

	/// Current inactivity tick. Ticks advance only when the readiness wait times out.
	pub fn tick(&self) -> u64 {
		self.tick
	}

	/// Loop-owned storage for the layer above. Set once and downcast on each callback.
	pub fn user_data(&mut self) -> &mut Option<Box<dyn Any + Send>> {
		self.user_data
	}

	/// Split this context into its pool and user-data parts so both can be borrowed
	/// mutably at the same time.
	pub fn parts(&mut self) -> (&mut ConnPool, &mut Option<Box<dyn Any + Send>>, u64) {
		(self.pool, self.user_data, self.tick)
	}

	/// See [`crate::ConnPool::send`].
	pub fn send(&mut self, idx: usize, data: &[u8]) -> Result<(), Error> {
		self.pool.send(idx, data)
	}

	/// See [`crate::ConnPool::send_all`].
	pub fn send_all(&mut self, idx: usize, data: &[u8]) -> Result<(), Error> {
		self.pool.send_all(idx, data)
	}

	/// See [`crate::ConnPool::close`].
	pub fn close(&mut self, idx: usize) {
		self.pool.close(idx)
	}

	/// See [`crate::ConnPool::close_after_drain`].
	pub fn close_after_drain(&mut self, idx: usize) {
		self.pool.close_after_drain(idx)
	}

	/// See [`crate::ConnPool::start_file_stream`].
	pub fn start_file(&mut self, idx: usize, file: File, len: u64) -> Result<(), Error> {
		self.pool.start_file_stream(idx, file, len)
	}
}

// IO operations on pool slots. These live here rather than in pool.rs because they drive
// the platform write/read paths; pool.rs is mask bookkeeping only.
impl ConnPool {
	/// Queue bytes for the connection without blocking, preserving submission order. The
	/// slot is marked write-pending when bytes remain queued after the call. An IO error
	/// marks the slot closed and surfaces as [`ews_err::ErrorKind::ConnClosed`].
	pub fn send(&mut self, idx: usize, data: &[u8]) -> Result<(), Error> {
		let slot = match self.slot_mut(idx) {
			Some(slot) if slot.state != ConnState::Free && slot.state != ConnState::Closed => slot,
			_ => {
				let text = format!("send on invalid slot {}", idx);
				return Err(err!(ErrKind::ConnClosed, text));
			}
		};
		match send_nonblocking(slot, data) {
			Ok(pending) => {
				self.mark_write_pending(idx, pending);
				Ok(())
			}
			Err(e) => {
				if let Some(slot) = self.slot_mut(idx) {
					slot.set_state(ConnState::Closed);
				}
				let text = format!("send failed on slot {}: {}", idx, e);
				Err(err!(ErrKind::ConnClosed, text))
			}
		}
	}

	/// Send every byte before returning, blocking on writability as needed. Bytes already
	/// queued in the send buffer always go out first so ordering is preserved.
	pub fn send_all(&mut self, idx: usize, data: &[u8]) -> Result<(), Error> {
		let slot = match self.slot_mut(idx) {
			Some(slot) if slot.state != ConnState::Free && slot.state != ConnState::Closed => slot,
			_ => {
				let text = format!("send_all on invalid slot {}", idx);
				return Err(err!(ErrKind::ConnClosed, text));
			}
		};
		match send_all(slot, data) {
			Ok(_) => Ok(()),
			Err(e) => {
				if let Some(slot) = self.slot_mut(idx) {
					slot.set_state(ConnState::Closed);
				}
				let text = format!("send_all failed on slot {}: {}", idx, e);
				Err(err!(ErrKind::ConnClosed, text))
			}
		}
	}

	/// First phase of the two-phase close: mark the slot closed. The loop runs the close
	/// callback and frees the slot at the end of the current dispatch cycle.
	pub fn close(&mut self, idx: usize) {
		if let Some(slot) = self.slot_mut(idx) {
			if slot.state != ConnState::Free {
				slot.set_state(ConnState::Closed);
			}
		}
	}

	/// Close once queued bytes have drained.
	pub fn close_after_drain(&mut self, idx: usize) {
		if let Some(slot) = self.slot_mut(idx) {
			if slot.state != ConnState::Free && slot.state != ConnState::Closed {
				slot.set_state(ConnState::Closing);
			}
		}
	}

	/// Attach a streaming file to the slot's send buffer and mark it write-pending so the
	/// loop drives the transfer.
	pub fn start_file_stream(&mut self, idx: usize, file: File, len: u64) -> Result<(), Error> {
		match self.slot_mut(idx) {
			Some(slot) if slot.state != ConnState::Free => {
				slot.sendbuf.start_file(file, len);
				self.mark_write_pending(idx, true);
				Ok(())
			}
			_ => {
				let text = format!("start_file on invalid slot {}", idx);
				Err(err!(ErrKind::ConnClosed, text))
			}
		}
	}
}

/// Read bytes from a raw socket handle. Returns `Ok(None)` when the read would block and
/// `Ok(Some(0))` at end of stream. Used by layers that hold a handle but not the pool.
pub fn socket_recv(handle: Handle, buf: &mut [u8]) -> Result<Option<usize>, Error> {
	read_impl(handle, buf)
}

/// Read at least one byte from a raw socket handle, blocking on readability up to
/// `timeout_millis`. End of stream surfaces as [`ews_err::ErrorKind::ConnClosed`].
pub fn socket_recv_blocking(
	handle: Handle,
	buf: &mut [u8],
	timeout_millis: u64,
) -> Result<usize, Error> {
	loop {
		match read_impl(handle, buf)? {
			Some(0) => {
				let text = format!("peer closed handle {}", handle);
				return Err(err!(ErrKind::ConnClosed, text));
			}
			Some(rlen) => return Ok(rlen),
			None => wait_readable(handle, timeout_millis)?,
		}
	}
}

// Drain policy: loop issuing best-effort non-blocking writes until would-block or empty,
// refilling ring slack from the streaming source when the ring runs dry. Returns true when
// nothing remains to send.
pub(crate) fn drain_slot(slot: &mut ConnSlot) -> Result<bool, Error> {
	loop {
		if slot.sendbuf.peek().is_empty() {
			if slot.sendbuf.is_streaming() {
				if slot.sendbuf.refill_from_file()? == 0 {
					break;
				}
				continue;
			}
			break;
		}
		match write_impl(slot.handle, slot.sendbuf.peek())? {
			Some(wlen) if wlen > 0 => slot.sendbuf.consume(wlen),
			Some(_) => break,
			None => return Ok(false),
		}
	}
	Ok(!slot.sendbuf.has_data())
}

// Non-blocking send policy. When bytes are already queued, sends above the small-send
// threshold first attempt an opportunistic drain; everything still pending is queued behind
// the existing bytes so a handler's submissions reach the kernel in submission order.
// Returns whether the slot should be marked write-pending.
pub(crate) fn send_nonblocking(slot: &mut ConnSlot, data: &[u8]) -> Result<bool, Error> {
	if slot.sendbuf.has_data() {
		if data.len() > SMALL_SEND_THRESHOLD {
			drain_slot(slot)?;
		}
		if slot.sendbuf.has_data() {
			if slot.sendbuf.queue(data).is_err() {
				// one drain, then the retry failure is the caller's error
				drain_slot(slot)?;
				slot.sendbuf.queue(data)?;
			}
			return Ok(true);
		}
	}

	let mut off = 0;
	loop {
		if off >= data.len() {
			break;
		}
		match write_impl(slot.handle, &data[off..])? {
			Some(wlen) if wlen > 0 => off += wlen,
			_ => break,
		}
	}

	if off < data.len() {
		if slot.sendbuf.queue(&data[off..]).is_err() {
			drain_slot(slot)?;
			slot.sendbuf.queue(&data[off..])?;
		}
		Ok(true)
	} else {
		Ok(false)
	}
}

// Blocking send used by the synchronous response path. Any bytes already queued for the
// connection go out first.
pub(crate) fn send_all(slot: &mut ConnSlot, data: &[u8]) -> Result<(), Error> {
	let mut off = 0;
	loop {
		if slot.sendbuf.has_data() {
			if !drain_slot(slot)? {
				wait_writable(slot.handle, EVH_SEND_ALL_TIMEOUT_MILLIS)?;
				continue;
			}
		}
		if off >= data.len() {
			break;
		}
		match write_impl(slot.handle, &data[off..])? {
			Some(wlen) if wlen > 0 => off += wlen,
			_ => wait_writable(slot.handle, EVH_SEND_ALL_TIMEOUT_MILLIS)?,
		}
	}
	Ok(())
}

impl EvhController {
	/// Request a stop and join the loop thread.
	pub fn stop(&mut self) -> Result<(), Error> {
		if !self.running.load(Ordering::SeqCst) && self.join_handle.is_none() {
			return Err(err!(ErrKind::NotRunning, "event loop is not running"));
		}
		self.stop_requested.store(true, Ordering::SeqCst);
		if let Some(join_handle) = self.join_handle.take() {
			match join_handle.join() {
				Ok(_) => {}
				Err(_) => {
					return Err(err!(ErrKind::IllegalState, "event loop thread panicked"));
				}
			}
		}
		Ok(())
	}

	pub fn is_running(&self) -> bool {
		self.running.load(Ordering::SeqCst)
	}
}

impl<OnAccept, OnRead, OnWriteReady, OnClose, OnHousekeeper>
	EventLoop<OnAccept, OnRead, OnWriteReady, OnClose, OnHousekeeper>
	for EventLoopImpl<OnAccept, OnRead, OnWriteReady, OnClose, OnHousekeeper>
where
	OnAccept: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
	OnRead: FnMut(&mut EvhContext<'_>, usize, &[u8]) -> Result<(), Error> + Send + 'static + Unpin,
	OnWriteReady: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
	OnClose: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
	OnHousekeeper: FnMut(&mut EvhContext<'_>) -> Result<(), Error> + Send + 'static + Unpin,
{
	fn set_on_accept(&mut self, on_accept: OnAccept) -> Result<(), Error> {
		match &mut self.callbacks {
			Some(callbacks) => callbacks.on_accept = Some(Box::pin(on_accept)),
			None => return Err(err!(ErrKind::IllegalState, "event loop already started")),
		}
		Ok(())
	}

	fn set_on_read(&mut self, on_read: OnRead) -> Result<(), Error> {
		match &mut self.callbacks {
			Some(callbacks) => callbacks.on_read = Some(Box::pin(on_read)),
			None => return Err(err!(ErrKind::IllegalState, "event loop already started")),
		}
		Ok(())
	}

	fn set_on_write_ready(&mut self, on_write_ready: OnWriteReady) -> Result<(), Error> {
		match &mut self.callbacks {
			Some(callbacks) => callbacks.on_write_ready = Some(Box::pin(on_write_ready)),
			None => return Err(err!(ErrKind::IllegalState, "event loop already started")),
		}
		Ok(())
	}

	fn set_on_close(&mut self, on_close: OnClose) -> Result<(), Error> {
		match &mut self.callbacks {
			Some(callbacks) => callbacks.on_close = Some(Box::pin(on_close)),
			None => return Err(err!(ErrKind::IllegalState, "event loop already started")),
		}
		Ok(())
	}

	fn set_on_housekeeper(&mut self, on_housekeeper: OnHousekeeper) -> Result<(), Error> {
		match &mut self.callbacks {
			Some(callbacks) => callbacks.on_housekeeper = Some(Box::pin(on_housekeeper)),
			None => return Err(err!(ErrKind::IllegalState, "event loop already started")),
		}
		Ok(())
	}

	fn start(&mut self) -> Result<(), Error> {
		self.start_impl()
	}

	fn stop(&mut self) -> Result<(), Error> {
		self.controller()?.stop()
	}

	fn controller(&mut self) -> Result<EvhController, Error> {
		Ok(EvhController {
			running: self.running.clone(),
			stop_requested: self.stop_requested.clone(),
			join_handle: self.join_handle.take(),
		})
	}
}

impl<OnAccept, OnRead, OnWriteReady, OnClose, OnHousekeeper>
	EventLoopImpl<OnAccept, OnRead, OnWriteReady, OnClose, OnHousekeeper>
where
	OnAccept: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
	OnRead: FnMut(&mut EvhContext<'_>, usize, &[u8]) -> Result<(), Error> + Send + 'static + Unpin,
	OnWriteReady: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
	OnClose: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
	OnHousekeeper: FnMut(&mut EvhContext<'_>) -> Result<(), Error> + Send + 'static + Unpin,
{
	pub(crate) fn new(configs: Vec<ConfigOption>) -> Result<Self, Error> {
		let config = Self::build_config(configs)?;
		Ok(Self {
			config,
			callbacks: Some(EvhCallbacks {
				on_accept: None,
				on_read: None,
				on_write_ready: None,
				on_close: None,
				on_housekeeper: None,
			}),
			running: Arc::new(AtomicBool::new(false)),
			stop_requested: Arc::new(AtomicBool::new(false)),
			join_handle: None,
		})
	}

	fn build_config(configs: Vec<ConfigOption>) -> Result<EvhConfig, Error> {
		let config = ConfigBuilder::build_config(configs);
		config.check_config(
			vec![
				CN::Addr,
				CN::Port,
				CN::Backlog,
				CN::TimeoutMillis,
				CN::SelectTimeoutMillis,
				CN::RecvBufferSize,
				CN::Nodelay,
				CN::ReuseAddr,
				CN::MaxConnections,
				CN::Debug,
			],
			vec![],
		)?;

		let max_connections =
			config.get_or_usize(&CN::MaxConnections, EVH_DEFAULT_MAX_CONNECTIONS);
		if max_connections == 0 || max_connections > EVH_MAX_CONNECTIONS {
			let text = format!(
				"MaxConnections must be between 1 and {}",
				EVH_MAX_CONNECTIONS
			);
			return Err(err!(ErrKind::Configuration, text));
		}
		let select_timeout_millis =
			config.get_or_u64(&CN::SelectTimeoutMillis, EVH_DEFAULT_SELECT_TIMEOUT_MILLIS);
		if select_timeout_millis == 0 {
			return Err(err!(ErrKind::Configuration, "SelectTimeoutMillis may not be 0"));
		}

		Ok(EvhConfig {
			addr: config.get_or_string(&CN::Addr, EVH_DEFAULT_ADDR.to_string()),
			port: config.get_or_u16(&CN::Port, EVH_DEFAULT_PORT),
			backlog: config.get_or_usize(&CN::Backlog, EVH_DEFAULT_BACKLOG),
			timeout_millis: config.get_or_u64(&CN::TimeoutMillis, EVH_DEFAULT_TIMEOUT_MILLIS),
			select_timeout_millis,
			recv_buffer_size: config
				.get_or_usize(&CN::RecvBufferSize, EVH_DEFAULT_RECV_BUFFER_SIZE),
			nodelay: config.get_or_bool(&CN::Nodelay, true),
			reuseaddr: config.get_or_bool(&CN::ReuseAddr, true),
			max_connections,
			debug: config.get_or_bool(&CN::Debug, false),
		})
	}

	fn start_impl(&mut self) -> Result<(), Error> {
		if self.running.load(Ordering::SeqCst) {
			return Err(err!(ErrKind::AlreadyRunning, "event loop already running"));
		}
		let callbacks = match self.callbacks.take() {
			Some(callbacks) => callbacks,
			None => return Err(err!(ErrKind::IllegalState, "event loop already started")),
		};

		let config = self.config.clone();
		let addr = format!("{}:{}", config.addr, config.port);
		let listener = create_listener(&addr, config.backlog, config.reuseaddr)?;
		debug!("listener handle = {} on {}", listener, addr)?;

		self.stop_requested.store(false, Ordering::SeqCst);
		self.running.store(true, Ordering::SeqCst);
		let running = self.running.clone();
		let stop_requested = self.stop_requested.clone();

		let join_handle = spawn(move || {
			match Self::execute_loop(config, callbacks, listener, stop_requested) {
				Ok(_) => {}
				Err(e) => {
					let _ = fatal!("event loop generated an unexpected error: {}", e);
				}
			}
			running.store(false, Ordering::SeqCst);
		});
		self.join_handle = Some(join_handle);

		Ok(())
	}

	fn execute_loop(
		config: EvhConfig,
		mut callbacks: EvhCallbacks<OnAccept, OnRead, OnWriteReady, OnClose, OnHousekeeper>,
		listener: Handle,
		stop_requested: Arc<AtomicBool>,
	) -> Result<(), Error> {
		let mut pool = ConnPool::new(config.max_connections)?;
		let mut platform = PlatformContext::new()?;
		let mut user_data: Option<Box<dyn Any + Send>> = None;
		let mut recv_buf = vec![0u8; config.recv_buffer_size];
		let mut in_events: Vec<EventIn> = vec![];
		let mut ret_events = [Event::empty(); MAX_RET_HANDLES];
		let mut tick: u64 = 0;
		let mut stop_time: Option<Instant> = None;
		let timeout_ticks = {
			let t = config.timeout_millis / config.select_timeout_millis;
			if t == 0 {
				1
			} else {
				t
			}
		};

		loop {
			let stopping = stop_requested.load(Ordering::SeqCst);
			if stopping {
				if stop_time.is_none() {
					stop_time = Some(Instant::now());
				}
				let elapsed: u64 = try_into!(stop_time.as_ref().unwrap().elapsed().as_millis())?;
				if pool.ws_active_mask() == 0 || elapsed >= EVH_WS_DRAIN_MILLIS {
					break;
				}
			}

			// interest set: listener plus every active connection; POLLOUT only where
			// writes are pending
			in_events.clear();
			if !stopping {
				in_events.push(EventIn::new(listener, EventTypeIn::Read));
			}
			for idx in ConnPool::indexes(pool.active_mask()) {
				match pool.slot(idx) {
					Some(slot) => in_events.push(EventIn::new(slot.handle, EventTypeIn::Read)),
					None => {}
				}
			}
			for idx in ConnPool::indexes(pool.write_pending_mask()) {
				match pool.slot(idx) {
					Some(slot) => in_events.push(EventIn::new(slot.handle, EventTypeIn::Write)),
					None => {}
				}
			}

			let ret_event_count = get_events(&config, &mut platform, &in_events, &mut ret_events)?;

			if config.debug {
				info!("tick={},events={}", tick, ret_event_count)?;
			}

			if ret_event_count == 0 {
				tick += 1;
				Self::process_inactivity(&mut pool, tick, timeout_ticks)?;
				Self::call_on_housekeeper(
					&mut callbacks.on_housekeeper,
					&mut pool,
					&mut user_data,
					tick,
				)?;
			} else {
				// accept precedes writes precedes reads within an iteration
				let mut listener_ready = false;
				let mut write_handles = vec![];
				let mut read_handles = vec![];
				for event in ret_events.iter().take(ret_event_count) {
					if event.handle == listener {
						listener_ready = true;
						continue;
					}
					match event.etype {
						EventType::Read => read_handles.push(event.handle),
						EventType::Write => write_handles.push(event.handle),
						EventType::ReadWrite => {
							write_handles.push(event.handle);
							read_handles.push(event.handle);
						}
					}
				}

				if listener_ready && !stopping {
					Self::process_accept(
						&config,
						listener,
						&mut pool,
						&mut platform,
						&mut callbacks.on_accept,
						&mut user_data,
						tick,
					)?;
				}
				for handle in write_handles {
					Self::process_write_event(
						handle,
						&mut pool,
						&mut callbacks.on_write_ready,
						&mut user_data,
						tick,
					)?;
				}
				for handle in read_handles {
					Self::process_read_event(
						handle,
						&mut pool,
						&mut recv_buf,
						&mut callbacks.on_read,
						&mut user_data,
						tick,
					)?;
				}
			}

			Self::process_closed(
				&mut pool,
				&mut platform,
				&mut callbacks.on_close,
				&mut user_data,
				tick,
				false,
			)?;
		}

		// shutdown: every remaining connection is closed and reported
		Self::process_closed(
			&mut pool,
			&mut platform,
			&mut callbacks.on_close,
			&mut user_data,
			tick,
			true,
		)?;
		close_impl(listener)?;
		debug!("event loop exited")?;
		Ok(())
	}

	fn process_inactivity(pool: &mut ConnPool, tick: u64, timeout_ticks: u64) -> Result<(), Error> {
		// websocket connections are exempt via mask subtraction
		let scan = pool.active_mask() & !pool.ws_active_mask();
		for idx in ConnPool::indexes(scan) {
			if let Some(slot) = pool.slot_mut(idx) {
				if tick.saturating_sub(slot.last_activity) > timeout_ticks {
					debug!("slot {} timed out", idx)?;
					slot.set_state(ConnState::Closed);
				}
			}
		}
		Ok(())
	}

	fn process_accept(
		config: &EvhConfig,
		listener: Handle,
		pool: &mut ConnPool,
		platform: &mut PlatformContext,
		callback: &mut Option<Pin<Box<OnAccept>>>,
		user_data: &mut Option<Box<dyn Any + Send>>,
		tick: u64,
	) -> Result<(), Error> {
		loop {
			match accept_impl(listener) {
				Ok(Some(handle)) => match pool.alloc() {
					Some(idx) => {
						if let Some(slot) = pool.slot_mut(idx) {
							slot.handle = handle;
							slot.touch(tick);
						}
						if config.nodelay {
							set_nodelay(handle);
						}
						platform.own(handle)?;
						Self::call_on_accept(callback, pool, user_data, tick, idx)?;
					}
					None => {
						// resource exhaustion rejects with a close; no queueing
						warn!("connection rejected: pool exhausted")?;
						close_impl(handle)?;
					}
				},
				Ok(None) => break,
				Err(e) => {
					warn!("accept generated error: {}", e)?;
					break;
				}
			}
		}
		Ok(())
	}

	fn process_write_event(
		handle: Handle,
		pool: &mut ConnPool,
		callback: &mut Option<Pin<Box<OnWriteReady>>>,
		user_data: &mut Option<Box<dyn Any + Send>>,
		tick: u64,
	) -> Result<(), Error> {
		let idx = match pool.find_by_fd(handle) {
			Some(idx) => idx,
			None => return Ok(()),
		};
		let drained = match pool.slot_mut(idx) {
			Some(slot) => match drain_slot(slot) {
				Ok(drained) => drained,
				Err(e) => {
					debug!("drain failed on slot {}: {}", idx, e)?;
					slot.set_state(ConnState::Closed);
					return Ok(());
				}
			},
			None => return Ok(()),
		};
		if drained {
			pool.mark_write_pending(idx, false);
			Self::call_on_write_ready(callback, pool, user_data, tick, idx)?;
			// the callback may have refilled the buffer (data provider, async send)
			let pending = match pool.slot(idx) {
				Some(slot) => slot.sendbuf.has_data(),
				None => false,
			};
			if pending {
				pool.mark_write_pending(idx, true);
			}
		}
		Ok(())
	}

	fn process_read_event(
		handle: Handle,
		pool: &mut ConnPool,
		recv_buf: &mut [u8],
		callback: &mut Option<Pin<Box<OnRead>>>,
		user_data: &mut Option<Box<dyn Any + Send>>,
		tick: u64,
	) -> Result<(), Error> {
		let idx = match pool.find_by_fd(handle) {
			Some(idx) => idx,
			None => return Ok(()),
		};
		loop {
			match read_impl(handle, recv_buf) {
				Ok(Some(0)) => {
					debug!("connection closed on slot {}", idx)?;
					if let Some(slot) = pool.slot_mut(idx) {
						slot.set_state(ConnState::Closed);
					}
					break;
				}
				Ok(Some(rlen)) => {
					if let Some(slot) = pool.slot_mut(idx) {
						slot.touch(tick);
					}
					Self::call_on_read(callback, pool, user_data, tick, idx, &recv_buf[0..rlen])?;
					let state = match pool.slot(idx) {
						Some(slot) => slot.state,
						None => break,
					};
					cbreak!(state == ConnState::Closed || state == ConnState::Free);
				}
				Ok(None) => break,
				Err(e) => {
					debug!("read failed on slot {}: {}", idx, e)?;
					if let Some(slot) = pool.slot_mut(idx) {
						slot.set_state(ConnState::Closed);
					}
					break;
				}
			}
		}
		Ok(())
	}

	// Two-phase close: slots observed Closed have the close callback invoked, the socket
	// closed, and the slot freed. Closing slots become Closed once their buffers drain.
	fn process_closed(
		pool: &mut ConnPool,
		platform: &mut PlatformContext,
		callback: &mut Option<Pin<Box<OnClose>>>,
		user_data: &mut Option<Box<dyn Any + Send>>,
		tick: u64,
		force: bool,
	) -> Result<(), Error> {
		for idx in ConnPool::indexes(pool.active_mask()) {
			let (state, has_data, handle) = match pool.slot(idx) {
				Some(slot) => (slot.state, slot.sendbuf.has_data(), slot.handle),
				None => continue,
			};
			let closed = match state {
				ConnState::Closed => true,
				ConnState::Closing if !has_data => true,
				_ => force,
			};
			if closed {
				Self::call_on_close(callback, pool, user_data, tick, idx)?;
				if handle >= 0 && platform.disown(handle)? {
					close_impl(handle)?;
				}
				pool.free(idx);
			}
		}
		Ok(())
	}

	fn call_on_accept(
		callback: &mut Option<Pin<Box<OnAccept>>>,
		pool: &mut ConnPool,
		user_data: &mut Option<Box<dyn Any + Send>>,
		tick: u64,
		idx: usize,
	) -> Result<(), Error> {
		match callback {
			Some(ref mut on_accept) => {
				let mut ctx = EvhContext {
					pool,
					user_data,
					tick,
				};
				match on_accept(&mut ctx, idx) {
					Ok(_) => {}
					Err(e) => warn!("on_accept callback generated error: {}", e)?,
				}
			}
			None => {
				warn!("no on accept handler!")?;
			}
		}
		Ok(())
	}

	fn call_on_read(
		callback: &mut Option<Pin<Box<OnRead>>>,
		pool: &mut ConnPool,
		user_data: &mut Option<Box<dyn Any + Send>>,
		tick: u64,
		idx: usize,
		data: &[u8],
	) -> Result<(), Error> {
		match callback {
			Some(ref mut on_read) => {
				let mut ctx = EvhContext {
					pool,
					user_data,
					tick,
				};
				match on_read(&mut ctx, idx, data) {
					Ok(_) => {}
					Err(e) => warn!("on_read callback generated error: {}", e)?,
				}
			}
			None => {
				warn!("no on read handler!")?;
			}
		}
		Ok(())
	}

	fn call_on_write_ready(
		callback: &mut Option<Pin<Box<OnWriteReady>>>,
		pool: &mut ConnPool,
		user_data: &mut Option<Box<dyn Any + Send>>,
		tick: u64,
		idx: usize,
	) -> Result<(), Error> {
		match callback {
			Some(ref mut on_write_ready) => {
				let mut ctx = EvhContext {
					pool,
					user_data,
					tick,
				};
				match on_write_ready(&mut ctx, idx) {
					Ok(_) => {}
					Err(e) => warn!("on_write_ready callback generated error: {}", e)?,
				}
			}
			None => {
				warn!("no on write ready handler!")?;
			}
		}
		Ok(())
	}

	fn call_on_close(
		callback: &mut Option<Pin<Box<OnClose>>>,
		pool: &mut ConnPool,
		user_data: &mut Option<Box<dyn Any + Send>>,
		tick: u64,
		idx: usize,
	) -> Result<(), Error> {
		match callback {
			Some(ref mut on_close) => {
				let mut ctx = EvhContext {
					pool,
					user_data,
					tick,
				};
				match on_close(&mut ctx, idx) {
					Ok(_) => {}
					Err(e) => warn!("on_close callback generated error: {}", e)?,
				}
			}
			None => {
				warn!("no on close handler!")?;
			}
		}
		Ok(())
	}

	fn call_on_housekeeper(
		callback: &mut Option<Pin<Box<OnHousekeeper>>>,
		pool: &mut ConnPool,
		user_data: &mut Option<Box<dyn Any + Send>>,
		tick: u64,
	) -> Result<(), Error> {
		match callback {
			Some(ref mut on_housekeeper) => {
				let mut ctx = EvhContext {
					pool,
					user_data,
					tick,
				};
				match on_housekeeper(&mut ctx) {
					Ok(_) => {}
					Err(e) => warn!("on_housekeeper callback generated error: {}", e)?,
				}
			}
			None => {
				warn!("no on housekeeper handler!")?;
			}
		}
		Ok(())
	}
}
