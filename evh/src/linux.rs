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
use crate::types::{Event, EventIn, EventType, EventTypeIn, EvhConfig};
use ews_deps::bitvec::vec::BitVec;
use ews_deps::errno::{errno, set_errno, Errno};
use ews_deps::libc::{
	self, accept, c_int, c_void, close, fcntl, listen, read, sockaddr, socket, write, F_SETFL,
	O_NONBLOCK,
};
use ews_deps::nix::poll::{poll, PollFd, PollFlags};
use ews_deps::nix::sys::socket::{bind, SockaddrIn, SockaddrIn6};
use ews_err::*;
use ews_log::*;
use std::mem::{size_of, zeroed};
use std::os::fd::RawFd;
use std::str::FromStr;

info!();

/// Opaque socket handle used throughout the engine. A negative value means "no socket".
pub type Handle = RawFd;

// Platform side of the event loop: the poll set rebuilt each iteration and a bit per handle
// recording which handles the loop currently owns (guards against double close).
pub(crate) struct PlatformContext {
	interest: Vec<(Handle, PollFlags)>,
	pollfds: Vec<PollFd>,
	owned_set: BitVec,
}

impl PlatformContext {
	pub(crate) fn new() -> Result<Self, Error> {
		Ok(Self {
			interest: Vec::with_capacity(MAX_RET_HANDLES),
			pollfds: Vec::with_capacity(MAX_RET_HANDLES),
			owned_set: BitVec::new(),
		})
	}

	pub(crate) fn own(&mut self, handle: Handle) -> Result<(), Error> {
		let handle_as_usize: usize = try_into!(handle)?;
		if handle_as_usize >= self.owned_set.len() {
			self.owned_set.resize(handle_as_usize + 100, false);
		}
		self.owned_set.replace(handle_as_usize, true);
		Ok(())
	}

	pub(crate) fn disown(&mut self, handle: Handle) -> Result<bool, Error> {
		let handle_as_usize: usize = try_into!(handle)?;
		if handle_as_usize >= self.owned_set.len() {
			return Ok(false);
		}
		Ok(self.owned_set.replace(handle_as_usize, false))
	}
}

pub(crate) fn write_impl(handle: Handle, buf: &[u8]) -> Result<Option<usize>, Error> {
	set_errno(Errno(0));
	let cbuf: *const c_void = buf as *const _ as *const c_void;
	let wlen = unsafe { write(handle, cbuf, buf.len()) };

	if wlen < 0 {
		let e = errno();
		if e.0 == libc::EAGAIN || e.0 == libc::EWOULDBLOCK {
			Ok(None)
		} else {
			let text = format!(
				"I/O error occurred while writing handle {}. Error msg: {}",
				handle, e
			);
			Err(err!(ErrKind::IO, text))
		}
	} else {
		Ok(Some(try_into!(wlen)?))
	}
}

pub(crate) fn read_impl(handle: Handle, buf: &mut [u8]) -> Result<Option<usize>, Error> {
	set_errno(Errno(0));
	let cbuf: *mut c_void = buf as *mut _ as *mut c_void;
	let rlen = unsafe { read(handle, cbuf, buf.len()) };

	if rlen < 0 {
		let e = errno();
		if e.0 == libc::EAGAIN || e.0 == libc::EWOULDBLOCK {
			Ok(None)
		} else {
			let text = format!(
				"I/O error occurred while reading handle {}. Error msg: {}",
				handle, e
			);
			Err(err!(ErrKind::IO, text))
		}
	} else {
		Ok(Some(try_into!(rlen)?))
	}
}

pub(crate) fn close_impl(handle: Handle) -> Result<(), Error> {
	debug!("closing {}", handle)?;
	set_errno(Errno(0));
	unsafe {
		close(handle);
	}
	Ok(())
}

pub(crate) fn accept_impl(fd: Handle) -> Result<Option<Handle>, Error> {
	set_errno(Errno(0));
	let handle = unsafe {
		accept(
			fd,
			&mut sockaddr { ..zeroed() },
			&mut (size_of::<sockaddr>() as u32).try_into()?,
		)
	};

	debug!("accept handle = {}", handle)?;

	if handle < 0 {
		if errno().0 == libc::EAGAIN || errno().0 == libc::EWOULDBLOCK {
			// would block, nothing more to accept
			return Ok(None);
		}
		let fmt = format!("accept failed: {}", errno());
		return Err(err!(ErrKind::IO, fmt));
	}

	unsafe {
		fcntl(handle, F_SETFL, O_NONBLOCK);
	}

	Ok(Some(handle))
}

pub(crate) fn set_nodelay(handle: Handle) {
	unsafe {
		let optval: libc::c_int = 1;
		libc::setsockopt(
			handle,
			libc::IPPROTO_TCP,
			libc::TCP_NODELAY,
			&optval as *const _ as *const libc::c_void,
			std::mem::size_of_val(&optval) as libc::socklen_t,
		);
	}
}

pub(crate) fn create_listener(addr: &str, size: usize, reuseaddr: bool) -> Result<Handle, Error> {
	set_errno(Errno(0));
	let fd = match SockaddrIn::from_str(addr) {
		Ok(sock_addr) => {
			let fd = unsafe { socket(libc::AF_INET, libc::SOCK_STREAM, 0) };

			if reuseaddr {
				unsafe {
					let optval: libc::c_int = 1;
					libc::setsockopt(
						fd,
						libc::SOL_SOCKET,
						libc::SO_REUSEADDR,
						&optval as *const _ as *const libc::c_void,
						std::mem::size_of_val(&optval) as libc::socklen_t,
					);
				}
			}

			bind(fd, &sock_addr)?;
			fd
		}
		Err(_) => {
			let sock_addr = SockaddrIn6::from_str(addr)?;
			let fd = unsafe { socket(libc::AF_INET6, libc::SOCK_STREAM, 0) };

			if reuseaddr {
				unsafe {
					let optval: libc::c_int = 1;
					libc::setsockopt(
						fd,
						libc::SOL_SOCKET,
						libc::SO_REUSEADDR,
						&optval as *const _ as *const libc::c_void,
						std::mem::size_of_val(&optval) as libc::socklen_t,
					);
				}
			}

			bind(fd, &sock_addr)?;
			fd
		}
	};

	unsafe {
		if listen(fd, try_into!(size)?) != 0 {
			return Err(err!(ErrKind::IO, "listen failed"));
		}
		fcntl(fd, F_SETFL, O_NONBLOCK);
	}
	debug!("ret fd = {}", fd)?;
	Ok(fd)
}

// Readiness wait. The interest set is rebuilt from `in_events` on every call, which is the
// natural model for a pool capped at one mask word of connections.
pub(crate) fn get_events(
	config: &EvhConfig,
	ctx: &mut PlatformContext,
	in_events: &[EventIn],
	ret_events: &mut [Event; MAX_RET_HANDLES],
) -> Result<usize, Error> {
	ctx.interest.clear();

	for evt in in_events {
		let flag = match evt.etype {
			EventTypeIn::Read => PollFlags::POLLIN,
			EventTypeIn::Write => PollFlags::POLLOUT,
		};
		match ctx
			.interest
			.iter_mut()
			.find(|(handle, _)| *handle == evt.handle)
		{
			Some((_, flags)) => *flags |= flag,
			None => ctx.interest.push((evt.handle, flag)),
		}
	}

	ctx.pollfds.clear();
	for (handle, flags) in &ctx.interest {
		ctx.pollfds.push(PollFd::new(*handle, *flags));
	}

	let timeout: c_int = try_into!(config.select_timeout_millis)?;
	let results = poll(&mut ctx.pollfds, timeout)?;

	let mut ret_event_count = 0;
	if results > 0 {
		for (i, pollfd) in ctx.pollfds.iter().enumerate() {
			if ret_event_count >= MAX_RET_HANDLES {
				break;
			}
			let revents = match pollfd.revents() {
				Some(revents) => revents,
				None => continue,
			};
			let is_write = revents.contains(PollFlags::POLLOUT);
			// errors and hangups surface as read events so the read path observes EOF
			let is_read = revents.contains(PollFlags::POLLIN)
				|| revents.contains(PollFlags::POLLERR)
				|| revents.contains(PollFlags::POLLHUP);
			let etype = match (is_read, is_write) {
				(true, true) => EventType::ReadWrite,
				(true, false) => EventType::Read,
				(false, true) => EventType::Write,
				(false, false) => continue,
			};
			ret_events[ret_event_count] = Event::new(ctx.interest[i].0, etype);
			ret_event_count += 1;
		}
	}

	Ok(ret_event_count)
}

// Block until the handle becomes writable or the timeout elapses. Used only by the legacy
// blocking send path.
pub(crate) fn wait_writable(handle: Handle, timeout_millis: u64) -> Result<(), Error> {
	let mut pollfds = [PollFd::new(handle, PollFlags::POLLOUT)];
	let timeout: c_int = try_into!(timeout_millis)?;
	let results = poll(&mut pollfds, timeout)?;
	if results == 0 {
		let text = format!("handle {} did not become writable", handle);
		return Err(err!(ErrKind::Timeout, text));
	}
	Ok(())
}

// Block until the handle becomes readable or the timeout elapses. Used by the synchronous
// body-read path.
pub(crate) fn wait_readable(handle: Handle, timeout_millis: u64) -> Result<(), Error> {
	let mut pollfds = [PollFd::new(handle, PollFlags::POLLIN)];
	let timeout: c_int = try_into!(timeout_millis)?;
	let results = poll(&mut pollfds, timeout)?;
	if results == 0 {
		let text = format!("handle {} did not become readable", handle);
		return Err(err!(ErrKind::Timeout, text));
	}
	Ok(())
}
