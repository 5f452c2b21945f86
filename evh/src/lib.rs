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

//! # The EWS Event Handler crate
//! This crate implements the non-blocking connection engine used by the EWS http server: a
//! fixed pool of connection slots tracked by word-sized bitmasks, a per-connection send
//! buffer that preserves submission order under backpressure, and a single-threaded event
//! loop that multiplexes the listener and every active connection through one readiness
//! wait. Callbacks ([`crate::EventLoop::set_on_accept`], [`crate::EventLoop::set_on_read`],
//! [`crate::EventLoop::set_on_write_ready`], [`crate::EventLoop::set_on_close`] and
//! [`crate::EventLoop::set_on_housekeeper`]) all execute on the loop task and may only
//! suspend through the non-blocking primitives provided by [`crate::EvhContext`].
//!
//! # Example
//!
//!```no_run
//! use ews_conf::ConfigOption::*;
//! use ews_err::*;
//! use ews_evh::*;
//!
//! fn main() -> Result<(), Error> {
//!     let mut evh = EvhBuilder::build_event_loop(vec![Port(8081), MaxConnections(8)])?;
//!
//!     evh.set_on_accept(move |_ctx, idx| Ok(()))?;
//!     evh.set_on_read(move |ctx, idx, data| {
//!         let data = data.to_vec();
//!         ctx.send(idx, &data)?;
//!         Ok(())
//!     })?;
//!     evh.set_on_write_ready(move |_ctx, _idx| Ok(()))?;
//!     evh.set_on_close(move |_ctx, _idx| Ok(()))?;
//!     evh.set_on_housekeeper(move |_ctx| Ok(()))?;
//!
//!     evh.start()?;
//!     evh.stop()?;
//!     Ok(())
//! }
//!```

mod builder;
mod constants;
mod evh;
#[cfg(target_os = "linux")]
mod linux;
mod pool;
mod sendbuf;
#[cfg(test)]
mod test;
mod types;

pub use crate::constants::{
	CONN_FLAG_DEFERRED, CONN_FLAG_DEFER_PAUSED, CONN_FLAG_KEEP_ALIVE, CONN_FLAG_UPGRADE_PENDING,
	CONN_FLAG_WEBSOCKET, EVH_DEFAULT_ADDR, EVH_DEFAULT_BACKLOG, EVH_DEFAULT_MAX_CONNECTIONS,
	EVH_DEFAULT_PORT, EVH_DEFAULT_RECV_BUFFER_SIZE, EVH_DEFAULT_SELECT_TIMEOUT_MILLIS,
	EVH_DEFAULT_TIMEOUT_MILLIS, EVH_MAX_CONNECTIONS, SEND_BUF_SIZE,
};
#[cfg(target_os = "linux")]
pub use crate::linux::Handle;
pub use crate::sendbuf::SendBuf;
pub use crate::evh::{socket_recv, socket_recv_blocking};
pub use crate::pool::ConnPool;
pub use crate::types::{
	ConnSlot, ConnState, EventLoop, EvhBuilder, EvhContext, EvhController, INVALID_HANDLE,
};
