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

use ews_deps::failure::{Context, Fail};

/// Base Error struct which is used throughout EWS.
#[derive(Debug, Fail)]
pub struct Error {
	pub(crate) inner: Context<ErrorKind>,
}

/// Kinds of errors that can occur.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
	/// IO Error
	#[fail(display = "IO Error: {}", _0)]
	IO(String),
	/// Log Error
	#[fail(display = "Log Error: {}", _0)]
	Log(String),
	/// UTF8 Error
	#[fail(display = "UTF8 Error: {}", _0)]
	Utf8(String),
	/// Configuration Error
	#[fail(display = "Configuration Error: {}", _0)]
	Configuration(String),
	/// Poison error multiple locks
	#[fail(display = "Poison Error: {}", _0)]
	Poison(String),
	/// Timeout
	#[fail(display = "Timeout: {}", _0)]
	Timeout(String),
	/// Capacity Exceeded
	#[fail(display = "Capacity Exceeded: {}", _0)]
	CapacityExceeded(String),
	/// IllegalArgument
	#[fail(display = "IllegalArgument: {}", _0)]
	IllegalArgument(String),
	/// Miscellaneous Error
	#[fail(display = "Miscellaneous Error: {}", _0)]
	Misc(String),
	/// Illegal State
	#[fail(display = "Illegal State Error: {}", _0)]
	IllegalState(String),
	/// Simulated Error used in testing
	#[fail(display = "simulated test error: {}", _0)]
	Test(String),
	/// Overflow error
	#[fail(display = "overflow error: {}", _0)]
	Overflow(String),
	/// Errno system error
	#[fail(display = "errno error: {}", _0)]
	Errno(String),
	/// Resource not found
	#[fail(display = "not found: {}", _0)]
	NotFound(String),
	/// The peer closed the connection
	#[fail(display = "connection closed: {}", _0)]
	ConnClosed(String),
	/// The server is already running
	#[fail(display = "already running: {}", _0)]
	AlreadyRunning(String),
	/// The server is not running
	#[fail(display = "not running: {}", _0)]
	NotRunning(String),
	/// Middleware error
	#[fail(display = "middleware error: {}", _0)]
	Middleware(String),
	/// Wire protocol violation
	#[fail(display = "protocol error: {}", _0)]
	Protocol(String),
	/// Http request parse error
	#[fail(display = "parse error: {}", _0)]
	Parse(String),
	/// WebSocket frame error
	#[fail(display = "websocket frame error: {}", _0)]
	WsFrame(String),
	/// WebSocket close frame received
	#[fail(display = "websocket close: {}", _0)]
	WsClose(String),
}

/// The kinds of errors in this crate. This enum is used to map to error
/// names using the [`crate::err`] and [`crate::map_err`] macros.
pub enum ErrKind {
	/// IO Error
	IO,
	/// Log Error
	Log,
	/// UTF8 Error
	Utf8,
	/// Configuration Error
	Configuration,
	/// Poison Error
	Poison,
	/// Timeout Error
	Timeout,
	/// Capacity Exceeded Error
	CapacityExceeded,
	/// IllegalArgument Error
	IllegalArgument,
	/// Miscellaneous Error
	Misc,
	/// IllegalState Error
	IllegalState,
	/// Test Error
	Test,
	/// Overflow Error
	Overflow,
	/// Errno Error
	Errno,
	/// NotFound Error
	NotFound,
	/// ConnClosed Error
	ConnClosed,
	/// AlreadyRunning Error
	AlreadyRunning,
	/// NotRunning Error
	NotRunning,
	/// Middleware Error
	Middleware,
	/// Protocol Error
	Protocol,
	/// Parse Error
	Parse,
	/// WsFrame Error
	WsFrame,
	/// WsClose Error
	WsClose,
}
