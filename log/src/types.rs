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

use ews_err::Error;
use std::fs::File;
use std::path::PathBuf;

/// The log levels of this crate, in increasing order of severity.
#[derive(PartialEq, Copy, Clone, Debug)]
pub enum LogLevel {
	/// Very fine grained data
	Trace,
	/// Debugging data
	Debug,
	/// Standard information
	Info,
	/// Something unexpected happened, but the server can continue
	Warn,
	/// An error occurred
	Error,
	/// The server cannot continue
	Fatal,
}

/// How a line is logged. `Standard` honors the configured display options, `Plain` logs the
/// line with no metadata, and `All` logs to both stdout and the log file regardless of the
/// stdout display setting.
#[derive(PartialEq, Copy, Clone, Debug)]
pub enum LoggingType {
	Standard,
	Plain,
	All,
}

/// The main trait implemented by the ews logger.
pub trait Log {
	/// Log the specified line at the specified level honoring display options.
	fn log(&mut self, level: LogLevel, line: &str) -> Result<(), Error>;
	/// Log with no metadata (no timestamp, level, or colors).
	fn log_plain(&mut self, level: LogLevel, line: &str) -> Result<(), Error>;
	/// Log to both stdout and the configured log file, if any.
	fn log_all(&mut self, level: LogLevel, line: &str) -> Result<(), Error>;
	/// Set the threshold below which lines are ignored.
	fn set_log_level(&mut self, level: LogLevel);
	/// Initialize the logger. Must be called before logging.
	fn init(&mut self) -> Result<(), Error>;
	/// Close the underlying log file, if any.
	fn close(&mut self) -> Result<(), Error>;
	/// Returns true when the log file is due for rotation.
	fn need_rotate(&self) -> Result<bool, Error>;
	/// Rotate the log file.
	fn rotate(&mut self) -> Result<(), Error>;
}

/// Builder struct used to build [`crate::Log`] implementations.
pub struct LogBuilder {}

// Crate local structures

#[derive(Clone)]
pub(crate) struct LogConfig {
	pub(crate) colors: bool,
	pub(crate) stdout: bool,
	pub(crate) timestamp: bool,
	pub(crate) show_log_level: bool,
	pub(crate) show_millis: bool,
	pub(crate) auto_rotate: bool,
	pub(crate) delete_rotation: bool,
	pub(crate) file_path: Option<PathBuf>,
	pub(crate) file_header: String,
	pub(crate) max_size_bytes: u64,
	pub(crate) max_age_millis: u64,
}

pub(crate) struct LogImpl {
	pub(crate) config: LogConfig,
	pub(crate) level: LogLevel,
	pub(crate) file: Option<File>,
	pub(crate) cur_size: u64,
	pub(crate) last_rotation: u64,
	pub(crate) is_init: bool,
}
