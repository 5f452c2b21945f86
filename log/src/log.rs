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

use crate::types::{LogConfig, LogImpl};
use crate::{Log, LogBuilder, LogLevel};
use ews_conf::ConfigOptionName as CN;
use ews_conf::{Config, ConfigBuilder, ConfigOption};
use ews_deps::chrono::Local;
use ews_deps::colored::Colorize;
use ews_err::*;
use std::fs::{rename, remove_file, OpenOptions};
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

impl LogBuilder {
	/// Build a [`crate::Log`] implementation from the specified
	/// [`ews_conf::ConfigOption`] list.
	pub fn build_logger(configs: Vec<ConfigOption>) -> Result<Box<dyn Log + Send + Sync>, Error> {
		Ok(Box::new(LogImpl::new(configs)?))
	}
}

impl LogImpl {
	pub(crate) fn new(configs: Vec<ConfigOption>) -> Result<Self, Error> {
		let config = ConfigBuilder::build_config(configs);
		config.check_config(
			vec![
				CN::DisplayColors,
				CN::DisplayStdout,
				CN::DisplayTimestamp,
				CN::DisplayLogLevel,
				CN::DisplayMillis,
				CN::LogFilePath,
				CN::FileHeader,
				CN::MaxSizeBytes,
				CN::MaxAgeMillis,
				CN::AutoRotate,
				CN::DeleteRotation,
			],
			vec![],
		)?;

		let file_path = match config.get(&CN::LogFilePath) {
			Some(ConfigOption::LogFilePath(p)) => p,
			_ => None,
		};

		let config = LogConfig {
			colors: config.get_or_bool(&CN::DisplayColors, true),
			stdout: config.get_or_bool(&CN::DisplayStdout, true),
			timestamp: config.get_or_bool(&CN::DisplayTimestamp, true),
			show_log_level: config.get_or_bool(&CN::DisplayLogLevel, true),
			show_millis: config.get_or_bool(&CN::DisplayMillis, true),
			auto_rotate: config.get_or_bool(&CN::AutoRotate, false),
			delete_rotation: config.get_or_bool(&CN::DeleteRotation, false),
			file_header: config.get_or_string(&CN::FileHeader, "".to_string()),
			max_size_bytes: config.get_or_u64(&CN::MaxSizeBytes, u64::MAX),
			max_age_millis: config.get_or_u64(&CN::MaxAgeMillis, u64::MAX),
			file_path,
		};

		Ok(Self {
			config,
			level: LogLevel::Info,
			file: None,
			cur_size: 0,
			last_rotation: now_millis()?,
			is_init: false,
		})
	}

	fn format_line(&self, level: LogLevel, line: &str, colors: bool) -> String {
		let mut ret = String::new();
		if self.config.timestamp {
			let fmt = if self.config.show_millis {
				"%Y-%m-%d %H:%M:%S%.3f"
			} else {
				"%Y-%m-%d %H:%M:%S"
			};
			ret.push_str(&format!("[{}]", Local::now().format(fmt)));
		}
		if self.config.show_log_level {
			let level_str = match level {
				LogLevel::Trace => "TRACE",
				LogLevel::Debug => "DEBUG",
				LogLevel::Info => "INFO",
				LogLevel::Warn => "WARN",
				LogLevel::Error => "ERROR",
				LogLevel::Fatal => "FATAL",
			};
			let level_str = if colors {
				match level {
					LogLevel::Trace => format!("{}", level_str.magenta()),
					LogLevel::Debug => format!("{}", level_str.cyan()),
					LogLevel::Info => format!("{}", level_str.green()),
					LogLevel::Warn => format!("{}", level_str.yellow()),
					LogLevel::Error => format!("{}", level_str.bright_red()),
					LogLevel::Fatal => format!("{}", level_str.red()),
				}
			} else {
				level_str.to_string()
			};
			if !ret.is_empty() {
				ret.push(' ');
			}
			ret.push_str(&format!("({})", level_str));
		}
		if !ret.is_empty() {
			ret.push_str(": ");
		}
		ret.push_str(line);
		ret.push('\n');
		ret
	}

	fn log_impl(
		&mut self,
		level: LogLevel,
		line: &str,
		plain: bool,
		all: bool,
	) -> Result<(), Error> {
		if !self.is_init {
			return Err(err!(ErrKind::Log, "logger has not been initialized"));
		}
		if (level as usize) < (self.level as usize) {
			return Ok(());
		}

		if self.config.auto_rotate && self.need_rotate()? {
			self.rotate()?;
		}

		if self.config.stdout || all {
			let formatted = if plain {
				format!("{}\n", line)
			} else {
				self.format_line(level, line, self.config.colors)
			};
			print!("{}", formatted);
		}

		if self.file.is_some() {
			// never write terminal colors into the file
			let formatted = if plain {
				format!("{}\n", line)
			} else {
				self.format_line(level, line, false)
			};
			let file = self.file.as_mut().unwrap();
			file.write_all(formatted.as_bytes())?;
			self.cur_size += formatted.len() as u64;
		}

		Ok(())
	}
}

impl Log for LogImpl {
	fn log(&mut self, level: LogLevel, line: &str) -> Result<(), Error> {
		self.log_impl(level, line, false, false)
	}

	fn log_plain(&mut self, level: LogLevel, line: &str) -> Result<(), Error> {
		self.log_impl(level, line, true, false)
	}

	fn log_all(&mut self, level: LogLevel, line: &str) -> Result<(), Error> {
		self.log_impl(level, line, false, true)
	}

	fn set_log_level(&mut self, level: LogLevel) {
		self.level = level;
	}

	fn init(&mut self) -> Result<(), Error> {
		if self.is_init {
			return Err(err!(ErrKind::Log, "logger has already been initialized"));
		}
		if let Some(path) = &self.config.file_path {
			let existed = path.exists();
			let mut file = OpenOptions::new().create(true).append(true).open(path)?;
			if !existed && !self.config.file_header.is_empty() {
				file.write_all(self.config.file_header.as_bytes())?;
				file.write_all(b"\n")?;
			}
			self.cur_size = file.metadata()?.len();
			self.file = Some(file);
		}
		self.is_init = true;
		Ok(())
	}

	fn close(&mut self) -> Result<(), Error> {
		self.file = None;
		self.is_init = false;
		Ok(())
	}

	fn need_rotate(&self) -> Result<bool, Error> {
		if self.file.is_none() {
			return Ok(false);
		}
		let age = now_millis()?.saturating_sub(self.last_rotation);
		Ok(self.cur_size >= self.config.max_size_bytes || age >= self.config.max_age_millis)
	}

	fn rotate(&mut self) -> Result<(), Error> {
		let path = match &self.config.file_path {
			Some(path) => path.clone(),
			None => return Err(err!(ErrKind::Log, "cannot rotate without a log file")),
		};
		self.file = None;

		if self.config.delete_rotation {
			remove_file(&path)?;
		} else {
			let rotated = format!(
				"{}.r_{}",
				path.to_str().unwrap_or("ews.log"),
				now_millis()?
			);
			rename(&path, rotated)?;
		}

		let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
		if !self.config.file_header.is_empty() {
			file.write_all(self.config.file_header.as_bytes())?;
			file.write_all(b"\n")?;
		}
		self.cur_size = file.metadata()?.len();
		self.file = Some(file);
		self.last_rotation = now_millis()?;
		Ok(())
	}
}

pub(crate) fn now_millis() -> Result<u64, Error> {
	Ok(try_into!(SystemTime::now()
		.duration_since(UNIX_EPOCH)?
		.as_millis())?)
}
