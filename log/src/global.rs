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

use crate::{Log, LogBuilder, LogLevel, LoggingType};
use ews_conf::ConfigOption;
use ews_deps::lazy_static::lazy_static;
use ews_err::*;
use std::sync::{Arc, RwLock};

// Holder for the global logger
#[doc(hidden)]
pub struct GlobalLogFunctions {}

// global logger
lazy_static! {
	#[doc(hidden)]
	pub static ref EWS_GLOBAL_LOG: Arc<RwLock<Option<Box<dyn Log + Send + Sync>>>> =
		Arc::new(RwLock::new(None));
}

impl GlobalLogFunctions {
	pub fn log(
		level: LogLevel,
		line: &str,
		global_level: LogLevel,
		logging_type: LoggingType,
	) -> Result<(), Error> {
		if level as usize >= global_level as usize {
			Self::check_init()?; // check if we need to init with defaults
			let mut log = EWS_GLOBAL_LOG.write()?;

			// unwrap is ok because check_init ensures there's a logger
			match logging_type {
				LoggingType::Standard => (*log).as_mut().unwrap().log(level, line)?,
				LoggingType::Plain => (*log).as_mut().unwrap().log_plain(level, line)?,
				LoggingType::All => (*log).as_mut().unwrap().log_all(level, line)?,
			}
		}
		Ok(())
	}

	pub fn init(values: Vec<ConfigOption>) -> Result<(), Error> {
		let mut log = EWS_GLOBAL_LOG.write()?;
		if (*log).is_some() {
			let text = "global logger has already been initialized";
			return Err(err!(ErrKind::Log, text));
		}
		let mut logger = LogBuilder::build_logger(values)?;
		logger.set_log_level(LogLevel::Trace);
		logger.init()?;
		(*log) = Some(logger);
		Ok(())
	}

	pub fn set_log_level(level: LogLevel) -> Result<(), Error> {
		Self::check_init()?;
		let mut log = EWS_GLOBAL_LOG.write()?;
		(*log).as_mut().unwrap().set_log_level(level);
		Ok(())
	}

	pub fn rotate() -> Result<(), Error> {
		let mut log = EWS_GLOBAL_LOG.write()?;
		match (*log).as_mut() {
			Some(logger) => logger.rotate(),
			None => {
				let text = "global logger has not been initialized";
				Err(err!(ErrKind::Log, text))
			}
		}
	}

	pub fn need_rotate() -> Result<bool, Error> {
		let log = EWS_GLOBAL_LOG.read()?;
		match (*log).as_ref() {
			Some(logger) => logger.need_rotate(),
			None => {
				let text = "global logger has not been initialized";
				Err(err!(ErrKind::Log, text))
			}
		}
	}

	fn check_init() -> Result<(), Error> {
		let mut log = EWS_GLOBAL_LOG.write()?;
		if (*log).is_none() {
			let mut logger = LogBuilder::build_logger(vec![])?;
			logger.set_log_level(LogLevel::Trace);
			logger.init()?;
			(*log) = Some(logger);
		}
		Ok(())
	}
}
