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

use crate::types::ConfigImpl;
use crate::{Config, ConfigBuilder, ConfigOption, ConfigOptionName};
use ews_err::*;
use std::collections::{HashMap, HashSet};

impl ConfigBuilder {
	/// Build a [`crate::Config`] implementation from the specified option list. The last
	/// value wins when the same option is specified more than once; duplicates are reported
	/// by [`crate::Config::check_config`].
	pub fn build_config(options: Vec<ConfigOption>) -> impl Config {
		let mut hash = HashMap::new();
		for option in &options {
			hash.insert(option.name(), option.clone());
		}
		ConfigImpl {
			configs: options,
			hash,
		}
	}
}

impl ConfigOption {
	/// Return the [`crate::ConfigOptionName`] for this option.
	pub fn name(&self) -> ConfigOptionName {
		use ConfigOption as CO;
		use ConfigOptionName as CN;
		match self {
			CO::DisplayColors(_) => CN::DisplayColors,
			CO::DisplayStdout(_) => CN::DisplayStdout,
			CO::DisplayTimestamp(_) => CN::DisplayTimestamp,
			CO::DisplayLogLevel(_) => CN::DisplayLogLevel,
			CO::DisplayMillis(_) => CN::DisplayMillis,
			CO::LogFilePath(_) => CN::LogFilePath,
			CO::MaxSizeBytes(_) => CN::MaxSizeBytes,
			CO::MaxAgeMillis(_) => CN::MaxAgeMillis,
			CO::AutoRotate(_) => CN::AutoRotate,
			CO::DeleteRotation(_) => CN::DeleteRotation,
			CO::FileHeader(_) => CN::FileHeader,
			CO::Port(_) => CN::Port,
			CO::Addr(_) => CN::Addr,
			CO::Backlog(_) => CN::Backlog,
			CO::TimeoutMillis(_) => CN::TimeoutMillis,
			CO::SelectTimeoutMillis(_) => CN::SelectTimeoutMillis,
			CO::RecvBufferSize(_) => CN::RecvBufferSize,
			CO::Nodelay(_) => CN::Nodelay,
			CO::ReuseAddr(_) => CN::ReuseAddr,
			CO::MaxConnections(_) => CN::MaxConnections,
			CO::MaxChannels(_) => CN::MaxChannels,
			CO::MaxRouteParams(_) => CN::MaxRouteParams,
			CO::MaxMiddlewarePerRouter(_) => CN::MaxMiddlewarePerRouter,
			CO::MaxRouteMiddleware(_) => CN::MaxRouteMiddleware,
			CO::MaxTotalMiddleware(_) => CN::MaxTotalMiddleware,
			CO::ServerName(_) => CN::ServerName,
			CO::HttpDir(_) => CN::HttpDir,
			CO::StrictSlash(_) => CN::StrictSlash,
			CO::CaseSensitive(_) => CN::CaseSensitive,
			CO::WsPingIntervalMillis(_) => CN::WsPingIntervalMillis,
			CO::Debug(_) => CN::Debug,
		}
	}
}

impl Config for ConfigImpl {
	fn get(&self, name: &ConfigOptionName) -> Option<ConfigOption> {
		self.hash.get(name).cloned()
	}

	fn get_or_bool(&self, name: &ConfigOptionName, default: bool) -> bool {
		match self.get(name) {
			Some(option) => match option {
				ConfigOption::DisplayColors(v)
				| ConfigOption::DisplayStdout(v)
				| ConfigOption::DisplayTimestamp(v)
				| ConfigOption::DisplayLogLevel(v)
				| ConfigOption::DisplayMillis(v)
				| ConfigOption::AutoRotate(v)
				| ConfigOption::DeleteRotation(v)
				| ConfigOption::Nodelay(v)
				| ConfigOption::ReuseAddr(v)
				| ConfigOption::StrictSlash(v)
				| ConfigOption::CaseSensitive(v)
				| ConfigOption::Debug(v) => v,
				_ => default,
			},
			None => default,
		}
	}

	fn get_or_u16(&self, name: &ConfigOptionName, default: u16) -> u16 {
		match self.get(name) {
			Some(ConfigOption::Port(v)) => v,
			_ => default,
		}
	}

	fn get_or_u64(&self, name: &ConfigOptionName, default: u64) -> u64 {
		match self.get(name) {
			Some(option) => match option {
				ConfigOption::MaxSizeBytes(v)
				| ConfigOption::MaxAgeMillis(v)
				| ConfigOption::TimeoutMillis(v)
				| ConfigOption::SelectTimeoutMillis(v)
				| ConfigOption::WsPingIntervalMillis(v) => v,
				_ => default,
			},
			None => default,
		}
	}

	fn get_or_usize(&self, name: &ConfigOptionName, default: usize) -> usize {
		match self.get(name) {
			Some(option) => match option {
				ConfigOption::Backlog(v)
				| ConfigOption::RecvBufferSize(v)
				| ConfigOption::MaxConnections(v)
				| ConfigOption::MaxChannels(v)
				| ConfigOption::MaxRouteParams(v)
				| ConfigOption::MaxMiddlewarePerRouter(v)
				| ConfigOption::MaxRouteMiddleware(v)
				| ConfigOption::MaxTotalMiddleware(v) => v,
				_ => default,
			},
			None => default,
		}
	}

	fn get_or_string(&self, name: &ConfigOptionName, default: String) -> String {
		match self.get(name) {
			Some(option) => match option {
				ConfigOption::FileHeader(v)
				| ConfigOption::Addr(v)
				| ConfigOption::ServerName(v)
				| ConfigOption::HttpDir(v) => v,
				_ => default,
			},
			None => default,
		}
	}

	fn check_config(
		&self,
		allowed: Vec<ConfigOptionName>,
		required: Vec<ConfigOptionName>,
	) -> Result<(), Error> {
		let mut seen = HashSet::new();
		for config in &self.configs {
			let name = config.name();
			if !allowed.contains(&name) {
				let text = format!("'{:?}' is not allowed here", name);
				return Err(err!(ErrKind::Configuration, text));
			}
			if !seen.insert(name.clone()) {
				let text = format!("'{:?}' was specified more than once", name);
				return Err(err!(ErrKind::Configuration, text));
			}
		}
		for name in required {
			if !seen.contains(&name) {
				let text = format!("'{:?}' is required but was not specified", name);
				return Err(err!(ErrKind::Configuration, text));
			}
		}
		Ok(())
	}
}
