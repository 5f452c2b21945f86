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

use std::collections::HashMap;
use std::path::PathBuf;

/// The names of the configuration options. These are used with
/// [`crate::Config::get`] and [`crate::Config::check_config`] to refer to options
/// without their values.
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum ConfigOptionName {
	DisplayColors,
	DisplayStdout,
	DisplayTimestamp,
	DisplayLogLevel,
	DisplayMillis,
	LogFilePath,
	MaxSizeBytes,
	MaxAgeMillis,
	AutoRotate,
	DeleteRotation,
	FileHeader,
	Port,
	Addr,
	Backlog,
	TimeoutMillis,
	SelectTimeoutMillis,
	RecvBufferSize,
	Nodelay,
	ReuseAddr,
	MaxConnections,
	MaxChannels,
	MaxRouteParams,
	MaxMiddlewarePerRouter,
	MaxRouteMiddleware,
	MaxTotalMiddleware,
	ServerName,
	HttpDir,
	StrictSlash,
	CaseSensitive,
	WsPingIntervalMillis,
	Debug,
}

/// Configuration options used throughout EWS via macro.
#[derive(PartialEq, Clone, Debug)]
pub enum ConfigOption {
	DisplayColors(bool),
	DisplayStdout(bool),
	DisplayTimestamp(bool),
	DisplayLogLevel(bool),
	DisplayMillis(bool),
	LogFilePath(Option<PathBuf>),
	MaxSizeBytes(u64),
	MaxAgeMillis(u64),
	AutoRotate(bool),
	DeleteRotation(bool),
	FileHeader(String),
	Port(u16),
	Addr(String),
	Backlog(usize),
	TimeoutMillis(u64),
	SelectTimeoutMillis(u64),
	RecvBufferSize(usize),
	Nodelay(bool),
	ReuseAddr(bool),
	MaxConnections(usize),
	MaxChannels(usize),
	MaxRouteParams(usize),
	MaxMiddlewarePerRouter(usize),
	MaxRouteMiddleware(usize),
	MaxTotalMiddleware(usize),
	ServerName(String),
	HttpDir(String),
	StrictSlash(bool),
	CaseSensitive(bool),
	WsPingIntervalMillis(u64),
	Debug(bool),
}

/// The config trait allows for easy construction of configurations. Configurations can be
/// retrieved with the [`crate::Config::get`] function and configurations can be checked with
/// the [`crate::Config::check_config`] function.
pub trait Config {
	/// Get a configuration option if it exists or [`std::option::Option::None`] if no
	/// configuration with this name exists.
	fn get(&self, name: &ConfigOptionName) -> Option<ConfigOption>;
	/// Gets a [`bool`] configuration option or the specified default.
	fn get_or_bool(&self, name: &ConfigOptionName, default: bool) -> bool;
	/// Gets a [`u16`] configuration option or the specified default.
	fn get_or_u16(&self, name: &ConfigOptionName, default: u16) -> u16;
	/// Gets a [`u64`] configuration option or the specified default.
	fn get_or_u64(&self, name: &ConfigOptionName, default: u64) -> u64;
	/// Gets a [`usize`] configuration option or the specified default.
	fn get_or_usize(&self, name: &ConfigOptionName, default: usize) -> usize;
	/// Gets a [`std::string::String`] configuration option or the specified default.
	fn get_or_string(&self, name: &ConfigOptionName, default: String) -> String;
	/// Check this configuration. All specified options must be in the `allowed` list and all
	/// options in the `required` list must be present. Duplicates result in an error.
	fn check_config(
		&self,
		allowed: Vec<ConfigOptionName>,
		required: Vec<ConfigOptionName>,
	) -> Result<(), ews_err::Error>;
}

/// Builder struct used to build [`crate::Config`] implementations.
pub struct ConfigBuilder {}

// Crate local structures

#[derive(Clone, Debug)]
pub(crate) struct ConfigImpl {
	pub(crate) configs: Vec<ConfigOption>,
	pub(crate) hash: HashMap<ConfigOptionName, ConfigOption>,
}
