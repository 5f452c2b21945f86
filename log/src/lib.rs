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

//! # The EWS Logging crate
//! This crate implements logging for EWS. Logging is done through the macros in this crate
//! ([`trace`], [`debug`], [`info`], [`warn`], [`error`] and [`fatal`] along with their
//! `_plain` and `_all` variants). Each module sets its own maximum log level by invoking one
//! of the macros with no arguments, i.e. `info!();` at the top of the file. The global logger
//! is configured with the [`log_init`] macro using [`ews_conf::ConfigOption`] values and is
//! lazily initialized with defaults on first use if [`log_init`] is never called.

mod global;
mod log;
mod macros;
#[cfg(test)]
mod test;
mod types;

pub use crate::global::{GlobalLogFunctions, EWS_GLOBAL_LOG};
pub use crate::types::{Log, LogBuilder, LogLevel, LoggingType};
