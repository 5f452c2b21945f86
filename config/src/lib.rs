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

//! # The EWS Configuration crate
//! This crate defines the [`crate::ConfigOption`] enum and the [`crate::Config`] trait used to
//! configure the other crates in this workspace. Configurations are built with the
//! [`crate::config`] macro or with [`crate::ConfigBuilder::build_config`] and verified with
//! [`crate::Config::check_config`].

mod config;
mod macros;
#[cfg(test)]
mod test;
mod types;

pub use crate::types::{Config, ConfigBuilder, ConfigOption, ConfigOptionName};
