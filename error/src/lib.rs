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

//! # The EWS Error crate
//! This crate defines the [`crate::Error`] struct and the [`crate::ErrorKind`] enum used
//! throughout EWS. Errors are built with the [`crate::err`] macro and foreign errors are
//! converted with the [`crate::map_err`] macro. The error kinds cover both the engine
//! (connection, parse, frame, routing) and the surrounding infrastructure
//! (configuration, logging, tests).

mod error;
mod macros;
#[cfg(test)]
mod test;
mod types;

pub use crate::types::{ErrKind, Error, ErrorKind};
