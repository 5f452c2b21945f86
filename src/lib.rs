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

//! # EWS
//!
//! An embedded-class http/1.1 and websocket server for constrained targets. The engine
//! multiplexes a fixed pool of connections through a single-threaded event loop
//! ([`ews_evh`]), parses requests and websocket frames incrementally, routes through a
//! radix tree with parameters, wildcards and middleware, and answers through a
//! per-connection send buffer that preserves ordering under backpressure ([`ews_http`]).
//!
//! The supporting crates follow the same workspace: [`ews_err`] for errors, [`ews_log`]
//! for logging, [`ews_conf`] for configuration and `ews_test` for test tooling. See the
//! demo binary in this crate for a complete server setup.

pub use ews_conf;
pub use ews_err;
pub use ews_evh;
pub use ews_http;
pub use ews_log;
