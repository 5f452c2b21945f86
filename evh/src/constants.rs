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

// The three pool bitmasks are single u32 words, so the pool can never exceed 32 slots.
pub const EVH_MAX_CONNECTIONS: usize = 32;

// One page per connection. Everything queued for a connection flows through this ring.
pub const SEND_BUF_SIZE: usize = 2048;

// Sends at or below this size never trigger an opportunistic drain when bytes are already
// queued; they are appended to the ring so ordering is preserved cheaply.
pub const SMALL_SEND_THRESHOLD: usize = 64;

pub const EVH_DEFAULT_PORT: u16 = 80;
pub const EVH_DEFAULT_ADDR: &str = "127.0.0.1";
pub const EVH_DEFAULT_BACKLOG: usize = 5;
pub const EVH_DEFAULT_TIMEOUT_MILLIS: u64 = 30_000;
pub const EVH_DEFAULT_SELECT_TIMEOUT_MILLIS: u64 = 1_000;
pub const EVH_DEFAULT_RECV_BUFFER_SIZE: usize = 1_024;
pub const EVH_DEFAULT_MAX_CONNECTIONS: usize = 32;

// Bounded time the loop keeps servicing websocket connections after stop is requested.
pub const EVH_WS_DRAIN_MILLIS: u64 = 2_000;

// How long a blocking send waits for writability before giving up.
pub const EVH_SEND_ALL_TIMEOUT_MILLIS: u64 = 30_000;

pub(crate) const MAX_RET_HANDLES: usize = 100;

// Connection slot flags.
pub const CONN_FLAG_KEEP_ALIVE: u8 = 0x1;
pub const CONN_FLAG_WEBSOCKET: u8 = 0x2;
pub const CONN_FLAG_UPGRADE_PENDING: u8 = 0x4;
pub const CONN_FLAG_DEFERRED: u8 = 0x8;
pub const CONN_FLAG_DEFER_PAUSED: u8 = 0x10;
