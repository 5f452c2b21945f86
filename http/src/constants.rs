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

// Request parsing caps. Header storage doubles as the hard cap on total header bytes.
pub(crate) const MAX_HEADERS: usize = 32;
pub(crate) const HEADER_STORAGE_SIZE: usize = 2048;
pub(crate) const MAX_URI_LEN: usize = 512;
pub(crate) const BODY_PREFETCH_SIZE: usize = 1024;
pub(crate) const MAX_QUERY_PARAMS: usize = 8;
pub(crate) const MAX_CONTENT_LENGTH: u64 = u32::MAX as u64;

// Routing caps.
pub const HTTP_MAX_ROUTE_PARAMS: usize = 8;
pub const HTTP_DEFAULT_MAX_MIDDLEWARE_PER_ROUTER: usize = 8;
pub const HTTP_DEFAULT_MAX_ROUTE_MIDDLEWARE: usize = 4;
pub const HTTP_DEFAULT_MAX_TOTAL_MIDDLEWARE: usize = 16;
pub const HTTP_DEFAULT_MAX_CHANNELS: usize = 32;

// Websocket engine caps: no frame payload above 64 KB - 1, and message assembly stops
// growing at the hard ceiling.
pub(crate) const WS_MAX_FRAME_PAYLOAD: usize = 65_535;
pub(crate) const WS_PAYLOAD_CEILING: usize = 8_192;
pub(crate) const WS_CONTROL_MAX_PAYLOAD: usize = 125;

pub(crate) const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

pub(crate) const FIN_BIT: u8 = 0x80;
pub(crate) const OP_CODE_MASK: u8 = 0x0f;
pub(crate) const MASK_BIT: u8 = 0x80;

pub(crate) const WS_OP_CONTINUATION: u8 = 0x0;
pub(crate) const WS_OP_TEXT: u8 = 0x1;
pub(crate) const WS_OP_BINARY: u8 = 0x2;
pub(crate) const WS_OP_CLOSE: u8 = 0x8;
pub(crate) const WS_OP_PING: u8 = 0x9;
pub(crate) const WS_OP_PONG: u8 = 0xA;

pub(crate) const HTTP_SERVER_NAME: &str = "EWS";
pub(crate) const HTTP_RECV_BODY_TIMEOUT_MILLIS: u64 = 30_000;
