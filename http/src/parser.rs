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

use crate::constants::*;
use crate::types::{HeaderIdx, HttpMethod, ParseResult, ParseState, RequestCtx};

// Recognized header classes. Classification is case-insensitive; anything else is stored
// opaquely and only reachable by name lookup.
#[derive(PartialEq, Copy, Clone, Debug)]
pub(crate) enum HeaderClass {
	Host,
	ContentLength,
	ContentType,
	Connection,
	Upgrade,
	SecWebSocketKey,
	SecWebSocketVersion,
	Authorization,
	Cookie,
	Accept,
	UserAgent,
	Origin,
	AccessControlRequest,
	Other,
}

pub(crate) fn classify(key: &[u8]) -> HeaderClass {
	if key.eq_ignore_ascii_case(b"host") {
		HeaderClass::Host
	} else if key.eq_ignore_ascii_case(b"content-length") {
		HeaderClass::ContentLength
	} else if key.eq_ignore_ascii_case(b"content-type") {
		HeaderClass::ContentType
	} else if key.eq_ignore_ascii_case(b"connection") {
		HeaderClass::Connection
	} else if key.eq_ignore_ascii_case(b"upgrade") {
		HeaderClass::Upgrade
	} else if key.eq_ignore_ascii_case(b"sec-websocket-key") {
		HeaderClass::SecWebSocketKey
	} else if key.eq_ignore_ascii_case(b"sec-websocket-version") {
		HeaderClass::SecWebSocketVersion
	} else if key.eq_ignore_ascii_case(b"authorization") {
		HeaderClass::Authorization
	} else if key.eq_ignore_ascii_case(b"cookie") {
		HeaderClass::Cookie
	} else if key.eq_ignore_ascii_case(b"accept") {
		HeaderClass::Accept
	} else if key.eq_ignore_ascii_case(b"user-agent") {
		HeaderClass::UserAgent
	} else if key.eq_ignore_ascii_case(b"origin") {
		HeaderClass::Origin
	} else if key.len() >= 22 && key[0..22].eq_ignore_ascii_case(b"access-control-request") {
		HeaderClass::AccessControlRequest
	} else {
		HeaderClass::Other
	}
}

impl RequestCtx {
	pub(crate) fn new() -> Self {
		Self {
			state: ParseState::Method,
			error_code: 400,
			method: HttpMethod::GET,
			uri: Vec::with_capacity(MAX_URI_LEN),
			path_len: 0,
			query_off: 0,
			query_len: 0,
			header_storage: Vec::with_capacity(HEADER_STORAGE_SIZE),
			headers: [HeaderIdx::default(); MAX_HEADERS],
			header_count: 0,
			header_bytes: 0,
			cur_off: 0,
			content_length: 0,
			bytes_received: 0,
			keep_alive: true,
			upgrade_ws_pending: false,
			ws_key: vec![],
			prefetch: Vec::with_capacity(BODY_PREFETCH_SIZE),
			prefetch_cursor: 0,
			query_params: Vec::with_capacity(MAX_QUERY_PARAMS),
			query_parsed: false,
			params: Vec::with_capacity(HTTP_MAX_ROUTE_PARAMS),
		}
	}

	// Selective reset between requests on a keep-alive connection: scalars are cleared,
	// the large buffers keep their allocations.
	pub(crate) fn reset(&mut self) {
		self.state = ParseState::Method;
		self.error_code = 400;
		self.method = HttpMethod::GET;
		self.uri.clear();
		self.path_len = 0;
		self.query_off = 0;
		self.query_len = 0;
		self.header_storage.clear();
		self.header_count = 0;
		self.header_bytes = 0;
		self.cur_off = 0;
		self.content_length = 0;
		self.bytes_received = 0;
		self.keep_alive = true;
		self.upgrade_ws_pending = false;
		self.ws_key.clear();
		self.prefetch.clear();
		self.prefetch_cursor = 0;
		self.query_params.clear();
		self.query_parsed = false;
		self.params.clear();
	}

	fn fail(&mut self, code: u16) -> ParseResult {
		self.state = ParseState::Error;
		self.error_code = code;
		ParseResult::Error
	}

	// Split the stored uri into path and query at the first '?'. The query is recorded as
	// offsets into the uri storage; nothing is copied.
	fn split_uri(&mut self) {
		match self.uri.iter().position(|&b| b == b'?') {
			Some(pos) => {
				self.path_len = pos;
				self.query_off = pos + 1;
				self.query_len = self.uri.len() - pos - 1;
			}
			None => {
				self.path_len = self.uri.len();
				self.query_off = self.uri.len();
				self.query_len = 0;
			}
		}
	}

	// A header's key and value are complete; classify known headers and apply their side
	// effects. Unknown headers are stored opaquely either way.
	fn classify_header(&mut self, idx: usize) -> Option<ParseResult> {
		let key = self.header_storage[self.headers[idx].key_off as usize
			..(self.headers[idx].key_off + self.headers[idx].key_len) as usize]
			.to_vec();
		let val = self.header_storage[self.headers[idx].val_off as usize
			..(self.headers[idx].val_off + self.headers[idx].val_len) as usize]
			.to_vec();
		let val = &val[..];

		match classify(&key) {
			HeaderClass::ContentLength => {
				// strict decimal; anything else is a malformed request
				let mut content_length: u64 = 0;
				if val.is_empty() {
					return Some(self.fail(400));
				}
				for &b in val {
					if !b.is_ascii_digit() {
						return Some(self.fail(400));
					}
					content_length =
						content_length.wrapping_mul(10).wrapping_add((b - b'0') as u64);
					if content_length > MAX_CONTENT_LENGTH {
						return Some(self.fail(413));
					}
				}
				self.content_length = content_length;
			}
			HeaderClass::Connection => {
				let val = val.to_ascii_lowercase();
				if contains_subslice(&val, b"close") {
					self.keep_alive = false;
				} else if contains_subslice(&val, b"keep-alive") {
					self.keep_alive = true;
				}
			}
			HeaderClass::Upgrade => {
				let val = val.to_ascii_lowercase();
				if contains_subslice(&val, b"websocket") {
					self.upgrade_ws_pending = true;
				}
			}
			HeaderClass::SecWebSocketKey => {
				self.ws_key.clear();
				self.ws_key.extend(val);
			}
			// the rest carry no connection-level side effects; handlers read them from
			// the header index
			_ => {}
		}
		None
	}
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
	if needle.len() > haystack.len() {
		return false;
	}
	haystack
		.windows(needle.len())
		.any(|window| window == needle)
}

/// Feed bytes to the streaming request parser. The parse cursor persists in the request
/// context, so the request may arrive in arbitrarily small chunks. Body bytes that arrive
/// together with the end of the header block land in the prefetch buffer.
pub(crate) fn parse(ctx: &mut RequestCtx, data: &[u8]) -> ParseResult {
	let mut i = 0;
	let len = data.len();

	while i < len {
		let b = data[i];

		match ctx.state {
			ParseState::Body | ParseState::Complete => break,
			ParseState::Error => return ParseResult::Error,
			_ => {}
		}

		ctx.header_bytes += 1;
		if ctx.header_bytes > HEADER_STORAGE_SIZE {
			return ctx.fail(413);
		}

		match ctx.state {
			ParseState::Method => {
				if b == b' ' {
					let token = &ctx.header_storage[ctx.cur_off..];
					match HttpMethod::from_token(token) {
						Some(method) => ctx.method = method,
						None => return ctx.fail(400),
					}
					ctx.header_storage.truncate(ctx.cur_off);
					ctx.state = ParseState::Uri;
				} else if b == b'\r' || b == b'\n' {
					return ctx.fail(400);
				} else {
					ctx.header_storage.push(b);
					if ctx.header_storage.len() - ctx.cur_off > 8 {
						return ctx.fail(400);
					}
				}
			}
			ParseState::Uri => {
				if b == b' ' {
					if ctx.uri.is_empty() {
						return ctx.fail(400);
					}
					ctx.split_uri();
					ctx.state = ParseState::Version;
				} else if b == b'\r' || b == b'\n' {
					// request line must carry two spaces before the line end
					return ctx.fail(400);
				} else {
					if ctx.uri.len() >= MAX_URI_LEN {
						return ctx.fail(414);
					}
					ctx.uri.push(b);
				}
			}
			ParseState::Version => {
				if b == b'\n' {
					let token = &ctx.header_storage[ctx.cur_off..];
					// tolerate a missing \r; the token itself is checked
					let token = match token.last() {
						Some(&b'\r') => &token[0..token.len() - 1],
						_ => token,
					};
					if !token.starts_with(b"HTTP/") {
						return ctx.fail(400);
					}
					ctx.header_storage.truncate(ctx.cur_off);
					ctx.state = ParseState::HeaderKey;
				} else {
					ctx.header_storage.push(b);
					if ctx.header_storage.len() - ctx.cur_off > 16 {
						return ctx.fail(400);
					}
				}
			}
			ParseState::HeaderKey => {
				if b == b'\n' {
					// blank line terminates the header block
					let stray = ctx.header_storage.len() - ctx.cur_off;
					if stray > 1 || (stray == 1 && ctx.header_storage[ctx.cur_off] != b'\r') {
						return ctx.fail(400);
					}
					ctx.header_storage.truncate(ctx.cur_off);
					i += 1;
					return headers_complete(ctx, &data[i..]);
				} else if b == b':' {
					if ctx.header_count >= MAX_HEADERS {
						return ctx.fail(413);
					}
					let key_off = ctx.cur_off;
					let key_len = ctx.header_storage.len() - key_off;
					ctx.headers[ctx.header_count].key_off = key_off as u16;
					ctx.headers[ctx.header_count].key_len = key_len as u16;
					ctx.cur_off = ctx.header_storage.len();
					ctx.state = ParseState::HeaderValue;
				} else if b != b'\r' {
					ctx.header_storage.push(b);
				}
			}
			ParseState::HeaderValue => {
				if b == b'\n' {
					let val_off = ctx.cur_off;
					let mut val_len = ctx.header_storage.len() - val_off;
					// strip the trailing \r and leading spaces
					if val_len > 0 && ctx.header_storage[val_off + val_len - 1] == b'\r' {
						ctx.header_storage.truncate(val_off + val_len - 1);
						val_len -= 1;
					}
					let mut skip = 0;
					while skip < val_len && ctx.header_storage[val_off + skip] == b' ' {
						skip += 1;
					}
					ctx.headers[ctx.header_count].val_off = (val_off + skip) as u16;
					ctx.headers[ctx.header_count].val_len = (val_len - skip) as u16;
					let idx = ctx.header_count;
					ctx.header_count += 1;
					ctx.cur_off = ctx.header_storage.len();
					if let Some(result) = ctx.classify_header(idx) {
						return result;
					}
					ctx.state = ParseState::HeaderKey;
				} else {
					ctx.header_storage.push(b);
				}
			}
			_ => {}
		}
		i += 1;
	}

	match ctx.state {
		ParseState::Error => ParseResult::Error,
		ParseState::Complete => ParseResult::Complete,
		ParseState::Body => ParseResult::Ok,
		_ => ParseResult::NeedMore,
	}
}

// The terminal CRLF-CRLF was consumed. Stash any body bytes that arrived with the headers
// in the prefetch buffer and decide whether the request is complete.
fn headers_complete(ctx: &mut RequestCtx, rest: &[u8]) -> ParseResult {
	let mut take = rest.len() as u64;
	if take > ctx.content_length {
		// anything past the announced body would be pipelining, which this engine does
		// not support; excess bytes are dropped
		take = ctx.content_length;
	}
	let take = take as usize;
	ctx.prefetch.extend(&rest[0..take]);
	ctx.bytes_received = take as u64;

	if ctx.bytes_received >= ctx.content_length {
		ctx.state = ParseState::Complete;
		ParseResult::Complete
	} else {
		ctx.state = ParseState::Body;
		ParseResult::Ok
	}
}
