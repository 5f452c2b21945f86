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

use crate::channels::ChannelRegistry;
use crate::constants::*;
use crate::misc::{status_text, url_decode};
use crate::router::{HttpRouter, RouteMatch};
use crate::types::{
	AsyncSendCtx, DeferredCtx, HttpBodyHandler, HttpConfig, HttpContext, HttpDoneHandler,
	HttpErrorHandler, HttpMethod, HttpProvider, HttpRequest, HttpResponse, HttpServer,
	HttpServerImpl, Middleware, MiddlewareChain, ParseResult, ParseState, ProviderCtx,
	RequestCtx, ResponseCtx, SlotCtx, WsConn, WsContext, WsEvent, WsMessageType,
};
use crate::ws::{handshake_response, ws_build_frame, ws_process, WsDelivery, WsStatus};
use crate::parser;
use ews_conf::ConfigOptionName as CN;
use ews_conf::{Config, ConfigBuilder, ConfigOption};
use ews_deps::base64;
use ews_deps::chrono::Utc;
use ews_err::*;
use ews_evh::{
	socket_recv_blocking, ConnPool, ConnState, EventLoop, EvhBuilder, CONN_FLAG_DEFERRED,
	CONN_FLAG_DEFER_PAUSED, CONN_FLAG_KEEP_ALIVE, CONN_FLAG_UPGRADE_PENDING,
	CONN_FLAG_WEBSOCKET, EVH_DEFAULT_ADDR, EVH_DEFAULT_BACKLOG, EVH_DEFAULT_PORT,
	EVH_DEFAULT_RECV_BUFFER_SIZE, EVH_DEFAULT_SELECT_TIMEOUT_MILLIS, EVH_DEFAULT_TIMEOUT_MILLIS,
	EVH_MAX_CONNECTIONS, INVALID_HANDLE,
};
use ews_log::*;
use std::any::Any;
use std::fs::File;
use std::str::from_utf8;
use std::sync::Arc;

info!();

// Routing data frozen at start() time and shared by every loop callback.
pub(crate) struct RoutingState {
	pub(crate) config: HttpConfig,
	pub(crate) root: HttpRouter,
	pub(crate) mounts: Vec<(String, HttpRouter)>,
	pub(crate) middleware: Vec<Middleware>,
	pub(crate) error_handler: Option<HttpErrorHandler>,
}

impl SlotCtx {
	fn new() -> Self {
		Self {
			req: RequestCtx::new(),
			resp: ResponseCtx::new(),
			ws: WsContext::new(),
			ws_handler: None,
		}
	}
}

impl ResponseCtx {
	pub(crate) fn new() -> Self {
		Self {
			status_code: 200,
			headers_sent: false,
			finished: false,
			force_close: false,
			extra_headers: vec![],
			chunked: false,
			deferred: DeferredCtx {
				on_body: None,
				on_done: None,
				paused: false,
				active: false,
			},
			async_send: AsyncSendCtx {
				on_done: None,
				active: false,
			},
			provider: ProviderCtx {
				provider: None,
				on_complete: None,
				eof_reached: false,
				use_chunked: false,
				active: false,
			},
		}
	}

	pub(crate) fn reset(&mut self) {
		self.status_code = 200;
		self.headers_sent = false;
		self.finished = false;
		self.force_close = false;
		self.extra_headers.clear();
		self.chunked = false;
		self.deferred.on_body = None;
		self.deferred.on_done = None;
		self.deferred.paused = false;
		self.deferred.active = false;
		self.async_send.on_done = None;
		self.async_send.active = false;
		self.provider.provider = None;
		self.provider.on_complete = None;
		self.provider.eof_reached = false;
		self.provider.use_chunked = false;
		self.provider.active = false;
	}
}

impl HttpContext {
	fn new(config: &HttpConfig) -> Self {
		let mut slots = Vec::with_capacity(config.max_connections);
		for _ in 0..config.max_connections {
			slots.push(SlotCtx::new());
		}
		Self {
			slots,
			channels: ChannelRegistry::new(config.max_channels),
			channel_masks: [0u32; EVH_MAX_CONNECTIONS],
		}
	}
}

// The loop stores one HttpContext in its user data; build it on the first callback.
fn build_ctx<'a>(
	user_data: &'a mut Option<Box<dyn Any + Send>>,
	config: &HttpConfig,
) -> &'a mut HttpContext {
	let have = match user_data {
		Some(user_data) => user_data.downcast_ref::<HttpContext>().is_some(),
		None => false,
	};
	if !have {
		*user_data = Some(Box::new(HttpContext::new(config)));
	}
	// unwraps ok, the context was just ensured above
	user_data
		.as_mut()
		.unwrap()
		.downcast_mut::<HttpContext>()
		.unwrap()
}

impl<'a> MiddlewareChain<'a> {
	/// Run the remaining middleware; the terminal step invokes the route's handler chain
	/// in registration order.
	pub fn next(
		&mut self,
		req: &mut HttpRequest<'_>,
		resp: &mut HttpResponse<'_>,
	) -> Result<(), Error> {
		if self.pos < self.chain.len() {
			let middleware = self.chain[self.pos];
			self.pos += 1;
			middleware(req, resp, self)
		} else {
			for handler in self.handlers {
				handler(req, resp)?;
			}
			Ok(())
		}
	}
}

impl<'a> HttpRequest<'a> {
	pub fn method(&self) -> HttpMethod {
		self.ctx.method
	}

	/// The request path (the uri up to the first `?`).
	pub fn path(&self) -> &str {
		from_utf8(&self.ctx.uri[0..self.ctx.path_len]).unwrap_or("")
	}

	/// The raw query string (empty when the uri carries none).
	pub fn query(&self) -> &str {
		from_utf8(
			&self.ctx.uri[self.ctx.query_off..self.ctx.query_off + self.ctx.query_len],
		)
		.unwrap_or("")
	}

	/// Value for a query key, url-decoded. The key/value offsets are parsed on first use
	/// and cached.
	pub fn query_param(&mut self, name: &str) -> Option<String> {
		if !self.ctx.query_parsed {
			self.parse_query();
		}
		for (key_off, key_len, val_off, val_len) in &self.ctx.query_params {
			let key =
				from_utf8(&self.ctx.uri[*key_off as usize..(*key_off + *key_len) as usize])
					.unwrap_or("");
			if key == name {
				let val = from_utf8(
					&self.ctx.uri[*val_off as usize..(*val_off + *val_len) as usize],
				)
				.unwrap_or("");
				return Some(url_decode(val));
			}
		}
		None
	}

	fn parse_query(&mut self) {
		self.ctx.query_parsed = true;
		let start = self.ctx.query_off;
		let end = self.ctx.query_off + self.ctx.query_len;
		let mut key_off = start;
		let mut eq_off = None;
		let mut i = start;
		loop {
			let at_end = i >= end;
			let b = if at_end { b'&' } else { self.ctx.uri[i] };
			if b == b'&' {
				if i > key_off && self.ctx.query_params.len() < MAX_QUERY_PARAMS {
					let (val_off, val_len) = match eq_off {
						Some(eq) => (eq + 1, i - eq - 1),
						None => (i, 0),
					};
					let key_len = match eq_off {
						Some(eq) => eq - key_off,
						None => i - key_off,
					};
					self.ctx.query_params.push((
						key_off as u16,
						key_len as u16,
						val_off as u16,
						val_len as u16,
					));
				}
				key_off = i + 1;
				eq_off = None;
			} else if b == b'=' && eq_off.is_none() {
				eq_off = Some(i);
			}
			if at_end {
				break;
			}
			i += 1;
		}
	}

	pub fn header_count(&self) -> usize {
		self.ctx.header_count
	}

	pub fn header_name(&self, i: usize) -> &str {
		if i >= self.ctx.header_count {
			return "";
		}
		let h = &self.ctx.headers[i];
		from_utf8(&self.ctx.header_storage[h.key_off as usize..(h.key_off + h.key_len) as usize])
			.unwrap_or("")
	}

	pub fn header_value(&self, i: usize) -> &str {
		if i >= self.ctx.header_count {
			return "";
		}
		let h = &self.ctx.headers[i];
		from_utf8(&self.ctx.header_storage[h.val_off as usize..(h.val_off + h.val_len) as usize])
			.unwrap_or("")
	}

	/// First header with the given name, compared case-insensitively.
	pub fn header(&self, name: &str) -> Option<&str> {
		for i in 0..self.ctx.header_count {
			if self.header_name(i).eq_ignore_ascii_case(name) {
				return Some(self.header_value(i));
			}
		}
		None
	}

	/// Value of a captured route parameter; the wildcard capture is named `*`.
	pub fn param(&self, name: &str) -> Option<&str> {
		for (key, val) in &self.ctx.params {
			if key == name {
				return Some(val);
			}
		}
		None
	}

	pub fn content_length(&self) -> u64 {
		self.ctx.content_length
	}

	/// Credentials from an `Authorization: Basic` header, if present and well-formed.
	pub fn basic_auth(&self) -> Option<(String, String)> {
		let value = self.header("Authorization")?;
		let encoded = value.strip_prefix("Basic ").or_else(|| value.strip_prefix("basic "))?;
		let decoded = base64::decode(encoded.trim()).ok()?;
		let decoded = String::from_utf8(decoded).ok()?;
		let pos = decoded.find(':')?;
		Some((
			decoded[0..pos].to_string(),
			decoded[pos + 1..].to_string(),
		))
	}

	/// Synchronous body read: bytes that arrived with the headers come out of the
	/// prefetch buffer first, then the socket is read directly. Returns 0 once the whole
	/// body was delivered.
	pub fn recv_body(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
		if self.ctx.prefetch_cursor < self.ctx.prefetch.len() {
			let avail = self.ctx.prefetch.len() - self.ctx.prefetch_cursor;
			let take = if avail > buf.len() { buf.len() } else { avail };
			buf[0..take].clone_from_slice(
				&self.ctx.prefetch[self.ctx.prefetch_cursor..self.ctx.prefetch_cursor + take],
			);
			self.ctx.prefetch_cursor += take;
			return Ok(take);
		}

		if self.ctx.bytes_received >= self.ctx.content_length {
			return Ok(0);
		}

		let remaining = self.ctx.content_length - self.ctx.bytes_received;
		let want = if (buf.len() as u64) > remaining {
			remaining as usize
		} else {
			buf.len()
		};
		let rlen = socket_recv_blocking(
			self.handle,
			&mut buf[0..want],
			HTTP_RECV_BODY_TIMEOUT_MILLIS,
		)?;
		self.ctx.bytes_received += rlen as u64;
		Ok(rlen)
	}
}

impl<'a> HttpResponse<'a> {
	pub fn status(&mut self, code: u16) {
		self.ctx.status_code = code;
	}

	/// Add a response header. Fails once the status line has gone out.
	pub fn header(&mut self, name: &str, value: &str) -> Result<(), Error> {
		if self.ctx.headers_sent {
			return Err(err!(ErrKind::IllegalState, "headers already sent"));
		}
		self.ctx
			.extra_headers
			.push((name.to_string(), value.to_string()));
		Ok(())
	}

	/// Force the connection closed once this response completes, regardless of the
	/// request's keep-alive preference.
	pub fn close_connection(&mut self) {
		self.ctx.force_close = true;
	}

	fn head(&self, content_length: Option<u64>, chunked: bool) -> String {
		let code = self.ctx.status_code;
		let keep_alive = self.keep_alive && !self.ctx.force_close;
		let mut extra = String::new();
		for (name, value) in &self.ctx.extra_headers {
			extra.push_str(&format!("{}: {}\r\n", name, value));
		}
		format!(
			"HTTP/1.1 {} {}\r\n\
Server: {}\r\n\
Date: {}\r\n\
{}{}\
Connection: {}\r\n\r\n",
			code,
			status_text(code),
			self.server_name,
			Utc::now().format("%a, %d %b %Y %H:%M:%S GMT"),
			extra,
			match (content_length, chunked) {
				(_, true) => "Transfer-Encoding: chunked\r\n".to_string(),
				(Some(len), _) => format!("Content-Length: {}\r\n", len),
				(None, false) => "".to_string(),
			},
			if keep_alive { "keep-alive" } else { "close" },
		)
	}

	/// Synchronous response: status line, headers and body are fully delivered through
	/// the send buffer before this returns.
	pub fn send(&mut self, body: &[u8]) -> Result<(), Error> {
		if self.ctx.headers_sent {
			return Err(err!(ErrKind::IllegalState, "response already sent"));
		}
		let head = self.head(Some(body.len() as u64), false);
		self.ctx.headers_sent = true;
		self.pool.send_all(self.idx, head.as_bytes())?;
		if !self.is_head && !body.is_empty() {
			self.pool.send_all(self.idx, body)?;
		}
		self.ctx.finished = true;
		Ok(())
	}

	/// Empty-bodied response with the given status.
	pub fn send_status(&mut self, code: u16) -> Result<(), Error> {
		self.status(code);
		self.send(b"")
	}

	/// Queue the whole response without blocking; `on_done` fires when the send buffer
	/// has fully drained.
	pub fn send_async(&mut self, body: &[u8], on_done: HttpDoneHandler) -> Result<(), Error> {
		if self.ctx.headers_sent {
			return Err(err!(ErrKind::IllegalState, "response already sent"));
		}
		let head = self.head(Some(body.len() as u64), false);
		self.ctx.headers_sent = true;
		self.pool.send(self.idx, head.as_bytes())?;
		if !self.is_head && !body.is_empty() {
			self.pool.send(self.idx, body)?;
		}
		self.ctx.async_send.on_done = Some(on_done);
		self.ctx.async_send.active = true;
		// ensure a write-ready event fires even if everything already hit the kernel
		self.pool.mark_write_pending(self.idx, true);
		Ok(())
	}

	/// Send one chunk of a chunked response. The first call emits the response head with
	/// `Transfer-Encoding: chunked`; an empty chunk terminates the response.
	pub fn send_chunk(&mut self, data: &[u8]) -> Result<(), Error> {
		if !self.ctx.headers_sent {
			let head = self.head(None, true);
			self.ctx.headers_sent = true;
			self.ctx.chunked = true;
			self.pool.send_all(self.idx, head.as_bytes())?;
		}
		if data.is_empty() {
			self.pool.send_all(self.idx, b"0\r\n\r\n")?;
			self.ctx.finished = true;
		} else {
			let framed = format!("{:x}\r\n", data.len());
			self.pool.send_all(self.idx, framed.as_bytes())?;
			self.pool.send_all(self.idx, data)?;
			self.pool.send_all(self.idx, b"\r\n")?;
		}
		Ok(())
	}

	/// Pull-mode response body: whenever the connection's send buffer has room, the
	/// provider is asked to fill it. With an unknown length chunked framing is added
	/// automatically.
	pub fn send_provider(
		&mut self,
		content_length: Option<u64>,
		provider: HttpProvider,
		on_complete: Option<HttpDoneHandler>,
	) -> Result<(), Error> {
		if self.ctx.headers_sent {
			return Err(err!(ErrKind::IllegalState, "response already sent"));
		}
		let use_chunked = content_length.is_none();
		let head = self.head(content_length, use_chunked);
		self.ctx.headers_sent = true;
		self.ctx.chunked = use_chunked;
		self.pool.send(self.idx, head.as_bytes())?;
		self.ctx.provider.provider = Some(provider);
		self.ctx.provider.on_complete = on_complete;
		self.ctx.provider.eof_reached = false;
		self.ctx.provider.use_chunked = use_chunked;
		self.ctx.provider.active = true;
		self.pool.mark_write_pending(self.idx, true);
		Ok(())
	}

	/// Hand body reception to callbacks driven by the event loop. Prefetched bytes are
	/// delivered as soon as the current handler returns; `on_done` fires at the end of
	/// the body or on disconnect.
	pub fn defer(
		&mut self,
		on_body: HttpBodyHandler,
		on_done: HttpDoneHandler,
	) -> Result<(), Error> {
		if self.ctx.deferred.active {
			return Err(err!(ErrKind::IllegalState, "request already deferred"));
		}
		self.ctx.deferred.on_body = Some(on_body);
		self.ctx.deferred.on_done = Some(on_done);
		self.ctx.deferred.paused = false;
		self.ctx.deferred.active = true;
		if let Some(slot) = self.pool.slot_mut(self.idx) {
			slot.set_flag(CONN_FLAG_DEFERRED);
		}
		Ok(())
	}

	/// Gate deferred body delivery for flow control.
	pub fn defer_pause(&mut self) {
		self.ctx.deferred.paused = true;
		if let Some(slot) = self.pool.slot_mut(self.idx) {
			slot.set_flag(CONN_FLAG_DEFER_PAUSED);
		}
	}

	pub fn defer_resume(&mut self) {
		self.ctx.deferred.paused = false;
		if let Some(slot) = self.pool.slot_mut(self.idx) {
			slot.unset_flag(CONN_FLAG_DEFER_PAUSED);
		}
	}

	/// 401 challenge with a `WWW-Authenticate: Basic` header for the realm.
	pub fn send_auth_challenge(&mut self, realm: &str) -> Result<(), Error> {
		self.status(401);
		let value = format!("Basic realm=\"{}\"", realm);
		self.header("WWW-Authenticate", &value)?;
		self.send(b"")
	}

	/// Redirect with the given 3xx status.
	pub fn redirect(&mut self, code: u16, location: &str) -> Result<(), Error> {
		self.status(code);
		self.header("Location", location)?;
		self.send(b"")
	}

	/// Stream a file as the response body through the connection's send buffer.
	pub fn send_file(&mut self, file: File, len: u64) -> Result<(), Error> {
		if self.ctx.headers_sent {
			return Err(err!(ErrKind::IllegalState, "response already sent"));
		}
		let head = self.head(Some(len), false);
		self.ctx.headers_sent = true;
		self.pool.send_all(self.idx, head.as_bytes())?;
		self.pool.start_file_stream(self.idx, file, len)?;
		self.ctx.finished = true;
		Ok(())
	}

	/// Head-only response advertising a body length without sending one.
	pub fn send_head_only(&mut self, len: u64) -> Result<(), Error> {
		if self.ctx.headers_sent {
			return Err(err!(ErrKind::IllegalState, "response already sent"));
		}
		let head = self.head(Some(len), false);
		self.ctx.headers_sent = true;
		self.pool.send_all(self.idx, head.as_bytes())?;
		self.ctx.finished = true;
		Ok(())
	}
}

impl<'a> WsConn<'a> {
	/// Pool slot index of this connection.
	pub fn index(&self) -> usize {
		self.idx
	}

	/// Send one unmasked frame to the peer.
	pub fn send(&mut self, mtype: WsMessageType, payload: &[u8]) -> Result<(), Error> {
		let frame = ws_build_frame(mtype, payload, false)?;
		self.pool.send(self.idx, &frame)
	}

	/// Send a close frame and close once it drains.
	pub fn close(&mut self) -> Result<(), Error> {
		let frame = ws_build_frame(WsMessageType::Close, b"", false)?;
		self.pool.send(self.idx, &frame)?;
		self.pool.close_after_drain(self.idx);
		Ok(())
	}

	/// Subscribe this connection to the named channel, creating the channel on first
	/// use. At most 32 channels may exist per server.
	pub fn join(&mut self, channel: &str) -> Result<(), Error> {
		let bit = self.channels.get_or_create(channel)?;
		self.channel_masks[self.idx] |= 1 << bit;
		Ok(())
	}

	pub fn leave(&mut self, channel: &str) -> Result<(), Error> {
		match self.channels.index_of(channel) {
			Some(bit) => {
				self.channel_masks[self.idx] &= !(1 << bit);
				Ok(())
			}
			None => {
				let text = format!("no such channel: {}", channel);
				Err(err!(ErrKind::NotFound, text))
			}
		}
	}

	pub fn leave_all(&mut self) {
		self.channel_masks[self.idx] = 0;
	}

	/// Broadcast to every websocket connection subscribed to the channel, including this
	/// one when subscribed.
	pub fn publish(
		&mut self,
		channel: &str,
		mtype: WsMessageType,
		payload: &[u8],
	) -> Result<(), Error> {
		let bit = match self.channels.index_of(channel) {
			Some(bit) => bit,
			None => {
				let text = format!("no such channel: {}", channel);
				return Err(err!(ErrKind::NotFound, text));
			}
		};
		let frame = ws_build_frame(mtype, payload, false)?;
		for idx in ConnPool::indexes(self.pool.ws_active_mask()) {
			if self.channel_masks[idx] & (1 << bit) != 0 {
				match self.pool.send(idx, &frame) {
					Ok(_) => {}
					Err(e) => warn!("publish to slot {} failed: {}", idx, e)?,
				}
			}
		}
		Ok(())
	}

	/// Number of current subscribers of the channel.
	pub fn channel_size(&mut self, channel: &str) -> usize {
		let bit = match self.channels.index_of(channel) {
			Some(bit) => bit,
			None => return 0,
		};
		let mut count = 0;
		for idx in ConnPool::indexes(self.pool.ws_active_mask()) {
			if self.channel_masks[idx] & (1 << bit) != 0 {
				count += 1;
			}
		}
		count
	}

	/// Names of the channels this connection is subscribed to.
	pub fn channels(&self) -> Vec<String> {
		let mut ret = vec![];
		let mask = self.channel_masks[self.idx];
		for bit in 0..32u8 {
			if mask & (1 << bit) != 0 {
				if let Some(name) = self.channels.name_of(bit) {
					ret.push(name.clone());
				}
			}
		}
		ret
	}
}

impl HttpServerImpl {
	pub(crate) fn new(configs: Vec<ConfigOption>) -> Result<Self, Error> {
		let config = Self::build_config(configs)?;
		Ok(Self {
			config,
			root: HttpRouter::new(),
			mounts: vec![],
			middleware: vec![],
			error_handler: None,
			controller: None,
		})
	}

	fn build_config(configs: Vec<ConfigOption>) -> Result<HttpConfig, Error> {
		let config = ConfigBuilder::build_config(configs);
		config.check_config(
			vec![
				CN::Addr,
				CN::Port,
				CN::Backlog,
				CN::TimeoutMillis,
				CN::SelectTimeoutMillis,
				CN::RecvBufferSize,
				CN::Nodelay,
				CN::ReuseAddr,
				CN::MaxConnections,
				CN::MaxChannels,
				CN::MaxTotalMiddleware,
				CN::ServerName,
				CN::HttpDir,
				CN::Debug,
			],
			vec![],
		)?;

		let http_dir = match config.get(&CN::HttpDir) {
			Some(ConfigOption::HttpDir(dir)) => Some(dir),
			_ => None,
		};

		Ok(HttpConfig {
			port: config.get_or_u16(&CN::Port, EVH_DEFAULT_PORT),
			addr: config.get_or_string(&CN::Addr, EVH_DEFAULT_ADDR.to_string()),
			backlog: config.get_or_usize(&CN::Backlog, EVH_DEFAULT_BACKLOG),
			timeout_millis: config.get_or_u64(&CN::TimeoutMillis, EVH_DEFAULT_TIMEOUT_MILLIS),
			select_timeout_millis: config
				.get_or_u64(&CN::SelectTimeoutMillis, EVH_DEFAULT_SELECT_TIMEOUT_MILLIS),
			recv_buffer_size: config
				.get_or_usize(&CN::RecvBufferSize, EVH_DEFAULT_RECV_BUFFER_SIZE),
			nodelay: config.get_or_bool(&CN::Nodelay, true),
			reuseaddr: config.get_or_bool(&CN::ReuseAddr, true),
			max_connections: config.get_or_usize(&CN::MaxConnections, EVH_MAX_CONNECTIONS),
			max_channels: config.get_or_usize(&CN::MaxChannels, HTTP_DEFAULT_MAX_CHANNELS),
			max_total_middleware: config
				.get_or_usize(&CN::MaxTotalMiddleware, HTTP_DEFAULT_MAX_TOTAL_MIDDLEWARE),
			server_name: config.get_or_string(&CN::ServerName, HTTP_SERVER_NAME.to_string()),
			http_dir,
			debug: config.get_or_bool(&CN::Debug, false),
		})
	}
}

impl HttpServer for HttpServerImpl {
	fn router(&mut self) -> &mut HttpRouter {
		&mut self.root
	}

	fn mount(&mut self, prefix: &str, router: HttpRouter) -> Result<(), Error> {
		if !prefix.starts_with('/') {
			let text = format!("mount prefix must begin with '/': {}", prefix);
			return Err(err!(ErrKind::IllegalArgument, text));
		}
		self.mounts.push((prefix.to_string(), router));
		Ok(())
	}

	fn add_middleware(&mut self, middleware: Middleware) -> Result<(), Error> {
		if self.middleware.len() >= self.config.max_total_middleware {
			let text = format!(
				"server middleware limit of {} reached",
				self.config.max_total_middleware
			);
			return Err(err!(ErrKind::CapacityExceeded, text));
		}
		self.middleware.push(middleware);
		Ok(())
	}

	fn set_error_handler(&mut self, handler: HttpErrorHandler) {
		self.error_handler = Some(handler);
	}

	fn start(&mut self) -> Result<(), Error> {
		if self.controller.is_some() {
			return Err(err!(ErrKind::AlreadyRunning, "http server already started"));
		}

		let config = self.config.clone();
		let routing = Arc::new(RoutingState {
			config: config.clone(),
			root: std::mem::take(&mut self.root),
			mounts: std::mem::take(&mut self.mounts),
			middleware: std::mem::take(&mut self.middleware),
			error_handler: self.error_handler,
		});

		let mut evh = EvhBuilder::build_event_loop(vec![
			ConfigOption::Addr(config.addr.clone()),
			ConfigOption::Port(config.port),
			ConfigOption::Backlog(config.backlog),
			ConfigOption::TimeoutMillis(config.timeout_millis),
			ConfigOption::SelectTimeoutMillis(config.select_timeout_millis),
			ConfigOption::RecvBufferSize(config.recv_buffer_size),
			ConfigOption::Nodelay(config.nodelay),
			ConfigOption::ReuseAddr(config.reuseaddr),
			ConfigOption::MaxConnections(config.max_connections),
			ConfigOption::Debug(config.debug),
		])?;

		let state = routing.clone();
		evh.set_on_accept(move |ctx, idx| {
			let (_pool, user_data, _tick) = ctx.parts();
			let hctx = build_ctx(user_data, &state.config);
			// a fresh connection starts from clean per-slot contexts
			hctx.slots[idx].req.reset();
			hctx.slots[idx].resp.reset();
			hctx.slots[idx].ws.reset();
			hctx.slots[idx].ws_handler = None;
			hctx.channel_masks[idx] = 0;
			debug!("accepted connection on slot {}", idx)?;
			Ok(())
		})?;

		let state = routing.clone();
		evh.set_on_read(move |ctx, idx, data| {
			let (pool, user_data, tick) = ctx.parts();
			let hctx = build_ctx(user_data, &state.config);
			on_read_impl(&state, pool, hctx, idx, tick, data)
		})?;

		let state = routing.clone();
		evh.set_on_write_ready(move |ctx, idx| {
			let (pool, user_data, _tick) = ctx.parts();
			let hctx = build_ctx(user_data, &state.config);
			on_write_ready_impl(&state, pool, hctx, idx)
		})?;

		let state = routing.clone();
		evh.set_on_close(move |ctx, idx| {
			let (pool, user_data, _tick) = ctx.parts();
			let hctx = build_ctx(user_data, &state.config);
			on_close_impl(&state, pool, hctx, idx)
		})?;

		let state = routing.clone();
		evh.set_on_housekeeper(move |ctx| {
			let (pool, user_data, tick) = ctx.parts();
			let hctx = build_ctx(user_data, &state.config);
			on_housekeeper_impl(&state, pool, hctx, tick)
		})?;

		evh.start()?;
		self.controller = Some(evh.controller()?);
		info!("http server listening on {}:{}", config.addr, config.port)?;
		Ok(())
	}

	fn stop(&mut self) -> Result<(), Error> {
		match self.controller.take() {
			Some(mut controller) => controller.stop(),
			None => Err(err!(ErrKind::NotRunning, "http server is not running")),
		}
	}
}

// Build a request/response pair over the slot's contexts and run `f` with them.
fn with_req_resp<R>(
	config: &HttpConfig,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
	f: impl FnOnce(&mut HttpRequest<'_>, &mut HttpResponse<'_>) -> R,
) -> R {
	let handle = match pool.slot(idx) {
		Some(slot) => slot.handle(),
		None => INVALID_HANDLE,
	};
	let sctx = &mut hctx.slots[idx];
	let keep_alive = sctx.req.keep_alive;
	let is_head = sctx.req.method == HttpMethod::HEAD;
	let mut request = HttpRequest {
		ctx: &mut sctx.req,
		handle,
	};
	let mut response = HttpResponse {
		ctx: &mut sctx.resp,
		pool,
		idx,
		server_name: &config.server_name,
		keep_alive,
		is_head,
	};
	f(&mut request, &mut response)
}

fn on_read_impl(
	routing: &RoutingState,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
	tick: u64,
	data: &[u8],
) -> Result<(), Error> {
	let state = match pool.slot(idx) {
		Some(slot) => slot.state(),
		None => return Ok(()),
	};

	match state {
		ConnState::New | ConnState::ReadingHeaders => {
			if let Some(slot) = pool.slot_mut(idx) {
				slot.set_state(ConnState::ReadingHeaders);
			}
			let result = parser::parse(&mut hctx.slots[idx].req, data);
			debug!("parse result on slot {}: {:?}", idx, result)?;
			match result {
				ParseResult::NeedMore => Ok(()),
				ParseResult::Error => {
					let code = hctx.slots[idx].req.error_code;
					respond_error_close(routing, pool, hctx, idx, code)
				}
				ParseResult::Ok | ParseResult::Complete => {
					// mirror the parser's side effects onto the slot flags
					let (keep_alive, upgrade) = {
						let req = &hctx.slots[idx].req;
						(req.keep_alive, req.upgrade_ws_pending)
					};
					if let Some(slot) = pool.slot_mut(idx) {
						if keep_alive {
							slot.set_flag(CONN_FLAG_KEEP_ALIVE);
						} else {
							slot.unset_flag(CONN_FLAG_KEEP_ALIVE);
						}
						if upgrade {
							slot.set_flag(CONN_FLAG_UPGRADE_PENDING);
						}
						if result == ParseResult::Ok {
							slot.set_state(ConnState::ReadingBody);
						}
					}
					dispatch_request(routing, pool, hctx, idx, tick)
				}
			}
		}
		ConnState::ReadingBody => handle_body_bytes(routing, pool, hctx, idx, data),
		ConnState::WebSocket => handle_ws_bytes(routing, pool, hctx, idx, tick, data),
		_ => Ok(()),
	}
}

// Request dispatch: websocket upgrade, route lookup across mounts and the root router,
// middleware collection and the handler chain, with the error-handler cascade.
fn dispatch_request(
	routing: &RoutingState,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
	tick: u64,
) -> Result<(), Error> {
	let (upgrade, path, method) = {
		let req = &hctx.slots[idx].req;
		(
			req.upgrade_ws_pending,
			from_utf8(&req.uri[0..req.path_len]).unwrap_or("").to_string(),
			req.method,
		)
	};

	debug!("dispatch {} {} on slot {}", method.as_str(), path, idx)?;

	if upgrade {
		if let Some((ws_handler, ping_interval)) = find_ws_route(routing, &path) {
			return upgrade_to_ws(routing, pool, hctx, idx, tick, ws_handler, ping_interval);
		}
	}

	let (route_match, router_error_handler) = route_lookup(routing, &path, method);

	if route_match.overflow {
		let e = err!(
			ErrKind::IllegalArgument,
			"routing capacity exceeded; middleware or params truncated"
		);
		return handle_dispatch_error(routing, router_error_handler, pool, hctx, idx, e);
	}

	if !route_match.matched {
		// no route: fall back to the static file tree when one is configured
		if let Some(http_dir) = &routing.config.http_dir {
			if method == HttpMethod::GET || method == HttpMethod::HEAD {
				let served = with_req_resp(&routing.config, pool, hctx, idx, |req, resp| {
					crate::files::serve_file(http_dir, &path, req, resp)
				});
				match served {
					Ok(_) => return post_dispatch(routing, pool, hctx, idx),
					Err(e) => match e.kind() {
						ErrorKind::IllegalArgument(_) => {
							// traversal and malformed paths are forbidden, not missing
							with_req_resp(&routing.config, pool, hctx, idx, |_req, resp| {
								resp.send_status(403)
							})?;
							return post_dispatch(routing, pool, hctx, idx);
						}
						_ => {}
					},
				}
			}
		}
		let text = format!("no route for {}", path);
		let e = err!(ErrKind::NotFound, text);
		return handle_dispatch_error(routing, router_error_handler, pool, hctx, idx, e);
	}

	if route_match.handlers.is_empty() {
		// the route exists but not for this method
		with_req_resp(&routing.config, pool, hctx, idx, |_req, resp| {
			resp.send_status(405)
		})?;
		return post_dispatch(routing, pool, hctx, idx);
	}

	// middleware runs server first, then router, then route
	let mut middleware: Vec<Middleware> = vec![];
	let mut overflow = false;
	for mw in routing
		.middleware
		.iter()
		.chain(route_match.middleware.iter())
	{
		if middleware.len() >= routing.config.max_total_middleware {
			overflow = true;
			break;
		}
		middleware.push(*mw);
	}
	if overflow {
		let e = err!(
			ErrKind::IllegalArgument,
			"total middleware limit exceeded for this request"
		);
		return handle_dispatch_error(routing, router_error_handler, pool, hctx, idx, e);
	}

	hctx.slots[idx].req.params = route_match.params;

	let result = with_req_resp(&routing.config, pool, hctx, idx, |req, resp| {
		let mut chain = MiddlewareChain {
			chain: &middleware,
			handlers: &route_match.handlers,
			pos: 0,
		};
		chain.next(req, resp)
	});

	match result {
		Ok(_) => post_dispatch(routing, pool, hctx, idx),
		Err(e) => handle_dispatch_error(routing, router_error_handler, pool, hctx, idx, e),
	}
}

// First mount whose prefix matches wins, even when its router has no matching route; the
// root router is only consulted when no mount prefix matches.
fn route_lookup<'a>(
	routing: &'a RoutingState,
	path: &str,
	method: HttpMethod,
) -> (RouteMatch, Option<HttpErrorHandler>) {
	let max_total = routing.config.max_total_middleware;
	for (prefix, router) in &routing.mounts {
		if path.starts_with(prefix.as_str()) {
			let sub = &path[prefix.len()..];
			let sub = if sub.is_empty() { "/" } else { sub };
			let mut m = router.lookup(sub, method, max_total);
			prepend_router_middleware(router, &mut m, max_total);
			return (m, router.error_handler);
		}
	}
	let mut m = routing.root.lookup(path, method, max_total);
	prepend_router_middleware(&routing.root, &mut m, max_total);
	(m, routing.root.error_handler)
}

fn prepend_router_middleware(router: &HttpRouter, m: &mut RouteMatch, max_total: usize) {
	if router.router_middleware.is_empty() {
		return;
	}
	let mut combined = router.router_middleware.clone();
	combined.extend(m.middleware.iter());
	if combined.len() > max_total {
		combined.truncate(max_total);
		m.overflow = true;
	}
	m.middleware = combined;
}

fn find_ws_route(routing: &RoutingState, path: &str) -> Option<(crate::WsHandler, Option<u64>)> {
	let max_total = routing.config.max_total_middleware;
	for (prefix, router) in &routing.mounts {
		if path.starts_with(prefix.as_str()) {
			let sub = &path[prefix.len()..];
			let sub = if sub.is_empty() { "/" } else { sub };
			let m = router.lookup(sub, HttpMethod::Any, max_total);
			return m.ws_handler.map(|h| (h, m.ws_ping_interval));
		}
	}
	let m = routing.root.lookup(path, HttpMethod::Any, max_total);
	m.ws_handler.map(|h| (h, m.ws_ping_interval))
}

fn upgrade_to_ws(
	routing: &RoutingState,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
	tick: u64,
	ws_handler: crate::WsHandler,
	ping_interval: Option<u64>,
) -> Result<(), Error> {
	let key = String::from_utf8_lossy(&hctx.slots[idx].req.ws_key).to_string();
	if key.is_empty() {
		return respond_error_close(routing, pool, hctx, idx, 400);
	}

	let response = handshake_response(&key);
	pool.send(idx, response.as_bytes())?;

	if let Some(slot) = pool.slot_mut(idx) {
		slot.set_state(ConnState::WebSocket);
		slot.set_flag(CONN_FLAG_WEBSOCKET);
		slot.unset_flag(CONN_FLAG_UPGRADE_PENDING);
	}
	pool.mark_ws_active(idx, true);

	let sctx = &mut hctx.slots[idx];
	sctx.ws.reset();
	sctx.ws_handler = Some(ws_handler);
	if let Some(interval) = ping_interval {
		let ticks = interval / routing.config.select_timeout_millis;
		sctx.ws.ping_interval_ticks = if ticks == 0 { 1 } else { ticks };
		sctx.ws.last_ping_tick = tick;
	}

	debug!("upgraded slot {} to websocket", idx)?;
	call_ws_handler(pool, hctx, idx, &WsEvent::Open)
}

fn call_ws_handler(
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
	event: &WsEvent<'_>,
) -> Result<(), Error> {
	let handler = match hctx.slots[idx].ws_handler {
		Some(handler) => handler,
		None => return Ok(()),
	};
	let HttpContext {
		channels,
		channel_masks,
		..
	} = hctx;
	let mut conn = WsConn {
		pool,
		channels,
		channel_masks,
		idx,
	};
	match handler(&mut conn, event) {
		Ok(_) => {}
		Err(e) => warn!("websocket handler generated error: {}", e)?,
	}
	Ok(())
}

fn handle_ws_bytes(
	_routing: &RoutingState,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
	tick: u64,
	data: &[u8],
) -> Result<(), Error> {
	let processed = ws_process(&mut hctx.slots[idx].ws, data);
	let (deliveries, status, _consumed) = match processed {
		Ok(ret) => ret,
		Err(e) => {
			debug!("websocket frame error on slot {}: {}", idx, e)?;
			// protocol violation: close without ceremony
			pool.close(idx);
			return Ok(());
		}
	};

	for delivery in deliveries {
		match delivery {
			WsDelivery::Ping { payload } => {
				// a ping is answered inline with a pong echoing the payload
				let pong = ws_build_frame(WsMessageType::Pong, &payload, false)?;
				match pool.send(idx, &pong) {
					Ok(_) => {}
					Err(e) => {
						debug!("pong failed on slot {}: {}", idx, e)?;
						return Ok(());
					}
				}
			}
			WsDelivery::Pong => {
				if let Some(slot) = pool.slot_mut(idx) {
					slot.touch(tick);
				}
			}
			WsDelivery::Message { opcode, payload } => {
				let mtype = if opcode == WS_OP_BINARY {
					WsMessageType::Binary
				} else {
					WsMessageType::Text
				};
				let event = WsEvent::Message {
					mtype,
					payload: &payload,
				};
				call_ws_handler(pool, hctx, idx, &event)?;
			}
		}
	}

	if status == WsStatus::Close {
		// reply with our own close, then let the queued bytes drain out
		let close = ws_build_frame(WsMessageType::Close, b"", false)?;
		let _ = pool.send(idx, &close);
		pool.close_after_drain(idx);
	}

	Ok(())
}

fn handle_body_bytes(
	routing: &RoutingState,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
	data: &[u8],
) -> Result<(), Error> {
	let (remaining, deferred_active) = {
		let sctx = &hctx.slots[idx];
		(
			sctx.req.content_length.saturating_sub(sctx.req.bytes_received),
			sctx.resp.deferred.active,
		)
	};
	let take = if (data.len() as u64) > remaining {
		remaining as usize
	} else {
		data.len()
	};

	if deferred_active {
		// buffer the bytes; pump_deferred delivers them honoring the pause flag
		let sctx = &mut hctx.slots[idx];
		sctx.req.prefetch.extend(&data[0..take]);
		sctx.req.bytes_received += take as u64;
		pump_deferred(routing, pool, hctx, idx)?;
	} else {
		// the synchronous handler already ran; count the leftovers and move on
		let sctx = &mut hctx.slots[idx];
		sctx.req.bytes_received += take as u64;
	}

	post_dispatch(routing, pool, hctx, idx)
}

// Deliver buffered body bytes to the deferred callbacks, firing on_done at the end of the
// body.
fn pump_deferred(
	routing: &RoutingState,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
) -> Result<(), Error> {
	loop {
		let (active, paused, has_bytes, complete) = {
			let sctx = &hctx.slots[idx];
			(
				sctx.resp.deferred.active,
				sctx.resp.deferred.paused,
				sctx.req.prefetch_cursor < sctx.req.prefetch.len(),
				sctx.req.bytes_received >= sctx.req.content_length
					&& sctx.req.prefetch_cursor >= sctx.req.prefetch.len(),
			)
		};
		if !active || paused {
			return Ok(());
		}

		if has_bytes {
			let chunk = {
				let sctx = &mut hctx.slots[idx];
				let chunk = sctx.req.prefetch[sctx.req.prefetch_cursor..].to_vec();
				sctx.req.prefetch_cursor = sctx.req.prefetch.len();
				chunk
			};
			let on_body = hctx.slots[idx].resp.deferred.on_body;
			if let Some(on_body) = on_body {
				let result = with_req_resp(&routing.config, pool, hctx, idx, |req, resp| {
					on_body(req, resp, &chunk)
				});
				if let Err(e) = result {
					debug!("deferred body handler error on slot {}: {}", idx, e)?;
					finish_deferred(routing, pool, hctx, idx, Err(e))?;
					return Ok(());
				}
			}
			continue;
		}

		if complete {
			return finish_deferred(routing, pool, hctx, idx, Ok(()));
		}
		return Ok(());
	}
}

fn finish_deferred(
	routing: &RoutingState,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
	result: Result<(), Error>,
) -> Result<(), Error> {
	let on_done = {
		let deferred = &mut hctx.slots[idx].resp.deferred;
		deferred.active = false;
		deferred.on_body = None;
		deferred.on_done.take()
	};
	if let Some(slot) = pool.slot_mut(idx) {
		slot.unset_flag(CONN_FLAG_DEFERRED);
		slot.unset_flag(CONN_FLAG_DEFER_PAUSED);
	}
	if let Some(on_done) = on_done {
		let res = with_req_resp(&routing.config, pool, hctx, idx, |req, resp| {
			on_done(req, resp, result)
		});
		if let Err(e) = res {
			debug!("deferred done handler error on slot {}: {}", idx, e)?;
		}
	}
	Ok(())
}

// After a handler or body event: finish the request when nothing asynchronous remains and
// the body has been fully received.
fn post_dispatch(
	routing: &RoutingState,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
) -> Result<(), Error> {
	pump_deferred(routing, pool, hctx, idx)?;

	// a freshly reset context means the request was already finished on another path
	if hctx.slots[idx].req.state == ParseState::Method {
		return Ok(());
	}

	let state = match pool.slot(idx) {
		Some(slot) => slot.state(),
		None => return Ok(()),
	};
	if state == ConnState::WebSocket
		|| state == ConnState::Closed
		|| state == ConnState::Closing
		|| state == ConnState::Free
	{
		return Ok(());
	}

	let (async_active, body_done, headers_sent, finished) = {
		let sctx = &hctx.slots[idx];
		(
			sctx.resp.deferred.active
				|| sctx.resp.async_send.active
				|| sctx.resp.provider.active,
			sctx.req.bytes_received >= sctx.req.content_length,
			sctx.resp.headers_sent,
			sctx.resp.finished,
		)
	};

	if async_active || !body_done {
		return Ok(());
	}

	if !headers_sent {
		// the handler produced nothing; answer with an empty 200
		with_req_resp(&routing.config, pool, hctx, idx, |_req, resp| resp.send(b""))?;
	} else if !finished {
		// an unterminated chunked response cannot be recovered on this connection
		pool.close_after_drain(idx);
		return Ok(());
	}

	finish_request(pool, hctx, idx)
}

// Keep-alive connections are reset for the next request; everything else drains and
// closes.
fn finish_request(pool: &mut ConnPool, hctx: &mut HttpContext, idx: usize) -> Result<(), Error> {
	let keep_alive = {
		let sctx = &hctx.slots[idx];
		sctx.req.keep_alive && !sctx.resp.force_close
	};
	if keep_alive {
		let sctx = &mut hctx.slots[idx];
		sctx.req.reset();
		sctx.resp.reset();
		if let Some(slot) = pool.slot_mut(idx) {
			slot.set_state(ConnState::ReadingHeaders);
		}
	} else {
		pool.close_after_drain(idx);
	}
	Ok(())
}

fn handle_dispatch_error(
	routing: &RoutingState,
	router_error_handler: Option<HttpErrorHandler>,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
	e: Error,
) -> Result<(), Error> {
	debug!("dispatch error on slot {}: {}", idx, e)?;

	// the router's error handler runs first, then the server's; returning Ok suppresses
	// the defaulted response
	for handler in [router_error_handler, routing.error_handler] {
		if let Some(handler) = handler {
			let suppressed = with_req_resp(&routing.config, pool, hctx, idx, |req, resp| {
				handler(req, resp, &e)
			});
			if suppressed.is_ok() {
				return post_dispatch(routing, pool, hctx, idx);
			}
		}
	}

	let code = match e.kind() {
		ErrorKind::NotFound(_) => 404,
		ErrorKind::IllegalArgument(_) => 400,
		ErrorKind::CapacityExceeded(_) => 503,
		_ => 500,
	};

	let headers_sent = hctx.slots[idx].resp.headers_sent;
	if !headers_sent {
		with_req_resp(&routing.config, pool, hctx, idx, |_req, resp| {
			resp.send_status(code)
		})?;
	}
	post_dispatch(routing, pool, hctx, idx)
}

// Parse failures answer 400 (or the cap-specific status) and drop the connection.
fn respond_error_close(
	routing: &RoutingState,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
	code: u16,
) -> Result<(), Error> {
	let result = with_req_resp(&routing.config, pool, hctx, idx, |_req, resp| {
		resp.close_connection();
		resp.send_status(code)
	});
	match result {
		Ok(_) => {}
		Err(e) => debug!("error response failed on slot {}: {}", idx, e)?,
	}
	pool.close_after_drain(idx);
	Ok(())
}

fn on_write_ready_impl(
	routing: &RoutingState,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
) -> Result<(), Error> {
	let (provider_active, async_active) = {
		let sctx = &hctx.slots[idx];
		(sctx.resp.provider.active, sctx.resp.async_send.active)
	};

	if provider_active {
		refill_provider(routing, pool, hctx, idx)?;
	} else if async_active {
		// the queued response has fully drained
		let on_done = {
			let async_send = &mut hctx.slots[idx].resp.async_send;
			async_send.active = false;
			async_send.on_done.take()
		};
		hctx.slots[idx].resp.finished = true;
		if let Some(on_done) = on_done {
			let result = with_req_resp(&routing.config, pool, hctx, idx, |req, resp| {
				on_done(req, resp, Ok(()))
			});
			match result {
				Ok(_) => {}
				Err(e) => debug!("async done handler error on slot {}: {}", idx, e)?,
			}
		}
		post_dispatch(routing, pool, hctx, idx)?;
	}

	Ok(())
}

// Hand send-buffer slack to the data provider. Without a known content length each
// produced block is wrapped in chunked framing.
fn refill_provider(
	routing: &RoutingState,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
) -> Result<(), Error> {
	let (provider, use_chunked) = {
		let p = &hctx.slots[idx].resp.provider;
		(p.provider, p.use_chunked)
	};
	let provider = match provider {
		Some(provider) => provider,
		None => return Ok(()),
	};

	loop {
		let produced = if use_chunked {
			// produce into a scratch block, then queue it framed
			let free = match pool.slot(idx) {
				Some(slot) => slot.sendbuf().free_space(),
				None => 0,
			};
			// room for "xxxx\r\n" + data + "\r\n"
			if free < 32 {
				break;
			}
			let mut block = vec![0u8; free - 16];
			let n = match provider(&mut block) {
				Ok(n) => n,
				Err(e) => {
					return provider_failed(routing, pool, hctx, idx, e);
				}
			};
			if n > 0 {
				let header = format!("{:x}\r\n", n);
				pool.send(idx, header.as_bytes())?;
				pool.send(idx, &block[0..n])?;
				pool.send(idx, b"\r\n")?;
			}
			n
		} else {
			let slot = match pool.slot_mut(idx) {
				Some(slot) => slot,
				None => return Ok(()),
			};
			let slack = slot.sendbuf_mut().write_ptr();
			if slack.is_empty() {
				break;
			}
			let n = match provider(slack) {
				Ok(n) => n,
				Err(e) => {
					return provider_failed(routing, pool, hctx, idx, e);
				}
			};
			slot.sendbuf_mut().commit(n);
			if n > 0 {
				pool.mark_write_pending(idx, true);
			}
			n
		};

		if produced == 0 {
			// end of data
			if use_chunked {
				pool.send(idx, b"0\r\n\r\n")?;
			}
			{
				let p = &mut hctx.slots[idx].resp.provider;
				p.eof_reached = true;
				p.active = false;
				p.provider = None;
			}
			hctx.slots[idx].resp.finished = true;
			let on_complete = hctx.slots[idx].resp.provider.on_complete.take();
			if let Some(on_complete) = on_complete {
				let result = with_req_resp(&routing.config, pool, hctx, idx, |req, resp| {
					on_complete(req, resp, Ok(()))
				});
				match result {
					Ok(_) => {}
					Err(e) => debug!("provider done handler error on slot {}: {}", idx, e)?,
				}
			}
			return post_dispatch(routing, pool, hctx, idx);
		}
	}

	Ok(())
}

fn provider_failed(
	routing: &RoutingState,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
	e: Error,
) -> Result<(), Error> {
	debug!("provider error on slot {}: {}", idx, e)?;
	{
		let p = &mut hctx.slots[idx].resp.provider;
		p.active = false;
		p.provider = None;
	}
	let on_complete = hctx.slots[idx].resp.provider.on_complete.take();
	if let Some(on_complete) = on_complete {
		let text = format!("connection failed during provider response: {}", e);
		let _ = with_req_resp(&routing.config, pool, hctx, idx, |req, resp| {
			on_complete(req, resp, Err(err!(ErrKind::ConnClosed, text)))
		});
	}
	pool.close(idx);
	Ok(())
}

fn on_close_impl(
	routing: &RoutingState,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	idx: usize,
) -> Result<(), Error> {
	debug!("connection closed on slot {}", idx)?;

	// pending async callbacks observe the disconnect
	if hctx.slots[idx].resp.deferred.active {
		let text = "connection closed during deferred body".to_string();
		finish_deferred(
			routing,
			pool,
			hctx,
			idx,
			Err(err!(ErrKind::ConnClosed, text)),
		)?;
	}
	if hctx.slots[idx].resp.async_send.active {
		let on_done = {
			let async_send = &mut hctx.slots[idx].resp.async_send;
			async_send.active = false;
			async_send.on_done.take()
		};
		if let Some(on_done) = on_done {
			let _ = with_req_resp(&routing.config, pool, hctx, idx, |req, resp| {
				on_done(
					req,
					resp,
					Err(err!(ErrKind::ConnClosed, "connection closed during async send")),
				)
			});
		}
	}
	if hctx.slots[idx].resp.provider.active {
		let on_complete = {
			let p = &mut hctx.slots[idx].resp.provider;
			p.active = false;
			p.provider = None;
			p.on_complete.take()
		};
		if let Some(on_complete) = on_complete {
			let _ = with_req_resp(&routing.config, pool, hctx, idx, |req, resp| {
				on_complete(
					req,
					resp,
					Err(err!(ErrKind::ConnClosed, "connection closed during provider response")),
				)
			});
		}
	}

	// websocket connections get a close event and leave every channel
	if hctx.slots[idx].ws_handler.is_some() {
		call_ws_handler(pool, hctx, idx, &WsEvent::Close)?;
	}

	let sctx = &mut hctx.slots[idx];
	sctx.req.reset();
	sctx.resp.reset();
	sctx.ws.reset();
	sctx.ws_handler = None;
	hctx.channel_masks[idx] = 0;
	Ok(())
}

// Periodic work: websocket routes may configure a ping interval; idle websocket
// connections receive a ping when it elapses.
fn on_housekeeper_impl(
	_routing: &RoutingState,
	pool: &mut ConnPool,
	hctx: &mut HttpContext,
	tick: u64,
) -> Result<(), Error> {
	for idx in ConnPool::indexes(pool.ws_active_mask()) {
		let due = {
			let ws = &hctx.slots[idx].ws;
			ws.ping_interval_ticks > 0
				&& tick.saturating_sub(ws.last_ping_tick) >= ws.ping_interval_ticks
		};
		if due {
			hctx.slots[idx].ws.last_ping_tick = tick;
			let ping = ws_build_frame(WsMessageType::Ping, b"", false)?;
			match pool.send(idx, &ping) {
				Ok(_) => {}
				Err(e) => debug!("ping failed on slot {}: {}", idx, e)?,
			}
		}
	}
	Ok(())
}
