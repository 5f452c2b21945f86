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
use crate::router::HttpRouter;
use ews_err::Error;
use ews_evh::{ConnPool, EvhController, Handle, EVH_MAX_CONNECTIONS};

/// Http request methods understood by the parser.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
pub enum HttpMethod {
	GET,
	HEAD,
	POST,
	PUT,
	DELETE,
	OPTIONS,
	PATCH,
	/// Matches every method when used at route registration time.
	Any,
}

impl HttpMethod {
	pub(crate) fn from_token(token: &[u8]) -> Option<Self> {
		match token {
			b"GET" => Some(HttpMethod::GET),
			b"HEAD" => Some(HttpMethod::HEAD),
			b"POST" => Some(HttpMethod::POST),
			b"PUT" => Some(HttpMethod::PUT),
			b"DELETE" => Some(HttpMethod::DELETE),
			b"OPTIONS" => Some(HttpMethod::OPTIONS),
			b"PATCH" => Some(HttpMethod::PATCH),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			HttpMethod::GET => "GET",
			HttpMethod::HEAD => "HEAD",
			HttpMethod::POST => "POST",
			HttpMethod::PUT => "PUT",
			HttpMethod::DELETE => "DELETE",
			HttpMethod::OPTIONS => "OPTIONS",
			HttpMethod::PATCH => "PATCH",
			HttpMethod::Any => "*",
		}
	}

	pub(crate) fn index(&self) -> usize {
		match self {
			HttpMethod::GET => 0,
			HttpMethod::HEAD => 1,
			HttpMethod::POST => 2,
			HttpMethod::PUT => 3,
			HttpMethod::DELETE => 4,
			HttpMethod::OPTIONS => 5,
			HttpMethod::PATCH => 6,
			HttpMethod::Any => 7,
		}
	}
}

/// Result of feeding bytes to the request parser.
#[derive(PartialEq, Copy, Clone, Debug)]
pub enum ParseResult {
	/// Headers are complete but body bytes are still outstanding.
	Ok,
	/// More header bytes are needed.
	NeedMore,
	/// The request, including any body, has been received.
	Complete,
	/// The request is malformed; the status code to answer with is in the context.
	Error,
}

// Parser cursor persisted in the request context between reads.
#[derive(PartialEq, Copy, Clone, Debug)]
pub(crate) enum ParseState {
	Method,
	Uri,
	Version,
	HeaderKey,
	HeaderValue,
	Body,
	Complete,
	Error,
}

// One header's location inside the header storage buffer.
#[derive(Copy, Clone, Default)]
pub(crate) struct HeaderIdx {
	pub(crate) key_off: u16,
	pub(crate) key_len: u16,
	pub(crate) val_off: u16,
	pub(crate) val_len: u16,
}

/// Handler invoked for a matched route. Multiple handlers may be registered for one route;
/// they run in registration order.
pub type HttpHandler = fn(&mut HttpRequest<'_>, &mut HttpResponse<'_>) -> Result<(), Error>;

/// Body chunk callback for deferred requests.
pub type HttpBodyHandler =
	fn(&mut HttpRequest<'_>, &mut HttpResponse<'_>, &[u8]) -> Result<(), Error>;

/// Invoked when a deferred body, an asynchronous send, or a data provider completes or
/// fails. A dropped connection surfaces as [`ews_err::ErrorKind::ConnClosed`].
pub type HttpDoneHandler =
	fn(&mut HttpRequest<'_>, &mut HttpResponse<'_>, Result<(), Error>) -> Result<(), Error>;

/// Pull-mode body source. Fills the supplied slack and returns the number of bytes
/// produced; `Ok(0)` signals end of data.
pub type HttpProvider = fn(&mut [u8]) -> Result<usize, Error>;

/// Middleware receives a continuation; calling [`MiddlewareChain::next`] runs the rest of
/// the chain and finally the route's handler chain.
pub type Middleware =
	fn(&mut HttpRequest<'_>, &mut HttpResponse<'_>, &mut MiddlewareChain<'_>) -> Result<(), Error>;

/// Handler consulted when a route handler returns an error. Returning `Ok(())` suppresses
/// the defaulted error response.
pub type HttpErrorHandler =
	fn(&mut HttpRequest<'_>, &mut HttpResponse<'_>, &Error) -> Result<(), Error>;

/// Websocket event handler for an upgraded connection.
pub type WsHandler = fn(&mut WsConn<'_>, &WsEvent<'_>) -> Result<(), Error>;

/// Websocket message types.
#[derive(PartialEq, Copy, Clone, Debug)]
pub enum WsMessageType {
	Text,
	Binary,
	Ping,
	Pong,
	Close,
}

/// Events delivered to a [`WsHandler`].
#[derive(Debug)]
pub enum WsEvent<'a> {
	/// The handshake completed and the connection is live.
	Open,
	/// A complete message arrived.
	Message {
		mtype: WsMessageType,
		payload: &'a [u8],
	},
	/// The peer sent a close frame or dropped the connection.
	Close,
}

/// The continuation passed to middleware.
pub struct MiddlewareChain<'a> {
	pub(crate) chain: &'a [Middleware],
	pub(crate) handlers: &'a [HttpHandler],
	pub(crate) pos: usize,
}

/// View of the parsed request handed to handlers and middleware.
pub struct HttpRequest<'a> {
	pub(crate) ctx: &'a mut RequestCtx,
	pub(crate) handle: Handle,
}

/// Response writer for one request.
pub struct HttpResponse<'a> {
	pub(crate) ctx: &'a mut ResponseCtx,
	pub(crate) pool: &'a mut ConnPool,
	pub(crate) idx: usize,
	pub(crate) server_name: &'a str,
	pub(crate) keep_alive: bool,
	pub(crate) is_head: bool,
}

/// A live websocket connection, handed to [`WsHandler`] callbacks.
pub struct WsConn<'a> {
	pub(crate) pool: &'a mut ConnPool,
	pub(crate) channels: &'a mut ChannelRegistry,
	pub(crate) channel_masks: &'a mut [u32; EVH_MAX_CONNECTIONS],
	pub(crate) idx: usize,
}

/// The main server trait. Routes, mounts and middleware must be configured before
/// [`HttpServer::start`] is called.
pub trait HttpServer {
	/// The root router.
	fn router(&mut self) -> &mut HttpRouter;
	/// Mount a router at a path prefix. Dispatch tries mounts in registration order and
	/// stops at the first prefix that matches, then falls back to the root router.
	fn mount(&mut self, prefix: &str, router: HttpRouter) -> Result<(), Error>;
	/// Server-level middleware, run before router and route middleware.
	fn add_middleware(&mut self, middleware: Middleware) -> Result<(), Error>;
	/// Consulted after the router's error handler.
	fn set_error_handler(&mut self, handler: HttpErrorHandler);
	fn start(&mut self) -> Result<(), Error>;
	fn stop(&mut self) -> Result<(), Error>;
}

/// Builder struct used to build [`crate::HttpServer`] and [`crate::HttpRouter`]
/// implementations.
pub struct Builder {}

// Crate local structures

#[derive(Clone, Debug)]
pub(crate) struct HttpConfig {
	pub(crate) port: u16,
	pub(crate) addr: String,
	pub(crate) backlog: usize,
	pub(crate) timeout_millis: u64,
	pub(crate) select_timeout_millis: u64,
	pub(crate) recv_buffer_size: usize,
	pub(crate) nodelay: bool,
	pub(crate) reuseaddr: bool,
	pub(crate) max_connections: usize,
	pub(crate) max_channels: usize,
	pub(crate) max_total_middleware: usize,
	pub(crate) server_name: String,
	pub(crate) http_dir: Option<String>,
	pub(crate) debug: bool,
}

// Request-side per-slot context. Reset between requests on a keep-alive connection with
// the large buffers retained.
pub(crate) struct RequestCtx {
	pub(crate) state: ParseState,
	pub(crate) error_code: u16,
	pub(crate) method: HttpMethod,
	pub(crate) uri: Vec<u8>,
	pub(crate) path_len: usize,
	pub(crate) query_off: usize,
	pub(crate) query_len: usize,
	pub(crate) header_storage: Vec<u8>,
	pub(crate) headers: [HeaderIdx; crate::constants::MAX_HEADERS],
	pub(crate) header_count: usize,
	pub(crate) header_bytes: usize,
	pub(crate) cur_off: usize,
	pub(crate) content_length: u64,
	pub(crate) bytes_received: u64,
	pub(crate) keep_alive: bool,
	pub(crate) upgrade_ws_pending: bool,
	pub(crate) ws_key: Vec<u8>,
	pub(crate) prefetch: Vec<u8>,
	pub(crate) prefetch_cursor: usize,
	pub(crate) query_params: Vec<(u16, u16, u16, u16)>,
	pub(crate) query_parsed: bool,
	pub(crate) params: Vec<(String, String)>,
}

pub(crate) struct DeferredCtx {
	pub(crate) on_body: Option<HttpBodyHandler>,
	pub(crate) on_done: Option<HttpDoneHandler>,
	pub(crate) paused: bool,
	pub(crate) active: bool,
}

pub(crate) struct AsyncSendCtx {
	pub(crate) on_done: Option<HttpDoneHandler>,
	pub(crate) active: bool,
}

pub(crate) struct ProviderCtx {
	pub(crate) provider: Option<HttpProvider>,
	pub(crate) on_complete: Option<HttpDoneHandler>,
	pub(crate) eof_reached: bool,
	pub(crate) use_chunked: bool,
	pub(crate) active: bool,
}

// Response-side per-slot context.
pub(crate) struct ResponseCtx {
	pub(crate) status_code: u16,
	pub(crate) headers_sent: bool,
	pub(crate) finished: bool,
	pub(crate) force_close: bool,
	pub(crate) extra_headers: Vec<(String, String)>,
	pub(crate) chunked: bool,
	pub(crate) deferred: DeferredCtx,
	pub(crate) async_send: AsyncSendCtx,
	pub(crate) provider: ProviderCtx,
}

// Websocket frame parser cursor.
#[derive(PartialEq, Copy, Clone, Debug)]
pub(crate) enum WsFrameState {
	Opcode,
	Len,
	LenExt,
	Mask,
	Payload,
}

// Websocket per-slot context.
pub(crate) struct WsContext {
	pub(crate) state: WsFrameState,
	pub(crate) fin: bool,
	pub(crate) opcode: u8,
	pub(crate) msg_opcode: u8,
	pub(crate) masked: bool,
	pub(crate) payload_len: usize,
	pub(crate) payload_read: usize,
	pub(crate) mask_key: [u8; 4],
	pub(crate) len_bytes: [u8; 8],
	pub(crate) len_bytes_needed: u8,
	pub(crate) len_bytes_got: u8,
	pub(crate) mask_bytes_got: u8,
	pub(crate) payload: Vec<u8>,
	pub(crate) ctrl_payload: Vec<u8>,
	pub(crate) ping_interval_ticks: u64,
	pub(crate) last_ping_tick: u64,
}

// Everything the dispatcher needs for one slot.
pub(crate) struct SlotCtx {
	pub(crate) req: RequestCtx,
	pub(crate) resp: ResponseCtx,
	pub(crate) ws: WsContext,
	pub(crate) ws_handler: Option<WsHandler>,
}

// Loop-side state, stored in the event loop's user data and built lazily on the first
// callback.
pub(crate) struct HttpContext {
	pub(crate) slots: Vec<SlotCtx>,
	pub(crate) channels: ChannelRegistry,
	pub(crate) channel_masks: [u32; EVH_MAX_CONNECTIONS],
}

pub(crate) struct HttpServerImpl {
	pub(crate) config: HttpConfig,
	pub(crate) root: HttpRouter,
	pub(crate) mounts: Vec<(String, HttpRouter)>,
	pub(crate) middleware: Vec<Middleware>,
	pub(crate) error_handler: Option<HttpErrorHandler>,
	pub(crate) controller: Option<EvhController>,
}
