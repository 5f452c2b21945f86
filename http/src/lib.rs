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

//! # The EWS Http crate
//! An embedded-class http/1.1 and websocket server built on [`ews_evh`]: a streaming
//! request parser, a radix-tree router with parameters, wildcards and middleware, a
//! streaming websocket frame codec with channel-based pub/sub, and static file serving.
//! Everything runs on the single event-loop task; handlers respond synchronously or
//! through the deferred/async/provider primitives.
//!
//! # Example
//!
//!```no_run
//! use ews_conf::ConfigOption::*;
//! use ews_err::*;
//! use ews_http::*;
//!
//! fn handler(_req: &mut HttpRequest<'_>, resp: &mut HttpResponse<'_>) -> Result<(), Error> {
//!     resp.send(b"hello world")
//! }
//!
//! fn main() -> Result<(), Error> {
//!     let mut server = Builder::build_http_server(vec![Port(8081)])?;
//!     server.router().add_route(HttpMethod::GET, "/hello", handler)?;
//!     server.start()?;
//!     server.stop()?;
//!     Ok(())
//! }
//!```

mod builder;
mod channels;
mod constants;
mod files;
mod http;
mod macros;
mod misc;
mod parser;
mod router;
#[cfg(test)]
mod test;
mod types;
mod ws;

pub use crate::constants::{
	HTTP_DEFAULT_MAX_CHANNELS, HTTP_DEFAULT_MAX_MIDDLEWARE_PER_ROUTER,
	HTTP_DEFAULT_MAX_ROUTE_MIDDLEWARE, HTTP_DEFAULT_MAX_TOTAL_MIDDLEWARE, HTTP_MAX_ROUTE_PARAMS,
};
pub use crate::files::{get_mime, serve_file, validate_path};
pub use crate::misc::{status_text, url_decode, url_encode};
pub use crate::router::HttpRouter;
pub use crate::types::{
	Builder, HttpBodyHandler, HttpDoneHandler, HttpErrorHandler, HttpHandler, HttpMethod,
	HttpProvider, HttpRequest, HttpResponse, HttpServer, Middleware, MiddlewareChain, WsConn,
	WsEvent, WsHandler, WsMessageType,
};
pub use crate::ws::{ws_build_frame, ws_compute_accept_key};
