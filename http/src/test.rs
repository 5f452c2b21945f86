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

#[cfg(test)]
mod test {
	use crate as ews_http;
	use crate::parser;
	use crate::types::{HttpRequest, HttpResponse, ParseResult, ParseState, RequestCtx};
	use crate::ws::{unmask_payload, ws_process, WsDelivery, WsStatus};
	use crate::types::WsContext;
	use crate::{
		get_mime, http_server, status_text, url_decode, url_encode, ws_build_frame,
		ws_compute_accept_key, Builder, HttpMethod, HttpRouter, HttpServer, MiddlewareChain,
		WsConn, WsEvent, WsMessageType,
	};
	use ews_conf::ConfigOption::*;
	use ews_err::*;
	use ews_log::*;
	use ews_test::*;
	use std::io::{Read, Write};
	use std::net::TcpStream;
	use std::thread::sleep;
	use std::time::Duration;

	debug!();

	fn read_response(strm: &mut TcpStream) -> Result<(String, Vec<u8>), Error> {
		let mut data = vec![];
		let mut buf = [0u8; 1024];
		let (head_end, content_length) = loop {
			let len = strm.read(&mut buf)?;
			if len == 0 {
				return Err(err!(ErrKind::ConnClosed, "eof before headers"));
			}
			data.extend(&buf[0..len]);
			if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
				let head = String::from_utf8_lossy(&data[0..pos]).to_string();
				let mut content_length = 0;
				for line in head.split("\r\n") {
					let lower = line.to_lowercase();
					if let Some(v) = lower.strip_prefix("content-length:") {
						content_length = v.trim().parse().unwrap_or(0);
					}
				}
				break (pos + 4, content_length);
			}
		};
		while data.len() < head_end + content_length {
			let len = strm.read(&mut buf)?;
			if len == 0 {
				break;
			}
			data.extend(&buf[0..len]);
		}
		let head = String::from_utf8_lossy(&data[0..head_end]).to_string();
		let body = data[head_end..head_end + content_length].to_vec();
		Ok((head, body))
	}

	#[test]
	fn test_parse_get_keep_alive() -> Result<(), Error> {
		let mut ctx = RequestCtx::new();
		let req = b"GET /test HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n";
		let result = parser::parse(&mut ctx, req);
		assert_eq!(result, ParseResult::Complete);
		assert_eq!(ctx.method, HttpMethod::GET);
		assert!(ctx.keep_alive);
		assert_eq!(ctx.header_count, 2);
		assert_eq!(ctx.content_length, 0);
		Ok(())
	}

	#[test]
	fn test_parse_post_split_body() -> Result<(), Error> {
		let mut ctx = RequestCtx::new();
		let head =
			b"POST /api/data HTTP/1.1\r\nHost: x\r\nContent-Length: 15\r\n\r\n";
		let result = parser::parse(&mut ctx, head);
		assert_eq!(result, ParseResult::Ok);
		assert_eq!(ctx.content_length, 15);
		assert_eq!(ctx.state, ParseState::Body);
		assert_eq!(ctx.bytes_received, 0);
		Ok(())
	}

	#[test]
	fn test_parse_incremental() -> Result<(), Error> {
		let mut ctx = RequestCtx::new();
		let req = b"GET /a HTTP/1.1\r\nHost: localhost\r\n\r\n";
		// one byte at a time must land in the same place
		for i in 0..req.len() - 1 {
			assert_eq!(parser::parse(&mut ctx, &req[i..i + 1]), ParseResult::NeedMore);
		}
		assert_eq!(
			parser::parse(&mut ctx, &req[req.len() - 1..]),
			ParseResult::Complete
		);
		Ok(())
	}

	#[test]
	fn test_parse_body_prefetch() -> Result<(), Error> {
		let mut ctx = RequestCtx::new();
		let req = b"POST /d HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
		assert_eq!(parser::parse(&mut ctx, req), ParseResult::Complete);
		assert_eq!(ctx.prefetch, b"hello");
		assert_eq!(ctx.bytes_received, 5);
		Ok(())
	}

	#[test]
	fn test_parse_errors() -> Result<(), Error> {
		// unknown method token
		let mut ctx = RequestCtx::new();
		assert_eq!(
			parser::parse(&mut ctx, b"BREW /pot HTTP/1.1\r\n\r\n"),
			ParseResult::Error
		);

		// missing uri
		let mut ctx = RequestCtx::new();
		assert_eq!(parser::parse(&mut ctx, b"GET\r\n\r\n"), ParseResult::Error);

		// non-digit content length
		let mut ctx = RequestCtx::new();
		assert_eq!(
			parser::parse(&mut ctx, b"GET / HTTP/1.1\r\nContent-Length: 1x\r\n\r\n"),
			ParseResult::Error
		);

		// header block beyond the cap
		let mut ctx = RequestCtx::new();
		let mut req = b"GET / HTTP/1.1\r\n".to_vec();
		req.extend(vec![b'a'; 4096]);
		assert_eq!(parser::parse(&mut ctx, &req), ParseResult::Error);
		assert_eq!(ctx.error_code, 413);
		Ok(())
	}

	#[test]
	fn test_parse_ws_upgrade_headers() -> Result<(), Error> {
		let mut ctx = RequestCtx::new();
		let req = b"GET /ws HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n";
		assert_eq!(parser::parse(&mut ctx, req), ParseResult::Complete);
		assert!(ctx.upgrade_ws_pending);
		assert_eq!(ctx.ws_key, b"dGhlIHNhbXBsZSBub25jZQ==");
		Ok(())
	}

	fn h_ok(_req: &mut HttpRequest<'_>, _resp: &mut HttpResponse<'_>) -> Result<(), Error> {
		Ok(())
	}

	fn h_ok2(_req: &mut HttpRequest<'_>, _resp: &mut HttpResponse<'_>) -> Result<(), Error> {
		Ok(())
	}

	#[test]
	fn test_router_static_param_wildcard() -> Result<(), Error> {
		let mut router = HttpRouter::new();
		router.add_route(HttpMethod::GET, "/api/users", h_ok)?;
		router.add_route(HttpMethod::GET, "/api/*", h_ok2)?;
		router.add_route(HttpMethod::GET, "/users/:id/posts", h_ok)?;

		// the specific route wins over the wildcard
		let m = router.lookup("/api/users", HttpMethod::GET, 16);
		assert!(m.matched);
		assert_eq!(m.handlers.len(), 1);
		assert!(m.handlers[0] == h_ok as crate::HttpHandler);
		assert!(m.params.is_empty());

		// anything else under /api hits the wildcard with the remainder captured
		let m = router.lookup("/api/anything", HttpMethod::GET, 16);
		assert!(m.matched);
		assert!(m.handlers[0] == h_ok2 as crate::HttpHandler);
		assert_eq!(m.params, vec![("*".to_string(), "anything".to_string())]);

		// multi-segment wildcard capture
		let m = router.lookup("/api/a/b/c", HttpMethod::GET, 16);
		assert!(m.matched);
		assert_eq!(m.params, vec![("*".to_string(), "a/b/c".to_string())]);

		// params capture the substituted segment
		let m = router.lookup("/users/42/posts", HttpMethod::GET, 16);
		assert!(m.matched);
		assert_eq!(m.params, vec![("id".to_string(), "42".to_string())]);

		// no match
		let m = router.lookup("/nope", HttpMethod::GET, 16);
		assert!(!m.matched);

		// "/" never matches a root wildcard
		let mut router = HttpRouter::new();
		router.add_route(HttpMethod::GET, "/*", h_ok)?;
		let m = router.lookup("/", HttpMethod::GET, 16);
		assert!(!m.matched);
		let m = router.lookup("/x", HttpMethod::GET, 16);
		assert!(m.matched);
		Ok(())
	}

	#[test]
	fn test_router_optional_param() -> Result<(), Error> {
		let mut router = HttpRouter::new();
		router.add_route(HttpMethod::GET, "/files/:name?", h_ok)?;

		let m = router.lookup("/files/readme", HttpMethod::GET, 16);
		assert!(m.matched);
		assert_eq!(m.params, vec![("name".to_string(), "readme".to_string())]);

		// param absent entirely
		let m = router.lookup("/files", HttpMethod::GET, 16);
		assert!(m.matched);
		assert!(m.params.is_empty());
		Ok(())
	}

	#[test]
	fn test_router_chain_append() -> Result<(), Error> {
		let mut router = HttpRouter::new();
		router.add_route(HttpMethod::GET, "/multi", h_ok)?;
		router.add_route(HttpMethod::GET, "/multi", h_ok2)?;
		let m = router.lookup("/multi", HttpMethod::GET, 16);
		assert_eq!(m.handlers.len(), 2);
		assert!(m.handlers[0] == h_ok as crate::HttpHandler);
		assert!(m.handlers[1] == h_ok2 as crate::HttpHandler);
		Ok(())
	}

	#[test]
	fn test_router_strict_slash() -> Result<(), Error> {
		let mut router = Builder::build_http_router(vec![StrictSlash(true)])?;
		router.add_route(HttpMethod::GET, "/exact/", h_ok)?;
		assert!(router.lookup("/exact/", HttpMethod::GET, 16).matched);
		assert!(!router.lookup("/exact", HttpMethod::GET, 16).matched);
		Ok(())
	}

	#[test]
	fn test_router_case_insensitive() -> Result<(), Error> {
		let mut router = Builder::build_http_router(vec![CaseSensitive(false)])?;
		router.add_route(HttpMethod::GET, "/CaseTest", h_ok)?;
		assert!(router.lookup("/casetest", HttpMethod::GET, 16).matched);
		assert!(router.lookup("/CASETEST", HttpMethod::GET, 16).matched);
		Ok(())
	}

	#[test]
	fn test_accept_key() -> Result<(), Error> {
		assert_eq!(
			ws_compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
			"s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
		);
		Ok(())
	}

	#[test]
	fn test_unmask_involution() -> Result<(), Error> {
		let key = [0x37u8, 0xfa, 0x21, 0x3d];
		let original: Vec<u8> = (0u8..200).collect();
		// whatever the chunking and starting offset, unmasking twice restores the input
		for split in [1usize, 3, 7, 50] {
			let mut data = original.clone();
			let mut offset = 0;
			for chunk in data.chunks_mut(split) {
				unmask_payload(chunk, &key, offset);
				offset += chunk.len();
			}
			let mut offset = 0;
			for chunk in data.chunks_mut(split) {
				unmask_payload(chunk, &key, offset);
				offset += chunk.len();
			}
			assert_eq!(data, original);
		}
		Ok(())
	}

	#[test]
	fn test_ws_masked_hello() -> Result<(), Error> {
		// masked text frame carrying "Hello"
		let frame = [
			0x81u8, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
		];
		let mut ctx = WsContext::new();
		let (deliveries, status, consumed) = ws_process(&mut ctx, &frame)?;
		assert_eq!(status, WsStatus::Ok);
		assert_eq!(consumed, frame.len());
		assert_eq!(deliveries.len(), 1);
		match &deliveries[0] {
			WsDelivery::Message { opcode, payload } => {
				assert_eq!(*opcode, 0x1);
				assert_eq!(payload, b"Hello");
			}
			_ => panic!("expected message"),
		}
		Ok(())
	}

	#[test]
	fn test_ws_frame_roundtrip() -> Result<(), Error> {
		let frame = ws_build_frame(WsMessageType::Text, b"roundtrip", false)?;
		let mut ctx = WsContext::new();
		let (deliveries, status, _) = ws_process(&mut ctx, &frame)?;
		assert_eq!(status, WsStatus::Ok);
		match &deliveries[0] {
			WsDelivery::Message { opcode, payload } => {
				assert_eq!(*opcode, 0x1);
				assert_eq!(payload, b"roundtrip");
			}
			_ => panic!("expected message"),
		}

		// masked build path
		let frame = ws_build_frame(WsMessageType::Binary, b"masked", true)?;
		let mut ctx = WsContext::new();
		let (deliveries, _, _) = ws_process(&mut ctx, &frame)?;
		match &deliveries[0] {
			WsDelivery::Message { opcode, payload } => {
				assert_eq!(*opcode, 0x2);
				assert_eq!(payload, b"masked");
			}
			_ => panic!("expected message"),
		}
		Ok(())
	}

	#[test]
	fn test_ws_split_frame() -> Result<(), Error> {
		let frame = ws_build_frame(WsMessageType::Text, b"split across reads", false)?;
		let mut ctx = WsContext::new();
		let mut deliveries = vec![];
		for b in &frame {
			let (mut d, status, _) = ws_process(&mut ctx, &[*b])?;
			assert_eq!(status, WsStatus::Ok);
			deliveries.append(&mut d);
		}
		assert_eq!(deliveries.len(), 1);
		match &deliveries[0] {
			WsDelivery::Message { payload, .. } => assert_eq!(payload, b"split across reads"),
			_ => panic!("expected message"),
		}
		Ok(())
	}

	#[test]
	fn test_ws_close_and_ping() -> Result<(), Error> {
		// bare close frame
		let mut ctx = WsContext::new();
		let (_, status, _) = ws_process(&mut ctx, &[0x88u8, 0x00])?;
		assert_eq!(status, WsStatus::Close);

		// ping is surfaced with its payload for the pong reply
		let mut ctx = WsContext::new();
		let (deliveries, status, _) = ws_process(&mut ctx, &[0x89u8, 0x02, b'h', b'i'])?;
		assert_eq!(status, WsStatus::Ok);
		match &deliveries[0] {
			WsDelivery::Ping { payload } => assert_eq!(payload, b"hi"),
			_ => panic!("expected ping"),
		}

		// invalid opcode
		let mut ctx = WsContext::new();
		assert!(ws_process(&mut ctx, &[0x83u8, 0x00]).is_err());

		// control frames must be final
		let mut ctx = WsContext::new();
		assert!(ws_process(&mut ctx, &[0x09u8, 0x00]).is_err());
		Ok(())
	}

	#[test]
	fn test_ws_oversize_rejected() -> Result<(), Error> {
		assert!(ws_build_frame(WsMessageType::Binary, &vec![0u8; 70_000], false).is_err());

		// 64 bit length above the engine cap
		let mut ctx = WsContext::new();
		let mut frame = vec![0x82u8, 127];
		frame.extend(100_000u64.to_be_bytes());
		assert!(ws_process(&mut ctx, &frame).is_err());
		Ok(())
	}

	#[test]
	fn test_status_text() -> Result<(), Error> {
		assert_eq!(status_text(200), "OK");
		assert_eq!(status_text(404), "Not Found");
		assert_eq!(status_text(426), "Upgrade Required");
		assert_eq!(status_text(999), "Unknown");
		Ok(())
	}

	#[test]
	fn test_url_codec() -> Result<(), Error> {
		assert_eq!(url_decode("a%20b+c"), "a b c");
		assert_eq!(url_decode("%2Fpath%2f"), "/path/");
		// invalid sequences pass through
		assert_eq!(url_decode("100%"), "100%");
		assert_eq!(url_decode("%zz"), "%zz");

		// round trip over printable ascii
		let s: String = (0x20u8..0x7f).map(|b| b as char).collect();
		assert_eq!(url_decode(&url_encode(&s)), s);
		Ok(())
	}

	#[test]
	fn test_mime_lookup() -> Result<(), Error> {
		assert_eq!(get_mime("/index.html"), "text/html");
		assert_eq!(get_mime("/X.HTML"), get_mime("/x.html"));
		assert_eq!(get_mime("/data.json"), "application/json");
		assert_eq!(get_mime("/blob.unknown"), "application/octet-stream");
		assert_eq!(get_mime("/noext"), "application/octet-stream");
		Ok(())
	}

	// end to end handlers

	fn hello_handler(_req: &mut HttpRequest<'_>, resp: &mut HttpResponse<'_>) -> Result<(), Error> {
		resp.send(b"hello world")
	}

	fn echo_body_handler(
		req: &mut HttpRequest<'_>,
		resp: &mut HttpResponse<'_>,
	) -> Result<(), Error> {
		let mut body = vec![];
		let mut buf = [0u8; 256];
		loop {
			let len = req.recv_body(&mut buf)?;
			if len == 0 {
				break;
			}
			body.extend(&buf[0..len]);
		}
		resp.send(&body)
	}

	fn param_handler(req: &mut HttpRequest<'_>, resp: &mut HttpResponse<'_>) -> Result<(), Error> {
		let id = req.param("id").unwrap_or("?").to_string();
		resp.send(id.as_bytes())
	}

	fn chunked_handler(
		_req: &mut HttpRequest<'_>,
		resp: &mut HttpResponse<'_>,
	) -> Result<(), Error> {
		resp.send_chunk(b"part one;")?;
		resp.send_chunk(b"part two")?;
		resp.send_chunk(b"")
	}

	fn auth_handler(req: &mut HttpRequest<'_>, resp: &mut HttpResponse<'_>) -> Result<(), Error> {
		match req.basic_auth() {
			Some((user, pass)) if user == "admin" && pass == "secret" => resp.send(b"welcome"),
			_ => resp.send_auth_challenge("ews"),
		}
	}

	fn mw_tag(
		_req: &mut HttpRequest<'_>,
		resp: &mut HttpResponse<'_>,
		chain: &mut MiddlewareChain<'_>,
	) -> Result<(), Error> {
		resp.header("X-Tagged", "yes")?;
		chain.next(_req, resp)
	}

	fn ws_echo(conn: &mut WsConn<'_>, event: &WsEvent<'_>) -> Result<(), Error> {
		match event {
			WsEvent::Message { mtype, payload } => conn.send(*mtype, payload),
			_ => Ok(()),
		}
	}

	fn build_server(port: u16) -> Result<Box<dyn HttpServer + Send + Sync>, Error> {
		let mut server = http_server!(
			Port(port),
			MaxConnections(8),
			SelectTimeoutMillis(100),
			ServerName("ewstest".to_string())
		)?;
		server.router().add_route(HttpMethod::GET, "/test", hello_handler)?;
		server
			.router()
			.add_route(HttpMethod::POST, "/api/data", echo_body_handler)?;
		server
			.router()
			.add_route(HttpMethod::GET, "/users/:id", param_handler)?;
		server
			.router()
			.add_route(HttpMethod::GET, "/chunked", chunked_handler)?;
		server.router().add_route(HttpMethod::GET, "/auth", auth_handler)?;
		server
			.router()
			.add_route_middleware("/test", mw_tag)?;
		server.router().add_ws_route("/ws", ws_echo, None)?;
		server.start()?;
		Ok(server)
	}

	#[test]
	fn test_server_get_keep_alive() -> Result<(), Error> {
		let port = pick_free_port()?;
		let mut server = build_server(port)?;

		let mut strm = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		strm.write(b"GET /test HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n")?;
		let (head, body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
		assert!(head.contains("Server: ewstest"));
		assert!(head.contains("Connection: keep-alive"));
		assert!(head.contains("X-Tagged: yes"));
		assert_eq!(body, b"hello world");

		// the connection stays open for a second request
		strm.write(b"GET /users/42 HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
		let (head, body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
		assert_eq!(body, b"42");

		server.stop()?;
		Ok(())
	}

	#[test]
	fn test_server_post_split_body() -> Result<(), Error> {
		let port = pick_free_port()?;
		let mut server = build_server(port)?;

		let mut strm = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		// headers first, body afterwards
		strm.write(
			b"POST /api/data HTTP/1.1\r\nHost: localhost\r\nContent-Length: 15\r\n\r\n",
		)?;
		strm.flush()?;
		sleep(Duration::from_millis(200));
		strm.write(b"{\"test\":\"data\"}")?;
		let (head, body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
		assert_eq!(body, b"{\"test\":\"data\"}");

		server.stop()?;
		Ok(())
	}

	#[test]
	fn test_server_404_and_405() -> Result<(), Error> {
		let port = pick_free_port()?;
		let mut server = build_server(port)?;

		let mut strm = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		strm.write(b"GET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
		let (head, _body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));

		let mut strm = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		strm.write(b"DELETE /test HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
		let (head, _body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));

		server.stop()?;
		Ok(())
	}

	#[test]
	fn test_server_bad_request() -> Result<(), Error> {
		let port = pick_free_port()?;
		let mut server = build_server(port)?;

		let mut strm = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		strm.write(b"BOGUS /x HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
		let (head, _body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 400 Bad Request\r\n"));
		assert!(head.contains("Connection: close"));

		server.stop()?;
		Ok(())
	}

	#[test]
	fn test_server_chunked() -> Result<(), Error> {
		let port = pick_free_port()?;
		let mut server = build_server(port)?;

		let mut strm = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		strm.write(b"GET /chunked HTTP/1.1\r\nHost: localhost\r\n\r\n")?;

		let mut data = vec![];
		let mut buf = [0u8; 1024];
		while !data.windows(5).any(|w| w == b"0\r\n\r\n") {
			let len = strm.read(&mut buf)?;
			if len == 0 {
				break;
			}
			data.extend(&buf[0..len]);
		}
		let text = String::from_utf8_lossy(&data).to_string();
		assert!(text.contains("Transfer-Encoding: chunked"));
		assert!(text.contains("9\r\npart one;\r\n"));
		assert!(text.contains("8\r\npart two\r\n"));
		assert!(text.ends_with("0\r\n\r\n"));

		server.stop()?;
		Ok(())
	}

	#[test]
	fn test_server_auth_challenge() -> Result<(), Error> {
		let port = pick_free_port()?;
		let mut server = build_server(port)?;

		let mut strm = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		strm.write(b"GET /auth HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
		let (head, _body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
		assert!(head.contains("WWW-Authenticate: Basic realm=\"ews\""));

		// base64("admin:secret")
		strm.write(
			b"GET /auth HTTP/1.1\r\nHost: localhost\r\n\
Authorization: Basic YWRtaW46c2VjcmV0\r\n\r\n",
		)?;
		let (head, body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
		assert_eq!(body, b"welcome");

		server.stop()?;
		Ok(())
	}

	#[test]
	fn test_server_websocket_echo() -> Result<(), Error> {
		let port = pick_free_port()?;
		let mut server = build_server(port)?;

		let mut strm = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		strm.write(
			b"GET /ws HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\n\
Connection: Upgrade\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
Sec-WebSocket-Version: 13\r\n\r\n",
		)?;

		// 101 with the rfc sample accept key
		let mut data = vec![];
		let mut buf = [0u8; 1024];
		while !data.windows(4).any(|w| w == b"\r\n\r\n") {
			let len = strm.read(&mut buf)?;
			if len == 0 {
				break;
			}
			data.extend(&buf[0..len]);
		}
		let head = String::from_utf8_lossy(&data).to_string();
		assert!(head.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
		assert!(head.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));

		// masked "Hello" in, unmasked echo out
		strm.write(&[
			0x81u8, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
		])?;
		let mut frame = [0u8; 7];
		strm.read_exact(&mut frame)?;
		assert_eq!(&frame, &[0x81u8, 0x05, b'H', b'e', b'l', b'l', b'o']);

		// close handshake: the engine answers with its own close frame
		strm.write(&[0x88u8, 0x80, 0, 0, 0, 0])?;
		let mut close_reply = [0u8; 2];
		strm.read_exact(&mut close_reply)?;
		assert_eq!(&close_reply, &[0x88u8, 0x00]);

		server.stop()?;
		Ok(())
	}

	fn v1_handler(_req: &mut HttpRequest<'_>, resp: &mut HttpResponse<'_>) -> Result<(), Error> {
		resp.send(b"v1")
	}

	#[test]
	fn test_server_mounts_first_prefix() -> Result<(), Error> {
		let port = pick_free_port()?;
		let mut server = http_server!(Port(port), MaxConnections(8), SelectTimeoutMillis(100))?;

		let mut api = HttpRouter::new();
		api.add_route(HttpMethod::GET, "/v1", v1_handler)?;
		server.mount("/api", api)?;

		// the root router also carries /api/other, but the mount wins on its prefix
		server.router().add_route(HttpMethod::GET, "/api/other", hello_handler)?;
		server.router().add_route(HttpMethod::GET, "/plain", hello_handler)?;
		server.start()?;

		let mut strm = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		strm.write(b"GET /api/v1 HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
		let (head, body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
		assert_eq!(body, b"v1");

		// dispatch stops at the first matching prefix: the mounted router misses and
		// the root router is never consulted
		strm.write(b"GET /api/other HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
		let (head, _body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));

		// paths outside the prefix fall back to the root router
		strm.write(b"GET /plain HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
		let (head, body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
		assert_eq!(body, b"hello world");

		server.stop()?;
		Ok(())
	}

	#[test]
	fn test_server_static_files() -> Result<(), Error> {
		let test_dir = ".test_server_static_files.ews";
		setup_test_dir(test_dir)?;
		std::fs::write(format!("{}/page.txt", test_dir), b"static content here")?;
		std::fs::create_dir_all(format!("{}/sub", test_dir))?;
		std::fs::write(format!("{}/sub/index.html", test_dir), b"<html>idx</html>")?;

		let port = pick_free_port()?;
		let mut server = http_server!(
			Port(port),
			MaxConnections(8),
			SelectTimeoutMillis(100),
			HttpDir(test_dir.to_string())
		)?;
		server.start()?;

		let mut strm = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		strm.write(b"GET /page.txt HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
		let (head, body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
		assert!(head.contains("Content-Type: text/plain"));
		assert_eq!(body, b"static content here");

		// directory paths resolve to index.html
		strm.write(b"GET /sub/ HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
		let (head, body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
		assert!(head.contains("Content-Type: text/html"));
		assert_eq!(body, b"<html>idx</html>");

		// traversal is forbidden
		strm.write(b"GET /../secret HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
		let (head, _body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 403 Forbidden\r\n"));

		// missing files are 404
		strm.write(b"GET /nothere.txt HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
		let (head, _body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));

		server.stop()?;
		tear_down_test_dir(test_dir)?;
		Ok(())
	}

	#[test]
	fn test_server_gz_sibling() -> Result<(), Error> {
		let test_dir = ".test_server_gz_sibling.ews";
		setup_test_dir(test_dir)?;
		std::fs::write(format!("{}/app.js", test_dir), b"plain js")?;
		std::fs::write(format!("{}/app.js.gz", test_dir), b"gzipped bytes")?;

		let port = pick_free_port()?;
		let mut server = http_server!(
			Port(port),
			MaxConnections(8),
			SelectTimeoutMillis(100),
			HttpDir(test_dir.to_string())
		)?;
		server.start()?;

		let mut strm = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		strm.write(b"GET /app.js HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
		let (head, body) = read_response(&mut strm)?;
		assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
		assert!(head.contains("Content-Encoding: gzip"));
		assert!(head.contains("Content-Type: application/javascript"));
		assert_eq!(body, b"gzipped bytes");

		server.stop()?;
		tear_down_test_dir(test_dir)?;
		Ok(())
	}

	#[test]
	fn test_server_start_stop_errors() -> Result<(), Error> {
		let port = pick_free_port()?;
		let mut server = build_server(port)?;
		assert!(server.start().is_err());
		server.stop()?;
		assert!(server.stop().is_err());
		Ok(())
	}
}
