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

use ews_conf::ConfigOption::*;
use ews_err::Error;
use ews_http::{
	Builder, HttpMethod, HttpRequest, HttpResponse, WsConn, WsEvent, WsMessageType,
};
use ews_log::*;
#[cfg(not(test))]
use std::thread::park;

info!();

fn hello(_req: &mut HttpRequest<'_>, resp: &mut HttpResponse<'_>) -> Result<(), Error> {
	resp.header("Content-Type", "text/plain")?;
	resp.send(b"hello from ews\n")
}

fn greet(req: &mut HttpRequest<'_>, resp: &mut HttpResponse<'_>) -> Result<(), Error> {
	let name = req.param("name").unwrap_or("world").to_string();
	resp.header("Content-Type", "text/plain")?;
	resp.send(format!("hello, {}!\n", name).as_bytes())
}

fn chat(conn: &mut WsConn<'_>, event: &WsEvent<'_>) -> Result<(), Error> {
	match event {
		WsEvent::Open => conn.join("lobby"),
		WsEvent::Message { payload, .. } => {
			conn.publish("lobby", WsMessageType::Text, payload)
		}
		WsEvent::Close => Ok(()),
	}
}

fn main() -> Result<(), Error> {
	real_main(None)?;
	Ok(())
}

fn real_main(port_override: Option<u16>) -> Result<(), Error> {
	log_init!(DisplayColors(true), DisplayMillis(true))?;

	let port = port_override.unwrap_or(8080);
	let mut server = Builder::build_http_server(vec![
		Port(port),
		Addr("127.0.0.1".to_string()),
		MaxConnections(16),
		ServerName("ews-demo".to_string()),
	])?;

	server.router().add_route(HttpMethod::GET, "/hello", hello)?;
	server.router().add_route(HttpMethod::GET, "/greet/:name", greet)?;
	server.router().add_ws_route("/chat", chat, Some(30_000))?;

	server.start()?;
	info!("listener on port {}", port)?;

	#[cfg(not(test))]
	park();

	#[cfg(test)]
	server.stop()?;

	Ok(())
}

#[cfg(test)]
mod test {
	use crate::real_main;
	use ews_err::Error;
	use ews_test::*;

	#[test]
	fn test_demo_startup() -> Result<(), Error> {
		let port = pick_free_port()?;
		assert!(real_main(Some(port)).is_ok());
		Ok(())
	}
}
