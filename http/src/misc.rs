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

/// Status text for the common http status codes. Unknown codes map to "Unknown".
pub fn status_text(code: u16) -> &'static str {
	match code {
		100 => "Continue",
		200 => "OK",
		201 => "Created",
		204 => "No Content",
		301 => "Moved Permanently",
		302 => "Found",
		304 => "Not Modified",
		400 => "Bad Request",
		401 => "Unauthorized",
		403 => "Forbidden",
		404 => "Not Found",
		405 => "Method Not Allowed",
		408 => "Request Timeout",
		413 => "Payload Too Large",
		414 => "URI Too Long",
		415 => "Unsupported Media Type",
		426 => "Upgrade Required",
		500 => "Internal Server Error",
		501 => "Not Implemented",
		502 => "Bad Gateway",
		503 => "Service Unavailable",
		_ => "Unknown",
	}
}

// hex digit lookup; -1 for non-hex bytes
static HEX_TABLE: [i8; 256] = build_hex_table();

const fn build_hex_table() -> [i8; 256] {
	let mut table = [-1i8; 256];
	let mut i = 0;
	while i < 10 {
		table[b'0' as usize + i] = i as i8;
		i += 1;
	}
	let mut i = 0;
	while i < 6 {
		table[b'a' as usize + i] = 10 + i as i8;
		table[b'A' as usize + i] = 10 + i as i8;
		i += 1;
	}
	table
}

/// Decode a percent-encoded string. `+` becomes a space and invalid `%` sequences pass
/// through unchanged.
pub fn url_decode(input: &str) -> String {
	let bytes = input.as_bytes();
	let len = bytes.len();
	let mut out = Vec::with_capacity(len);
	let mut i = 0;
	while i < len {
		let b = bytes[i];
		if b == b'+' {
			out.push(b' ');
			i += 1;
		} else if b == b'%' {
			if i + 2 < len {
				let hi = HEX_TABLE[bytes[i + 1] as usize];
				let lo = HEX_TABLE[bytes[i + 2] as usize];
				if hi >= 0 && lo >= 0 {
					out.push(((hi as u8) << 4) | lo as u8);
					i += 3;
					continue;
				}
			}
			out.push(b);
			i += 1;
		} else {
			out.push(b);
			i += 1;
		}
	}
	String::from_utf8_lossy(&out).to_string()
}

/// Percent-encode a string for use in a url.
pub fn url_encode(input: &str) -> String {
	let mut out = String::with_capacity(input.len());
	for b in input.bytes() {
		match b {
			b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
				out.push(b as char);
			}
			b' ' => out.push('+'),
			_ => out.push_str(&format!("%{:02X}", b)),
		}
	}
	out
}
