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

use crate::types::{HttpRequest, HttpResponse};
use ews_err::*;
use ews_log::*;
use std::fs::{metadata, File};

debug!();

/// Content type for a path, keyed on the (case-insensitive) extension. Unknown extensions
/// map to `application/octet-stream`.
pub fn get_mime(path: &str) -> &'static str {
	let ext = match path.rfind('.') {
		Some(pos) => &path[pos + 1..],
		None => "",
	};
	match ext.to_lowercase().as_str() {
		"html" | "htm" => "text/html",
		"js" => "application/javascript",
		"json" => "application/json",
		"css" => "text/css",
		"png" => "image/png",
		"jpg" | "jpeg" => "image/jpeg",
		"svg" => "image/svg+xml",
		"ico" => "image/x-icon",
		"woff" => "font/woff",
		"woff2" => "font/woff2",
		"ttf" => "font/ttf",
		"otf" => "font/otf",
		"gif" => "image/gif",
		"webp" => "image/webp",
		"txt" => "text/plain",
		"pdf" => "application/pdf",
		"zip" => "application/zip",
		"gz" => "application/gzip",
		"xml" => "text/xml",
		_ => "application/octet-stream",
	}
}

/// Validate a request path for file serving. Rejects parent references, url-encoded
/// dots/slashes/backslashes/NULs, double slashes and backslashes.
pub fn validate_path(path: &str) -> bool {
	if !path.starts_with('/') {
		return false;
	}
	if path.contains("..") || path.contains("//") || path.contains('\\') || path.contains('\0') {
		return false;
	}
	let lower = path.to_lowercase();
	if lower.contains("%2e") || lower.contains("%2f") || lower.contains("%5c") || lower.contains("%00") {
		return false;
	}
	true
}

/// Serve a file below `http_dir`. Directory paths resolve to `index.html`; a `.gz`
/// sibling is preferred and served with `Content-Encoding: gzip`. The body is streamed
/// through the connection's send buffer.
pub fn serve_file(
	http_dir: &str,
	path: &str,
	req: &HttpRequest<'_>,
	resp: &mut HttpResponse<'_>,
) -> Result<(), Error> {
	if !validate_path(path) {
		let text = format!("rejected file path: {}", path);
		return Err(err!(ErrKind::IllegalArgument, text));
	}

	let mut rel = path.to_string();
	if rel.ends_with('/') {
		rel.push_str("index.html");
	}
	let fpath = format!("{}{}", http_dir.trim_end_matches('/'), rel);

	// a pre-compressed sibling wins when present
	let gz_path = format!("{}.gz", fpath);
	let (fpath, gzipped) = match metadata(&gz_path) {
		Ok(md) if md.is_file() => (gz_path, true),
		_ => (fpath, false),
	};

	let md = match metadata(&fpath) {
		Ok(md) if md.is_file() => md,
		_ => {
			debug!("no such file: {}", fpath)?;
			let text = format!("not found: {}", path);
			return Err(err!(ErrKind::NotFound, text));
		}
	};

	let mime = get_mime(path);
	resp.header("Content-Type", mime)?;
	if gzipped {
		resp.header("Content-Encoding", "gzip")?;
	}

	if req.method() == crate::HttpMethod::HEAD {
		return resp.send_head_only(md.len());
	}

	let file = File::open(&fpath)?;
	resp.send_file(file, md.len())
}
