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
use crate::types::{WsContext, WsFrameState, WsMessageType};
use ews_deps::base64;
use ews_deps::byteorder::{BigEndian, ByteOrder};
use ews_deps::rand::random;
use ews_deps::sha1::{Digest, Sha1};
use ews_err::*;
use ews_log::*;

debug!();

// What a chunk of websocket bytes produced: zero or more deliveries, then a status.
#[derive(Debug)]
pub(crate) enum WsDelivery {
	Message { opcode: u8, payload: Vec<u8> },
	Ping { payload: Vec<u8> },
	Pong,
}

#[derive(PartialEq, Copy, Clone, Debug)]
pub(crate) enum WsStatus {
	Ok,
	Close,
}

impl WsContext {
	pub(crate) fn new() -> Self {
		Self {
			state: WsFrameState::Opcode,
			fin: false,
			opcode: 0,
			msg_opcode: 0,
			masked: false,
			payload_len: 0,
			payload_read: 0,
			mask_key: [0u8; 4],
			len_bytes: [0u8; 8],
			len_bytes_needed: 0,
			len_bytes_got: 0,
			mask_bytes_got: 0,
			payload: vec![],
			ctrl_payload: vec![],
			ping_interval_ticks: 0,
			last_ping_tick: 0,
		}
	}

	pub(crate) fn reset(&mut self) {
		self.state = WsFrameState::Opcode;
		self.fin = false;
		self.opcode = 0;
		self.msg_opcode = 0;
		self.masked = false;
		self.payload_len = 0;
		self.payload_read = 0;
		self.mask_key = [0u8; 4];
		self.len_bytes = [0u8; 8];
		self.len_bytes_needed = 0;
		self.len_bytes_got = 0;
		self.mask_bytes_got = 0;
		self.payload.clear();
		self.ctrl_payload.clear();
		self.ping_interval_ticks = 0;
		self.last_ping_tick = 0;
	}

	fn is_control(&self) -> bool {
		self.opcode == WS_OP_CLOSE || self.opcode == WS_OP_PING || self.opcode == WS_OP_PONG
	}

	// reset only the per-frame fields; message assembly state survives
	fn next_frame(&mut self) {
		self.state = WsFrameState::Opcode;
		self.payload_len = 0;
		self.payload_read = 0;
		self.len_bytes_got = 0;
		self.len_bytes_needed = 0;
		self.mask_bytes_got = 0;
	}
}

/// Sec-WebSocket-Accept value for a client key, per RFC 6455: the base64 of the sha1 of
/// the key concatenated with the websocket GUID.
pub fn ws_compute_accept_key(client_key: &str) -> String {
	let mut sha1 = Sha1::new();
	sha1.update(format!("{}{}", client_key, WEBSOCKET_GUID).as_bytes());
	base64::encode(&sha1.finalize()[..])
}

// The 101 response completing a websocket handshake.
pub(crate) fn handshake_response(client_key: &str) -> String {
	format!(
		"HTTP/1.1 101 Switching Protocols\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Accept: {}\r\n\r\n",
		ws_compute_accept_key(client_key)
	)
}

/// Build a single websocket frame. Payloads above 65535 bytes are not supported by this
/// engine. Server-originated frames are unmasked; `mask` exists for client-side use in
/// tests.
pub fn ws_build_frame(mtype: WsMessageType, payload: &[u8], mask: bool) -> Result<Vec<u8>, Error> {
	let payload_len = payload.len();
	if payload_len > WS_MAX_FRAME_PAYLOAD {
		let text = format!("payload of {} exceeds the 65535 byte cap", payload_len);
		return Err(err!(ErrKind::CapacityExceeded, text));
	}

	let opcode = match mtype {
		WsMessageType::Text => WS_OP_TEXT,
		WsMessageType::Binary => WS_OP_BINARY,
		WsMessageType::Close => WS_OP_CLOSE,
		WsMessageType::Ping => WS_OP_PING,
		WsMessageType::Pong => WS_OP_PONG,
	};

	// no fragmentation on the send side; every frame is final
	let mut ret = vec![FIN_BIT | opcode, if mask { MASK_BIT } else { 0 }];

	if payload_len < 126 {
		ret[1] |= payload_len as u8;
	} else {
		ret[1] |= 126;
		let mut ext = [0u8; 2];
		BigEndian::write_u16(&mut ext, try_into!(payload_len)?);
		ret.extend(ext);
	}

	if mask {
		let mask_key: [u8; 4] = random();
		ret.extend(mask_key);
		let start = ret.len();
		ret.extend(payload);
		unmask_payload(&mut ret[start..], &mask_key, 0);
	} else {
		ret.extend(payload);
	}

	Ok(ret)
}

/// XOR the buffer with the 4-byte mask key, starting at `offset` within the frame payload
/// so unmasking can resume across chunk boundaries. Byte-at-a-time until the offset is
/// key-aligned, then 8-byte strides, then the tail. XOR is an involution, so the same
/// routine masks and unmasks.
pub(crate) fn unmask_payload(data: &mut [u8], key: &[u8; 4], offset: usize) {
	let len = data.len();
	let mut i = 0;
	let mut offset = offset;

	while i < len && offset % 4 != 0 {
		data[i] ^= key[offset % 4];
		i += 1;
		offset += 1;
	}

	let word = u64::from_ne_bytes([
		key[0], key[1], key[2], key[3], key[0], key[1], key[2], key[3],
	]);
	let mut chunks = data[i..].chunks_exact_mut(8);
	for chunk in &mut chunks {
		let v = u64::from_ne_bytes([
			chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
		]) ^ word;
		chunk.copy_from_slice(&v.to_ne_bytes());
	}

	let rem = chunks.into_remainder();
	for (j, b) in rem.iter_mut().enumerate() {
		*b ^= key[j % 4];
	}
}

// Streaming frame parser. Consumes as much of `data` as possible, returning the completed
// deliveries and whether a close frame was seen. Parser state persists in the context so
// frames may arrive split at any byte boundary. Control frames never interrupt message
// assembly; continuation frames accumulate until a final frame completes the message.
pub(crate) fn ws_process(
	ctx: &mut WsContext,
	data: &[u8],
) -> Result<(Vec<WsDelivery>, WsStatus, usize), Error> {
	let mut deliveries = vec![];
	let mut i = 0;
	let len = data.len();

	while i < len {
		match ctx.state {
			WsFrameState::Opcode => {
				let b = data[i];
				i += 1;
				ctx.fin = b & FIN_BIT != 0;
				ctx.opcode = b & OP_CODE_MASK;
				match ctx.opcode {
					WS_OP_CONTINUATION | WS_OP_TEXT | WS_OP_BINARY | WS_OP_CLOSE
					| WS_OP_PING | WS_OP_PONG => {}
					_ => {
						let text = format!("invalid websocket opcode: {}", ctx.opcode);
						return Err(err!(ErrKind::WsFrame, text));
					}
				}
				if ctx.is_control() && !ctx.fin {
					return Err(err!(ErrKind::WsFrame, "control frames must set fin"));
				}
				if !ctx.is_control() && ctx.opcode != WS_OP_CONTINUATION {
					ctx.msg_opcode = ctx.opcode;
				}
				ctx.state = WsFrameState::Len;
			}
			WsFrameState::Len => {
				let b = data[i];
				i += 1;
				ctx.masked = b & MASK_BIT != 0;
				let len7 = b & !MASK_BIT;
				if len7 == 126 {
					ctx.len_bytes_needed = 2;
					ctx.len_bytes_got = 0;
					ctx.state = WsFrameState::LenExt;
				} else if len7 == 127 {
					ctx.len_bytes_needed = 8;
					ctx.len_bytes_got = 0;
					ctx.state = WsFrameState::LenExt;
				} else {
					ctx.payload_len = len7 as usize;
					ctx.check_payload_len()?;
					ctx.state = if ctx.masked {
						WsFrameState::Mask
					} else {
						WsFrameState::Payload
					};
					if let Some(status) = ctx.frame_boundary(&mut deliveries)? {
						return Ok((deliveries, status, i));
					}
				}
			}
			WsFrameState::LenExt => {
				ctx.len_bytes[ctx.len_bytes_got as usize] = data[i];
				i += 1;
				ctx.len_bytes_got += 1;
				if ctx.len_bytes_got == ctx.len_bytes_needed {
					let payload_len = if ctx.len_bytes_needed == 2 {
						BigEndian::read_u16(&ctx.len_bytes[0..2]) as u64
					} else {
						BigEndian::read_u64(&ctx.len_bytes[0..8])
					};
					// the 64 bit form is accepted on the wire but bounded by the
					// engine cap
					if payload_len > WS_MAX_FRAME_PAYLOAD as u64 {
						let text =
							format!("frame payload of {} exceeds the engine cap", payload_len);
						return Err(err!(ErrKind::WsFrame, text));
					}
					ctx.payload_len = payload_len as usize;
					ctx.check_payload_len()?;
					ctx.state = if ctx.masked {
						WsFrameState::Mask
					} else {
						WsFrameState::Payload
					};
					if let Some(status) = ctx.frame_boundary(&mut deliveries)? {
						return Ok((deliveries, status, i));
					}
				}
			}
			WsFrameState::Mask => {
				ctx.mask_key[ctx.mask_bytes_got as usize] = data[i];
				i += 1;
				ctx.mask_bytes_got += 1;
				if ctx.mask_bytes_got == 4 {
					ctx.state = WsFrameState::Payload;
					if let Some(status) = ctx.frame_boundary(&mut deliveries)? {
						return Ok((deliveries, status, i));
					}
				}
			}
			WsFrameState::Payload => {
				let want = ctx.payload_len - ctx.payload_read;
				let avail = len - i;
				let take = if want > avail { avail } else { want };

				let mut chunk = data[i..i + take].to_vec();
				if ctx.masked {
					let mask_key = ctx.mask_key;
					unmask_payload(&mut chunk, &mask_key, ctx.payload_read);
				}
				if ctx.is_control() {
					ctx.ctrl_payload.extend(&chunk);
				} else {
					if ctx.payload.len() + chunk.len() > WS_PAYLOAD_CEILING {
						let text = format!(
							"message exceeds the {} byte assembly ceiling",
							WS_PAYLOAD_CEILING
						);
						return Err(err!(ErrKind::WsFrame, text));
					}
					ctx.payload.extend(&chunk);
				}
				ctx.payload_read += take;
				i += take;

				if ctx.payload_read == ctx.payload_len {
					if let Some(status) = ctx.frame_complete(&mut deliveries)? {
						return Ok((deliveries, status, i));
					}
				}
			}
		}
	}

	Ok((deliveries, WsStatus::Ok, i))
}

impl WsContext {
	fn check_payload_len(&mut self) -> Result<(), Error> {
		if self.is_control() && self.payload_len > WS_CONTROL_MAX_PAYLOAD {
			let text = format!(
				"control frame payload of {} exceeds {} bytes",
				self.payload_len, WS_CONTROL_MAX_PAYLOAD
			);
			return Err(err!(ErrKind::WsFrame, text));
		}
		Ok(())
	}

	// Called when the header is fully parsed; zero-length frames complete immediately.
	fn frame_boundary(
		&mut self,
		deliveries: &mut Vec<WsDelivery>,
	) -> Result<Option<WsStatus>, Error> {
		if self.state == WsFrameState::Payload && self.payload_len == 0 {
			self.frame_complete(deliveries)
		} else {
			Ok(None)
		}
	}

	fn frame_complete(
		&mut self,
		deliveries: &mut Vec<WsDelivery>,
	) -> Result<Option<WsStatus>, Error> {
		debug!(
			"frame complete: opcode={},fin={},len={}",
			self.opcode, self.fin, self.payload_len
		)?;
		match self.opcode {
			WS_OP_CLOSE => {
				self.ctrl_payload.clear();
				self.next_frame();
				return Ok(Some(WsStatus::Close));
			}
			WS_OP_PING => {
				let payload = std::mem::take(&mut self.ctrl_payload);
				deliveries.push(WsDelivery::Ping { payload });
			}
			WS_OP_PONG => {
				self.ctrl_payload.clear();
				deliveries.push(WsDelivery::Pong);
			}
			_ => {
				if self.fin {
					let payload = std::mem::take(&mut self.payload);
					deliveries.push(WsDelivery::Message {
						opcode: self.msg_opcode,
						payload,
					});
				}
			}
		}
		self.next_frame();
		Ok(None)
	}
}
