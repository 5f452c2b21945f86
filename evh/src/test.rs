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
	use crate::pool::ConnPool;
	use crate::sendbuf::SendBuf;
	use crate::types::{ConnState, INVALID_HANDLE};
	use crate::{EventLoop, EvhBuilder};
	use ews_conf::ConfigOption::*;
	use ews_err::*;
	use ews_log::*;
	use ews_test::*;
	use std::io::{Read, Write};
	use std::net::TcpStream;
	use std::sync::mpsc::sync_channel;

	debug!();

	#[test]
	fn test_pool_alloc_free() -> Result<(), Error> {
		let mut pool = ConnPool::new(32)?;

		// fill all 32 slots
		for i in 0..32 {
			let idx = pool.alloc();
			assert_eq!(idx, Some(i));
			assert_eq!(pool.slot(i).unwrap().state(), ConnState::New);
			assert_eq!(pool.slot(i).unwrap().handle(), INVALID_HANDLE);
		}
		assert_eq!(pool.count_active(), 32);
		assert_eq!(pool.alloc(), None);

		// lowest-zero-bit policy: releasing slot 15 hands slot 15 back
		pool.free(15);
		assert_eq!(pool.count_active(), 31);
		assert_eq!(pool.slot(15).unwrap().state(), ConnState::Free);
		assert_eq!(pool.alloc(), Some(15));
		assert_eq!(pool.count_active(), 32);

		// active popcount always matches the non-free slot count
		let mut non_free = 0;
		for i in 0..32 {
			if pool.slot(i).unwrap().state() != ConnState::Free {
				non_free += 1;
			}
		}
		assert_eq!(pool.count_active(), non_free);
		Ok(())
	}

	#[test]
	fn test_pool_free_clears_masks() -> Result<(), Error> {
		let mut pool = ConnPool::new(8)?;
		let idx = pool.alloc().unwrap();
		pool.slot_mut(idx).unwrap().handle = 77;
		pool.mark_ws_active(idx, true);
		pool.mark_write_pending(idx, true);
		assert_ne!(pool.ws_active_mask() & (1 << idx), 0);
		assert_ne!(pool.write_pending_mask() & (1 << idx), 0);

		pool.free(idx);
		assert_eq!(pool.active_mask() & (1 << idx), 0);
		assert_eq!(pool.ws_active_mask() & (1 << idx), 0);
		assert_eq!(pool.write_pending_mask() & (1 << idx), 0);
		assert_eq!(pool.slot(idx).unwrap().handle(), INVALID_HANDLE);
		assert_eq!(pool.slot(idx).unwrap().state(), ConnState::Free);
		Ok(())
	}

	#[test]
	fn test_pool_invalid_index_noops() -> Result<(), Error> {
		let mut pool = ConnPool::new(4)?;
		pool.free(100);
		pool.mark_ws_active(100, true);
		pool.mark_write_pending(100, true);
		assert_eq!(pool.active_mask(), 0);
		assert!(pool.slot(100).is_none());
		assert!(ConnPool::new(33).is_err());
		assert!(ConnPool::new(0).is_err());
		Ok(())
	}

	#[test]
	fn test_pool_find_by_fd() -> Result<(), Error> {
		let mut pool = ConnPool::new(8)?;
		let a = pool.alloc().unwrap();
		let b = pool.alloc().unwrap();
		pool.slot_mut(a).unwrap().handle = 10;
		pool.slot_mut(b).unwrap().handle = 20;
		assert_eq!(pool.find_by_fd(20), Some(b));
		assert_eq!(pool.find_by_fd(10), Some(a));
		assert_eq!(pool.find_by_fd(30), None);
		// only active slots are visited
		pool.free(a);
		assert_eq!(pool.find_by_fd(10), None);
		Ok(())
	}

	#[test]
	fn test_sendbuf_ring() -> Result<(), Error> {
		let mut sb = SendBuf::new(8);
		assert!(!sb.has_data());
		sb.queue(b"abcde")?;
		assert_eq!(sb.len(), 5);
		assert_eq!(sb.peek(), b"abcde");
		sb.consume(3);
		assert_eq!(sb.peek(), b"de");

		// wraps around the end of the ring
		sb.queue(b"fghij")?;
		assert_eq!(sb.len(), 7);
		assert_eq!(sb.peek(), b"defgh");
		sb.consume(5);
		assert_eq!(sb.peek(), b"ij");
		sb.consume(2);
		assert!(!sb.has_data());

		// queue never partially succeeds
		sb.queue(b"12345678")?;
		assert!(sb.queue(b"9").is_err());
		assert_eq!(sb.len(), 8);
		Ok(())
	}

	#[test]
	fn test_sendbuf_write_ptr_commit() -> Result<(), Error> {
		let mut sb = SendBuf::new(8);
		let slack = sb.write_ptr();
		assert_eq!(slack.len(), 8);
		slack[0..3].clone_from_slice(b"xyz");
		sb.commit(3);
		assert_eq!(sb.peek(), b"xyz");
		sb.consume(1);
		// slack is the contiguous tail region
		let slack = sb.write_ptr();
		assert_eq!(slack.len(), 5);
		Ok(())
	}

	#[test]
	fn test_evh_echo() -> Result<(), Error> {
		let port = pick_free_port()?;

		let mut evh = EvhBuilder::build_event_loop(vec![
			Port(port),
			MaxConnections(8),
			SelectTimeoutMillis(100),
		])?;

		evh.set_on_accept(move |_ctx, _idx| Ok(()))?;
		evh.set_on_read(move |ctx, idx, data| {
			if data == b"quit" {
				ctx.close(idx);
				return Ok(());
			}
			let data = data.to_vec();
			ctx.send(idx, &data)?;
			Ok(())
		})?;
		evh.set_on_write_ready(move |_ctx, _idx| Ok(()))?;
		evh.set_on_close(move |_ctx, _idx| Ok(()))?;
		evh.set_on_housekeeper(move |_ctx| Ok(()))?;

		evh.start()?;

		let mut strm = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		strm.write(b"hello")?;
		let mut buf = [0u8; 100];
		let len = strm.read(&mut buf)?;
		assert_eq!(&buf[0..len], b"hello");

		// an explicit close from the handler drops the connection
		strm.write(b"quit")?;
		let len = strm.read(&mut buf)?;
		assert_eq!(len, 0);

		evh.stop()?;
		Ok(())
	}

	#[test]
	fn test_evh_ordering() -> Result<(), Error> {
		let port = pick_free_port()?;

		let mut evh = EvhBuilder::build_event_loop(vec![
			Port(port),
			MaxConnections(8),
			SelectTimeoutMillis(100),
		])?;

		evh.set_on_accept(move |_ctx, _idx| Ok(()))?;
		// three separate submissions from one handler call must hit the wire in order
		evh.set_on_read(move |ctx, idx, _data| {
			ctx.send(idx, b"first.")?;
			ctx.send(idx, &vec![b'x'; 3000])?;
			ctx.send(idx, b".last")?;
			Ok(())
		})?;
		evh.set_on_write_ready(move |_ctx, _idx| Ok(()))?;
		evh.set_on_close(move |_ctx, _idx| Ok(()))?;
		evh.set_on_housekeeper(move |_ctx| Ok(()))?;

		evh.start()?;

		let mut strm = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		strm.write(b"go")?;
		let mut received: Vec<u8> = vec![];
		let mut buf = [0u8; 1024];
		while received.len() < 3011 {
			let len = strm.read(&mut buf)?;
			if len == 0 {
				break;
			}
			received.extend(&buf[0..len]);
		}
		assert_eq!(received.len(), 3011);
		assert_eq!(&received[0..6], b"first.");
		assert_eq!(&received[6..3006], &vec![b'x'; 3000][..]);
		assert_eq!(&received[3006..], b".last");

		evh.stop()?;
		Ok(())
	}

	#[test]
	fn test_evh_pool_exhaustion() -> Result<(), Error> {
		let port = pick_free_port()?;

		let mut evh = EvhBuilder::build_event_loop(vec![
			Port(port),
			MaxConnections(1),
			SelectTimeoutMillis(100),
		])?;

		let (tx, rx) = sync_channel(1);
		evh.set_on_accept(move |_ctx, _idx| {
			let _ = tx.send(());
			Ok(())
		})?;
		evh.set_on_read(move |ctx, idx, data| {
			let data = data.to_vec();
			ctx.send(idx, &data)?;
			Ok(())
		})?;
		evh.set_on_write_ready(move |_ctx, _idx| Ok(()))?;
		evh.set_on_close(move |_ctx, _idx| Ok(()))?;
		evh.set_on_housekeeper(move |_ctx| Ok(()))?;

		evh.start()?;

		let mut strm1 = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		rx.recv()?;

		// the pool only has one slot; the second connection is rejected with a close
		let mut strm2 = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		let mut buf = [0u8; 10];
		let len = strm2.read(&mut buf)?;
		assert_eq!(len, 0);

		// the first connection still works
		strm1.write(b"ping")?;
		let len = strm1.read(&mut buf)?;
		assert_eq!(&buf[0..len], b"ping");

		evh.stop()?;
		Ok(())
	}

	#[test]
	fn test_evh_inactivity_timeout() -> Result<(), Error> {
		let port = pick_free_port()?;

		let mut evh = EvhBuilder::build_event_loop(vec![
			Port(port),
			MaxConnections(4),
			SelectTimeoutMillis(50),
			TimeoutMillis(200),
		])?;

		evh.set_on_accept(move |_ctx, _idx| Ok(()))?;
		evh.set_on_read(move |_ctx, _idx, _data| Ok(()))?;
		evh.set_on_write_ready(move |_ctx, _idx| Ok(()))?;
		let (tx, rx) = sync_channel(1);
		evh.set_on_close(move |_ctx, idx| {
			let _ = tx.send(idx);
			Ok(())
		})?;
		evh.set_on_housekeeper(move |_ctx| Ok(()))?;

		evh.start()?;

		// connect and go idle; the loop closes the slot once the tick budget runs out
		let mut strm = TcpStream::connect(format!("127.0.0.1:{}", port))?;
		let idx = rx.recv()?;
		assert_eq!(idx, 0);
		let mut buf = [0u8; 10];
		let len = strm.read(&mut buf)?;
		assert_eq!(len, 0);

		evh.stop()?;
		Ok(())
	}

	#[test]
	fn test_evh_stop_errors() -> Result<(), Error> {
		let port = pick_free_port()?;

		let mut evh = EvhBuilder::build_event_loop(vec![Port(port), SelectTimeoutMillis(100)])?;
		evh.set_on_accept(move |_ctx, _idx| Ok(()))?;
		evh.set_on_read(move |_ctx, _idx, _data| Ok(()))?;
		evh.set_on_write_ready(move |_ctx, _idx| Ok(()))?;
		evh.set_on_close(move |_ctx, _idx| Ok(()))?;
		evh.set_on_housekeeper(move |_ctx| Ok(()))?;

		evh.start()?;
		assert!(evh.start().is_err());
		evh.stop()?;
		assert!(evh.stop().is_err());
		Ok(())
	}
}
