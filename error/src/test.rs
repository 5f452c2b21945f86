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
	use crate as ews_err;
	use crate::{err, map_err, try_into, ErrKind, Error, ErrorKind};
	use std::convert::TryInto;
	use std::fs::File;

	fn get_err_io() -> Result<(), Error> {
		Err(err!(ErrKind::IO, "io error"))
	}

	fn get_err_fmt(code: u16) -> Result<(), Error> {
		Err(err!(ErrKind::Parse, "bad status: {}", code))
	}

	#[test]
	fn test_err_macro() -> Result<(), Error> {
		let e = get_err_io().unwrap_err();
		assert_eq!(e.kind(), ErrorKind::IO("io error".to_string()));

		let e = get_err_fmt(400).unwrap_err();
		assert_eq!(e.kind(), ErrorKind::Parse("bad status: 400".to_string()));
		Ok(())
	}

	#[test]
	fn test_map_err_macro() -> Result<(), Error> {
		let res = map_err!(File::open("/no/such/path"), ErrKind::IO, "open failed");
		assert!(res.is_err());
		match res.unwrap_err().kind() {
			ErrorKind::IO(_) => {}
			_ => panic!("expected IO error"),
		}
		Ok(())
	}

	#[test]
	fn test_try_into_macro() -> Result<(), Error> {
		let v: u64 = 100;
		let v: u16 = try_into!(v)?;
		assert_eq!(v, 100u16);

		let v: u64 = 100_000;
		let res: Result<u16, Error> = try_into!(v);
		assert!(res.is_err());
		Ok(())
	}

	#[test]
	fn test_from_conversions() -> Result<(), Error> {
		let e: Error = std::io::Error::new(std::io::ErrorKind::Other, "x").into();
		match e.kind() {
			ErrorKind::IO(_) => {}
			_ => panic!("expected IO"),
		}

		let r: Result<u8, _> = 1000usize.try_into();
		let e: Error = r.unwrap_err().into();
		match e.kind() {
			ErrorKind::Misc(_) => {}
			_ => panic!("expected Misc"),
		}

		let e: Error = std::str::from_utf8(&[0xffu8, 0xfe]).unwrap_err().into();
		match e.kind() {
			ErrorKind::Utf8(_) => {}
			_ => panic!("expected Utf8"),
		}
		Ok(())
	}

	#[test]
	fn test_eq_by_kind() -> Result<(), Error> {
		let e1 = err!(ErrKind::ConnClosed, "peer gone");
		let e2 = err!(ErrKind::ConnClosed, "peer gone");
		assert_eq!(e1, e2);
		let e3 = err!(ErrKind::NotFound, "peer gone");
		assert_ne!(e1, e3);
		Ok(())
	}
}
