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

/// Build the specified [`crate::ErrorKind`] and convert it into an [`crate::Error`]. The desired
/// [`crate::ErrorKind`] is specified using the [`crate::ErrKind`] name enum.
///
/// Example:
///
///```
/// use ews_err::{err, ErrKind, Error, ErrorKind};
///
/// fn main() -> Result<(), Error> {
///     show_err_kind(false)?;
///     Ok(())
/// }
///
/// fn show_err_kind(do_error: bool) -> Result<(), Error> {
///     let e = err!(ErrKind::Configuration, "invalid parameter name");
///
///     if do_error {
///         return Err(e);
///     }
///
///     Ok(())
/// }
///```
#[macro_export]
macro_rules! err {
	($kind:expr, $msg:expr, $($param:tt)*) => {{
                use ews_err::err;
                let msg = &format!($msg, $($param)*)[..];
                err!($kind, msg)
        }};
	($kind:expr, $m:expr) => {{
                #[allow(unused_imports)]
                use ews_err::{impl_err, ErrKind, Error, ErrorKind};
                use ews_err::ErrKind::*;
		match $kind {
                        IO => impl_err!(IO, $m),
                        Log => impl_err!(Log, $m),
                        Utf8 => impl_err!(Utf8, $m),
                        Configuration => impl_err!(Configuration, $m),
                        Poison => impl_err!(Poison, $m),
                        Timeout => impl_err!(Timeout, $m),
                        CapacityExceeded => impl_err!(CapacityExceeded, $m),
                        IllegalArgument => impl_err!(IllegalArgument, $m),
                        Misc => impl_err!(Misc, $m),
                        IllegalState => impl_err!(IllegalState, $m),
                        Test => impl_err!(Test, $m),
                        Overflow => impl_err!(Overflow, $m),
                        Errno => impl_err!(Errno, $m),
                        NotFound => impl_err!(NotFound, $m),
                        ConnClosed => impl_err!(ConnClosed, $m),
                        AlreadyRunning => impl_err!(AlreadyRunning, $m),
                        NotRunning => impl_err!(NotRunning, $m),
                        Middleware => impl_err!(Middleware, $m),
                        Protocol => impl_err!(Protocol, $m),
                        Parse => impl_err!(Parse, $m),
                        WsFrame => impl_err!(WsFrame, $m),
                        WsClose => impl_err!(WsClose, $m),
		}
	}};
}

/// Map the specified error into the [`crate::ErrKind`] enum name from this crate.
/// Optionally specify an additional message to be included in the error.
///
/// Example:
///
///```
/// use ews_err::{map_err, ErrKind, Error, ErrorKind};
/// use std::fs::File;
///
/// fn main() -> Result<(), Error> {
///     assert!(show_map_err().is_err());
///     Ok(())
/// }
///
/// fn show_map_err() -> Result<(), Error> {
///     let file = map_err!(File::open("/path/to/something"), ErrKind::IO, "file open failed")?;
///     println!("file_type={:?}", file.metadata()?.file_type());
///     Ok(())
/// }
///```
#[macro_export]
macro_rules! map_err {
	($in_err:expr, $kind:expr) => {{
		use ews_err::map_err;
		map_err!($in_err, $kind, "")
	}};
	($in_err:expr, $kind:expr, $m:expr) => {{
		use ews_err::ErrKind::*;
		#[allow(unused_imports)]
		use ews_err::{impl_map_err, ErrKind, Error, ErrorKind};
		$in_err.map_err(|e| -> Error {
			let k = $kind;
			match k {
				IO => impl_map_err!(IO, $m, e),
				Log => impl_map_err!(Log, $m, e),
				Utf8 => impl_map_err!(Utf8, $m, e),
				Configuration => impl_map_err!(Configuration, $m, e),
				Poison => impl_map_err!(Poison, $m, e),
				Timeout => impl_map_err!(Timeout, $m, e),
				CapacityExceeded => impl_map_err!(CapacityExceeded, $m, e),
				IllegalArgument => impl_map_err!(IllegalArgument, $m, e),
				Misc => impl_map_err!(Misc, $m, e),
				IllegalState => impl_map_err!(IllegalState, $m, e),
				Test => impl_map_err!(Test, $m, e),
				Overflow => impl_map_err!(Overflow, $m, e),
				Errno => impl_map_err!(Errno, $m, e),
				NotFound => impl_map_err!(NotFound, $m, e),
				ConnClosed => impl_map_err!(ConnClosed, $m, e),
				AlreadyRunning => impl_map_err!(AlreadyRunning, $m, e),
				NotRunning => impl_map_err!(NotRunning, $m, e),
				Middleware => impl_map_err!(Middleware, $m, e),
				Protocol => impl_map_err!(Protocol, $m, e),
				Parse => impl_map_err!(Parse, $m, e),
				WsFrame => impl_map_err!(WsFrame, $m, e),
				WsClose => impl_map_err!(WsClose, $m, e),
			}
		})
	}};
}

/// Break from a loop if the specified condition is true.
#[macro_export]
macro_rules! cbreak {
	($cond:expr) => {{
		if $cond {
			break;
		}
	}};
}

/// Call TryInto for the specified value and map any errors to an [`crate::Error`].
#[macro_export]
macro_rules! try_into {
	($v:expr) => {{
		use ews_err::{map_err, ErrKind};
		use std::convert::TryInto;
		map_err!($v.try_into(), ErrKind::Misc, "TryInto Error")
	}};
}

// helper to do err
#[doc(hidden)]
#[macro_export]
macro_rules! impl_err {
	($error_kind:ident, $msg:expr) => {{
		let error: Error = ErrorKind::$error_kind($msg.to_string()).into();
		error
	}};
}

// helper to do map_err
#[doc(hidden)]
#[macro_export]
macro_rules! impl_map_err {
	($error_kind:ident, $msg:expr, $e:expr) => {{
		let error: Error = ErrorKind::$error_kind(format!("{}: {}", $msg, $e)).into();
		error
	}};
}
