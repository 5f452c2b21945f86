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

use crate::TestInfo;
use ews_deps::portpicker::is_free;
use ews_deps::rand::random;
use ews_err::*;
use std::fs::{create_dir_all, remove_dir_all};
use std::sync::atomic::{AtomicU16, Ordering};

// global counter for getting a port number
static GLOBAL_NEXT_PORT: AtomicU16 = AtomicU16::new(9000);

/// Pick a free port that does not collide with recently assigned ports. This is used in tests
/// throughout the EWS crates.
pub fn pick_free_port() -> Result<u16, Error> {
	loop {
		let port = GLOBAL_NEXT_PORT.fetch_add(1, Ordering::SeqCst);
		let port = if port == 9000 {
			let rand: u16 = random();
			let rand = rand % 10_000;
			GLOBAL_NEXT_PORT.fetch_add(rand, Ordering::SeqCst);
			rand + 9000
		} else {
			port
		};

		if is_free(port) {
			return Ok(port);
		}
	}
}

/// Create an empty test directory, removing any leftover from a previous failed run.
pub fn setup_test_dir(directory: &str) -> Result<(), Error> {
	let _ = remove_dir_all(directory);
	create_dir_all(directory)?;
	Ok(())
}

/// Remove the specified test directory.
pub fn tear_down_test_dir(directory: &str) -> Result<(), Error> {
	remove_dir_all(directory)?;
	Ok(())
}

impl TestInfo {
	/// Build a [`crate::TestInfo`] for the named test. Called through the
	/// [`crate::test_info`] macro.
	pub fn new(name: &str, preserve: bool) -> Result<Self, Error> {
		let directory = format!(".{}.ews", name.replace("::", "_"));
		setup_test_dir(&directory)?;
		let port = pick_free_port()?;
		Ok(Self {
			port,
			directory,
			preserve,
		})
	}
}

impl Drop for TestInfo {
	fn drop(&mut self) {
		// if we're not preserving the directory, delete it on drop.
		if !self.preserve {
			let _ = remove_dir_all(self.directory.clone());
		}
	}
}
