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
	use crate as ews_test;
	use crate::{pick_free_port, test_info};
	use ews_err::*;
	use std::net::TcpListener;
	use std::path::Path;

	#[test]
	fn test_pick_free_port() -> Result<(), Error> {
		let port1 = pick_free_port()?;
		let port2 = pick_free_port()?;
		assert_ne!(port1, port2);
		// the returned port is actually bindable
		let _listener = TcpListener::bind(format!("127.0.0.1:{}", port1))?;
		Ok(())
	}

	#[test]
	fn test_test_info_directory() -> Result<(), Error> {
		let directory;
		{
			let test_info = test_info!("test_test_info_directory")?;
			directory = test_info.directory().clone();
			assert!(Path::new(&directory).exists());
			assert_ne!(test_info.port(), 0);
		}
		// removed on drop
		assert!(!Path::new(&directory).exists());
		Ok(())
	}
}
