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

/// Data available to a test: a free tcp/ip port and a scratch directory that is removed when
/// this struct goes out of scope (unless `preserve` was set). Built with the
/// [`crate::test_info`] macro.
pub struct TestInfo {
	pub(crate) port: u16,
	pub(crate) directory: String,
	pub(crate) preserve: bool,
}

impl TestInfo {
	/// Return a port that can be used by the test. The port is guaranteed not to be
	/// assigned to other tests using this crate.
	pub fn port(&self) -> u16 {
		self.port
	}

	/// Return the path of a newly created, empty directory that can be used by the test.
	pub fn directory(&self) -> &String {
		&self.directory
	}
}
