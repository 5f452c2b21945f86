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

//! # The EWS Test crate
//! Utilities used by tests throughout the EWS workspace: free port selection that does not
//! collide between tests, and per-test scratch directories that are removed when the test
//! completes.

mod impls;
mod macros;
#[cfg(test)]
mod test;
mod types;

pub use crate::impls::{pick_free_port, setup_test_dir, tear_down_test_dir};
pub use crate::types::TestInfo;
