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

use ews_err::*;
use std::collections::HashMap;

// Maps channel names to dense indexes so each websocket connection can track its
// subscriptions in one mask word. The reverse array makes name enumeration cheap.
pub(crate) struct ChannelRegistry {
	map: HashMap<String, u8>,
	rev: Vec<Option<String>>,
	max: usize,
}

impl ChannelRegistry {
	pub(crate) fn new(max: usize) -> Self {
		Self {
			map: HashMap::new(),
			rev: vec![None; max],
			max,
		}
	}

	/// Index for the named channel, assigning the lowest free index when the name is new.
	pub(crate) fn get_or_create(&mut self, name: &str) -> Result<u8, Error> {
		if let Some(idx) = self.map.get(name) {
			return Ok(*idx);
		}
		for i in 0..self.max {
			if self.rev[i].is_none() {
				self.rev[i] = Some(name.to_string());
				self.map.insert(name.to_string(), i as u8);
				return Ok(i as u8);
			}
		}
		let text = format!("channel limit of {} reached", self.max);
		Err(err!(ErrKind::CapacityExceeded, text))
	}

	pub(crate) fn index_of(&self, name: &str) -> Option<u8> {
		self.map.get(name).copied()
	}

	pub(crate) fn name_of(&self, idx: u8) -> Option<&String> {
		match self.rev.get(idx as usize) {
			Some(name) => name.as_ref(),
			None => None,
		}
	}
}
