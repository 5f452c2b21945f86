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

use crate::types::{EventLoopImpl, EvhBuilder, EvhContext};
use crate::EventLoop;
use ews_conf::ConfigOption;
use ews_err::Error;

impl EvhBuilder {
	/// Build an [`crate::EventLoop`] implementation from the specified
	/// [`ews_conf::ConfigOption`] list. The callback types are inferred from the
	/// subsequent `set_on_*` calls.
	pub fn build_event_loop<OnAccept, OnRead, OnWriteReady, OnClose, OnHousekeeper>(
		configs: Vec<ConfigOption>,
	) -> Result<impl EventLoop<OnAccept, OnRead, OnWriteReady, OnClose, OnHousekeeper>, Error>
	where
		OnAccept:
			FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
		OnRead: FnMut(&mut EvhContext<'_>, usize, &[u8]) -> Result<(), Error>
			+ Send
			+ 'static
			+ Unpin,
		OnWriteReady:
			FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
		OnClose: FnMut(&mut EvhContext<'_>, usize) -> Result<(), Error> + Send + 'static + Unpin,
		OnHousekeeper: FnMut(&mut EvhContext<'_>) -> Result<(), Error> + Send + 'static + Unpin,
	{
		EventLoopImpl::new(configs)
	}
}
