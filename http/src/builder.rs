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
use crate::types::{Builder, HttpServer, HttpServerImpl};
use crate::HttpRouter;
use ews_conf::ConfigOptionName as CN;
use ews_conf::{Config, ConfigBuilder, ConfigOption};
use ews_err::Error;

impl Builder {
	/// Build an [`crate::HttpServer`] implementation from the specified
	/// [`ews_conf::ConfigOption`] list.
	pub fn build_http_server(
		configs: Vec<ConfigOption>,
	) -> Result<Box<dyn HttpServer + Send + Sync>, Error> {
		Ok(Box::new(HttpServerImpl::new(configs)?))
	}

	/// Build an [`crate::HttpRouter`] from the specified [`ews_conf::ConfigOption`]
	/// list. Recognized options: `CaseSensitive`, `StrictSlash`,
	/// `MaxMiddlewarePerRouter`, `MaxRouteMiddleware` and `MaxRouteParams`.
	pub fn build_http_router(configs: Vec<ConfigOption>) -> Result<HttpRouter, Error> {
		let config = ConfigBuilder::build_config(configs);
		config.check_config(
			vec![
				CN::CaseSensitive,
				CN::StrictSlash,
				CN::MaxMiddlewarePerRouter,
				CN::MaxRouteMiddleware,
				CN::MaxRouteParams,
			],
			vec![],
		)?;

		let mut router = HttpRouter::new();
		router.case_sensitive = config.get_or_bool(&CN::CaseSensitive, true);
		router.strict_slash = config.get_or_bool(&CN::StrictSlash, false);
		router.max_router_middleware = config.get_or_usize(
			&CN::MaxMiddlewarePerRouter,
			HTTP_DEFAULT_MAX_MIDDLEWARE_PER_ROUTER,
		);
		router.max_route_middleware = config
			.get_or_usize(&CN::MaxRouteMiddleware, HTTP_DEFAULT_MAX_ROUTE_MIDDLEWARE);
		router.max_route_params = config
			.get_or_usize(&CN::MaxRouteParams, HTTP_MAX_ROUTE_PARAMS);
		Ok(router)
	}
}
