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
use crate::types::{HttpErrorHandler, HttpHandler, HttpMethod, Middleware, WsHandler};
use ews_err::*;

// Kinds of route tree nodes. A node has sorted static children plus at most one param
// child and one wildcard child.
#[derive(PartialEq, Copy, Clone, Debug)]
pub(crate) enum NodeKind {
	Static,
	Param,
	Wildcard,
}

pub(crate) struct NodeHandlers {
	// one handler chain per method, invoked in registration order
	pub(crate) chains: [Vec<HttpHandler>; 8],
	pub(crate) ws_handler: Option<WsHandler>,
	pub(crate) ws_ping_interval: Option<u64>,
}

impl NodeHandlers {
	fn new() -> Self {
		Self {
			chains: Default::default(),
			ws_handler: None,
			ws_ping_interval: None,
		}
	}
}

pub(crate) struct RouteNode {
	pub(crate) segment: String,
	pub(crate) kind: NodeKind,
	pub(crate) children: Vec<RouteNode>,
	pub(crate) param_child: Option<Box<RouteNode>>,
	pub(crate) wildcard_child: Option<Box<RouteNode>>,
	pub(crate) handlers: Option<NodeHandlers>,
	pub(crate) middleware: Vec<Middleware>,
	pub(crate) trailing_slash: bool,
	pub(crate) optional_param: bool,
}

impl RouteNode {
	fn new(segment: String, kind: NodeKind) -> Self {
		Self {
			segment,
			kind,
			children: vec![],
			param_child: None,
			wildcard_child: None,
			handlers: None,
			middleware: vec![],
			trailing_slash: false,
			optional_param: false,
		}
	}

}

/// Result of a route lookup.
pub(crate) struct RouteMatch {
	pub(crate) matched: bool,
	pub(crate) handlers: Vec<HttpHandler>,
	pub(crate) ws_handler: Option<WsHandler>,
	pub(crate) ws_ping_interval: Option<u64>,
	pub(crate) params: Vec<(String, String)>,
	pub(crate) middleware: Vec<Middleware>,
	pub(crate) overflow: bool,
}

impl RouteMatch {
	pub(crate) fn none() -> Self {
		Self {
			matched: false,
			handlers: vec![],
			ws_handler: None,
			ws_ping_interval: None,
			params: vec![],
			middleware: vec![],
			overflow: false,
		}
	}
}

/// Radix tree of path segments. Patterns may contain static segments, `:name` parameters,
/// `:name?` optional parameters and a `*` wildcard that captures the rest of the path.
/// Static segments win over parameters, parameters over wildcards; a multi-segment
/// remainder prefers the wildcard over a parameter.
pub struct HttpRouter {
	pub(crate) root: RouteNode,
	pub(crate) case_sensitive: bool,
	pub(crate) strict_slash: bool,
	pub(crate) max_route_middleware: usize,
	pub(crate) max_router_middleware: usize,
	pub(crate) max_route_params: usize,
	pub(crate) router_middleware: Vec<Middleware>,
	pub(crate) error_handler: Option<HttpErrorHandler>,
}

impl Default for HttpRouter {
	fn default() -> Self {
		Self::new()
	}
}

impl HttpRouter {
	pub fn new() -> Self {
		Self {
			root: RouteNode::new("".to_string(), NodeKind::Static),
			case_sensitive: true,
			strict_slash: false,
			max_route_middleware: HTTP_DEFAULT_MAX_ROUTE_MIDDLEWARE,
			max_router_middleware: HTTP_DEFAULT_MAX_MIDDLEWARE_PER_ROUTER,
			max_route_params: HTTP_MAX_ROUTE_PARAMS,
			router_middleware: vec![],
			error_handler: None,
		}
	}

	/// Register a handler for the method and pattern. Registering the same route again
	/// appends to its handler chain.
	pub fn add_route(
		&mut self,
		method: HttpMethod,
		pattern: &str,
		handler: HttpHandler,
	) -> Result<(), Error> {
		let node = self.node_for_pattern(pattern)?;
		let handlers = node.handlers.get_or_insert_with(NodeHandlers::new);
		handlers.chains[method.index()].push(handler);
		Ok(())
	}

	/// Register a websocket handler for the pattern, with an optional ping interval in
	/// milliseconds.
	pub fn add_ws_route(
		&mut self,
		pattern: &str,
		handler: WsHandler,
		ping_interval_millis: Option<u64>,
	) -> Result<(), Error> {
		let node = self.node_for_pattern(pattern)?;
		let handlers = node.handlers.get_or_insert_with(NodeHandlers::new);
		handlers.ws_handler = Some(handler);
		handlers.ws_ping_interval = ping_interval_millis;
		Ok(())
	}

	/// Router-level middleware, run before route middleware for every request dispatched
	/// through this router.
	pub fn add_middleware(&mut self, middleware: Middleware) -> Result<(), Error> {
		if self.router_middleware.len() >= self.max_router_middleware {
			let text = format!(
				"router middleware limit of {} reached",
				self.max_router_middleware
			);
			return Err(err!(ErrKind::CapacityExceeded, text));
		}
		self.router_middleware.push(middleware);
		Ok(())
	}

	/// Attach middleware to one route. It runs only for requests matching that route.
	pub fn add_route_middleware(
		&mut self,
		pattern: &str,
		middleware: Middleware,
	) -> Result<(), Error> {
		let max = self.max_route_middleware;
		let node = self.node_for_pattern(pattern)?;
		if node.middleware.len() >= max {
			let text = format!("route middleware limit of {} reached", max);
			return Err(err!(ErrKind::CapacityExceeded, text));
		}
		node.middleware.push(middleware);
		Ok(())
	}

	pub fn set_error_handler(&mut self, handler: HttpErrorHandler) {
		self.error_handler = Some(handler);
	}

	// Walk the tree for the pattern, creating nodes as needed, and return the terminal
	// node. Static children stay sorted; existing nodes are reused.
	fn node_for_pattern(&mut self, pattern: &str) -> Result<&mut RouteNode, Error> {
		if !pattern.starts_with('/') {
			let text = format!("route pattern must begin with '/': {}", pattern);
			return Err(err!(ErrKind::IllegalArgument, text));
		}
		let trailing_slash = pattern.len() > 1 && pattern.ends_with('/');
		let case_sensitive = self.case_sensitive;
		let mut node = &mut self.root;

		for segment in pattern.split('/').filter(|s| !s.is_empty()) {
			if segment == "*" {
				node = &mut **node.wildcard_child.get_or_insert_with(|| {
					Box::new(RouteNode::new("*".to_string(), NodeKind::Wildcard))
				});
			} else if let Some(name) = segment.strip_prefix(':') {
				let optional = name.ends_with('?');
				let name = name.trim_end_matches('?');
				let child = node.param_child.get_or_insert_with(|| {
					Box::new(RouteNode::new(name.to_string(), NodeKind::Param))
				});
				if optional {
					child.optional_param = true;
				}
				node = &mut **child;
			} else {
				let segment = if case_sensitive {
					segment.to_string()
				} else {
					segment.to_lowercase()
				};
				let pos = node
					.children
					.binary_search_by(|child| child.segment.as_str().cmp(segment.as_str()));
				let pos = match pos {
					Ok(pos) => pos,
					Err(pos) => {
						node.children
							.insert(pos, RouteNode::new(segment.clone(), NodeKind::Static));
						pos
					}
				};
				node = &mut node.children[pos];
			}
		}

		node.trailing_slash = trailing_slash;
		Ok(node)
	}

	/// Look the path up in the tree. Captured parameters and the middleware collected on
	/// the way down are returned with the match.
	pub(crate) fn lookup(
		&self,
		path: &str,
		method: HttpMethod,
		max_total_middleware: usize,
	) -> RouteMatch {
		let mut m = RouteMatch::none();
		let trailing_slash = path.len() > 1 && path.ends_with('/');
		let lowered;
		let path = if self.case_sensitive {
			path
		} else {
			lowered = path.to_lowercase();
			&lowered
		};
		let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

		let terminal = self.match_node(&self.root, &segments, 0, &mut m, max_total_middleware);

		let terminal = match terminal {
			Some(terminal) => terminal,
			None => return m,
		};

		// strict mode: the path's trailing slash must agree with the route's
		if self.strict_slash && terminal.trailing_slash != trailing_slash {
			return m;
		}

		if let Some(handlers) = &terminal.handlers {
			let chain = if !handlers.chains[method.index()].is_empty() {
				&handlers.chains[method.index()]
			} else {
				&handlers.chains[HttpMethod::Any.index()]
			};
			m.handlers = chain.clone();
			m.ws_handler = handlers.ws_handler;
			m.ws_ping_interval = handlers.ws_ping_interval;
		}
		m.matched = true;
		m
	}

	fn collect_middleware(node: &RouteNode, m: &mut RouteMatch, max_total: usize) {
		for middleware in &node.middleware {
			if m.middleware.len() >= max_total {
				m.overflow = true;
				return;
			}
			m.middleware.push(*middleware);
		}
	}

	fn capture_param(&self, name: &str, value: String, m: &mut RouteMatch) {
		if m.params.len() >= self.max_route_params {
			m.overflow = true;
			return;
		}
		m.params.push((name.to_string(), value));
	}

	// Descend the tree trying, in order: static child, wildcard (multi-segment remainder),
	// param child, wildcard (final segment). Middleware is collected on every node
	// actually traversed; failed branches unwind their contribution.
	fn match_node<'a>(
		&'a self,
		node: &'a RouteNode,
		segments: &[&str],
		seg_idx: usize,
		m: &mut RouteMatch,
		max_total: usize,
	) -> Option<&'a RouteNode> {
		let mw_mark = m.middleware.len();
		let param_mark = m.params.len();
		Self::collect_middleware(node, m, max_total);

		if seg_idx >= segments.len() {
			if node.handlers.is_some() {
				return Some(node);
			}
			// an optional param may be absent entirely
			if let Some(param_child) = &node.param_child {
				if param_child.optional_param && param_child.handlers.is_some() {
					Self::collect_middleware(param_child, m, max_total);
					return Some(&**param_child);
				}
			}
			m.middleware.truncate(mw_mark);
			m.params.truncate(param_mark);
			return None;
		}

		let segment = segments[seg_idx];
		let remainder = segments.len() - seg_idx;

		// static exact match first
		if let Ok(pos) = node
			.children
			.binary_search_by(|child| child.segment.as_str().cmp(segment))
		{
			if let Some(terminal) =
				self.match_node(&node.children[pos], segments, seg_idx + 1, m, max_total)
			{
				return Some(terminal);
			}
		}

		// a multi-segment remainder prefers the wildcard over a param; the top-level
		// empty path never reaches here, so "/" cannot match a root wildcard
		if remainder > 1 {
			if let Some(wildcard_child) = &node.wildcard_child {
				if wildcard_child.handlers.is_some() {
					Self::collect_middleware(wildcard_child, m, max_total);
					self.capture_param("*", segments[seg_idx..].join("/"), m);
					return Some(&**wildcard_child);
				}
			}
		}

		if let Some(param_child) = &node.param_child {
			self.capture_param(&param_child.segment, segment.to_string(), m);
			if let Some(terminal) =
				self.match_node(param_child, segments, seg_idx + 1, m, max_total)
			{
				return Some(terminal);
			}
			m.params.truncate(param_mark);
		}

		if remainder == 1 {
			if let Some(wildcard_child) = &node.wildcard_child {
				if wildcard_child.handlers.is_some() {
					Self::collect_middleware(wildcard_child, m, max_total);
					self.capture_param("*", segment.to_string(), m);
					return Some(&**wildcard_child);
				}
			}
		}

		m.middleware.truncate(mw_mark);
		m.params.truncate(param_mark);
		None
	}
}
