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

/// Build an [`crate::HttpServer`] from a list of [`ews_conf::ConfigOption`] values.
///
/// # Examples
///
///```
/// use ews_conf::ConfigOption::*;
/// use ews_err::*;
/// use ews_http::*;
///
/// fn main() -> Result<(), Error> {
///     let server = http_server!(Port(8081), MaxConnections(8))?;
///     let _ = server;
///     Ok(())
/// }
///```
#[macro_export]
macro_rules! http_server {
	( $( $config:expr ),* ) => {{
                use ews_conf::{ConfigOption, ConfigOption::*};
                let mut config_values: Vec<ConfigOption> = vec![];
                $(
                        config_values.push($config);
                )*

                ews_http::Builder::build_http_server(config_values)
        }};
}

/// Build an [`crate::HttpRouter`] from a list of [`ews_conf::ConfigOption`] values.
#[macro_export]
macro_rules! http_router {
	( $( $config:expr ),* ) => {{
                use ews_conf::{ConfigOption, ConfigOption::*};
                let mut config_values: Vec<ConfigOption> = vec![];
                $(
                        config_values.push($config);
                )*

                ews_http::Builder::build_http_router(config_values)
        }};
}
