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

/// The config macro allows for a configuration to be specified and checked conveniently. This
/// macro is used throughout EWS.
///
/// # Examples
///
///```
/// use ews_conf::*;
/// use ews_err::*;
///
/// fn main() -> Result<(), Error> {
///     // create a simple config
///     let config = config!(Port(8081), MaxConnections(16));
///
///     // check it
///     let res = config.check_config(
///         vec![ConfigOptionName::Port, ConfigOptionName::MaxConnections],
///         vec![ConfigOptionName::Port],
///     );
///
///     // this configuration is ok because both Port and MaxConnections are allowed
///     // and the only required configuration 'Port' is specified
///     assert!(res.is_ok());
///     Ok(())
/// }
///```
#[macro_export]
macro_rules! config {
	( $( $config:expr ),* ) => {{
                use ews_conf::{ConfigBuilder, ConfigOption, ConfigOption::*};
                let mut config_values: Vec<ConfigOption> = vec![];
                $(
                        config_values.push($config);
                )*

                ConfigBuilder::build_config(config_values)
        }};
}
