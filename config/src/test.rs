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
	use crate as ews_conf;
	use crate::ConfigOptionName as CN;
	use crate::{config, Config, ConfigBuilder, ConfigOption};
	use ews_err::*;

	#[test]
	fn test_config_get() -> Result<(), Error> {
		let config = config!(Port(8081), MaxConnections(16), Nodelay(false));

		assert_eq!(config.get(&CN::Port), Some(ConfigOption::Port(8081)));
		assert_eq!(config.get(&CN::Backlog), None);
		assert_eq!(config.get_or_u16(&CN::Port, 80), 8081);
		assert_eq!(config.get_or_usize(&CN::MaxConnections, 32), 16);
		assert_eq!(config.get_or_usize(&CN::Backlog, 5), 5);
		assert_eq!(config.get_or_bool(&CN::Nodelay, true), false);
		assert_eq!(config.get_or_bool(&CN::ReuseAddr, true), true);
		Ok(())
	}

	#[test]
	fn test_check_config() -> Result<(), Error> {
		let config = config!(Port(8081), Backlog(10));

		assert!(config
			.check_config(vec![CN::Port, CN::Backlog], vec![CN::Port])
			.is_ok());

		// Backlog not allowed
		assert!(config.check_config(vec![CN::Port], vec![]).is_err());

		// Addr required but missing
		assert!(config
			.check_config(vec![CN::Port, CN::Backlog, CN::Addr], vec![CN::Addr])
			.is_err());
		Ok(())
	}

	#[test]
	fn test_check_config_duplicates() -> Result<(), Error> {
		let config = ConfigBuilder::build_config(vec![
			ConfigOption::Port(8081),
			ConfigOption::Port(8082),
		]);
		assert!(config.check_config(vec![CN::Port], vec![]).is_err());
		Ok(())
	}

	#[test]
	fn test_wrong_type_returns_default() -> Result<(), Error> {
		let config = config!(Port(1234));
		// Port is a u16 option so the usize getter falls back to the default
		assert_eq!(config.get_or_usize(&CN::Port, 77), 77);
		assert_eq!(config.get_or_string(&CN::Addr, "0.0.0.0".to_string()), "0.0.0.0");
		Ok(())
	}
}
