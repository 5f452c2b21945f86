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
	use crate::{Log, LogBuilder, LogLevel};
	use ews_conf::ConfigOption;
	use ews_err::*;
	use ews_test::*;
	use std::fs::read_to_string;
	use std::path::PathBuf;

	fn build_file_logger(directory: &str) -> Result<(Box<dyn Log + Send + Sync>, PathBuf), Error> {
		let path = PathBuf::from(format!("{}/test.log", directory));
		let logger = LogBuilder::build_logger(vec![
			ConfigOption::LogFilePath(Some(path.clone())),
			ConfigOption::DisplayStdout(false),
			ConfigOption::DisplayColors(false),
		])?;
		Ok((logger, path))
	}

	#[test]
	fn test_log_to_file() -> Result<(), Error> {
		let test_dir = ".test_log_to_file.ews";
		setup_test_dir(test_dir)?;

		let (mut logger, path) = build_file_logger(test_dir)?;
		logger.init()?;
		logger.log(LogLevel::Info, "line one")?;
		logger.log_plain(LogLevel::Info, "line two")?;
		logger.close()?;

		let contents = read_to_string(path)?;
		assert!(contents.contains("line one"));
		assert!(contents.contains("(INFO)"));
		assert!(contents.contains("\nline two\n"));

		tear_down_test_dir(test_dir)?;
		Ok(())
	}

	#[test]
	fn test_log_level_threshold() -> Result<(), Error> {
		let test_dir = ".test_log_level_threshold.ews";
		setup_test_dir(test_dir)?;

		let (mut logger, path) = build_file_logger(test_dir)?;
		logger.init()?;
		logger.set_log_level(LogLevel::Warn);
		logger.log(LogLevel::Debug, "should not appear")?;
		logger.log(LogLevel::Error, "should appear")?;
		logger.close()?;

		let contents = read_to_string(path)?;
		assert!(!contents.contains("should not appear"));
		assert!(contents.contains("should appear"));

		tear_down_test_dir(test_dir)?;
		Ok(())
	}

	#[test]
	fn test_log_rotate() -> Result<(), Error> {
		let test_dir = ".test_log_rotate.ews";
		setup_test_dir(test_dir)?;

		let path = PathBuf::from(format!("{}/rotate.log", test_dir));
		let mut logger = LogBuilder::build_logger(vec![
			ConfigOption::LogFilePath(Some(path.clone())),
			ConfigOption::DisplayStdout(false),
			ConfigOption::MaxSizeBytes(1),
		])?;
		logger.init()?;
		logger.log(LogLevel::Info, "abcdefghij")?;
		assert!(logger.need_rotate()?);
		logger.rotate()?;
		assert!(!logger.need_rotate()?);
		logger.close()?;

		tear_down_test_dir(test_dir)?;
		Ok(())
	}

	#[test]
	fn test_double_init() -> Result<(), Error> {
		let test_dir = ".test_double_init.ews";
		setup_test_dir(test_dir)?;

		let (mut logger, _path) = build_file_logger(test_dir)?;
		logger.init()?;
		assert!(logger.init().is_err());
		logger.close()?;

		tear_down_test_dir(test_dir)?;
		Ok(())
	}
}
