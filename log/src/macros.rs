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

#[macro_export]
macro_rules! trace {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Trace;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Trace, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::Standard)
        }};
        ($line:expr,$($values:tt)*) => {
                trace!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! trace_plain {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Trace;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Trace, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::Plain)
        }};
        ($line:expr,$($values:tt)*) => {
                trace_plain!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! trace_all {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Trace;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Trace, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::All)
        }};
        ($line:expr,$($values:tt)*) => {
                trace_all!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! debug {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Debug;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Debug, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::Standard)
        }};
        ($line:expr,$($values:tt)*) => {
                debug!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! debug_plain {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Debug;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Debug, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::Plain)
        }};
        ($line:expr,$($values:tt)*) => {
                debug_plain!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! debug_all {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Debug;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Debug, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::All)
        }};
        ($line:expr,$($values:tt)*) => {
                debug_all!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! info {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Info;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Info, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::Standard)
        }};
        ($line:expr,$($values:tt)*) => {
                info!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! info_plain {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Info;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Info, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::Plain)
        }};
        ($line:expr,$($values:tt)*) => {
                info_plain!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! info_all {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Info;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Info, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::All)
        }};
        ($line:expr,$($values:tt)*) => {
                info_all!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! warn {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Warn;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Warn, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::Standard)
        }};
        ($line:expr,$($values:tt)*) => {
                warn!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! warn_plain {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Warn;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Warn, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::Plain)
        }};
        ($line:expr,$($values:tt)*) => {
                warn_plain!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! warn_all {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Warn;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Warn, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::All)
        }};
        ($line:expr,$($values:tt)*) => {
                warn_all!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! error {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Error;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Error, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::Standard)
        }};
        ($line:expr,$($values:tt)*) => {
                error!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! error_plain {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Error;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Error, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::Plain)
        }};
        ($line:expr,$($values:tt)*) => {
                error_plain!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! error_all {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Error;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Error, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::All)
        }};
        ($line:expr,$($values:tt)*) => {
                error_all!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! fatal {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Fatal;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Fatal, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::Standard)
        }};
        ($line:expr,$($values:tt)*) => {
                fatal!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! fatal_plain {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Fatal;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Fatal, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::Plain)
        }};
        ($line:expr,$($values:tt)*) => {
                fatal_plain!(&format!($line, $($values)*)[..])
        };
}

#[macro_export]
macro_rules! fatal_all {
        () => {
                #[doc(hidden)]
                const EWS_GLOBAL_LOG_LEVEL: ews_log::LogLevel = ews_log::LogLevel::Fatal;
        };
        ($line:expr) => {{
                use ews_log::*;
                GlobalLogFunctions::log(LogLevel::Fatal, $line, EWS_GLOBAL_LOG_LEVEL, LoggingType::All)
        }};
        ($line:expr,$($values:tt)*) => {
                fatal_all!(&format!($line, $($values)*)[..])
        };
}

/// Initialize the global logger with the specified [`ews_conf::ConfigOption`] values.
/// Returns an error if the global logger has already been initialized.
#[macro_export]
macro_rules! log_init {
	( $( $config:expr ),* ) => {{
                use ews_conf::{ConfigOption, ConfigOption::*};
                let mut config_values: Vec<ConfigOption> = vec![];
                $(
                        config_values.push($config);
                )*

                ews_log::GlobalLogFunctions::init(config_values)
        }};
}

/// Set the global log level threshold.
#[macro_export]
macro_rules! set_log_level {
	($level:expr) => {{
		ews_log::GlobalLogFunctions::set_log_level($level)
	}};
}
