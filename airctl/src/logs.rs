//! Diagnostic logging
//!
//! Logs go to stderr so the console menu printed on stdout stays readable.
//! `RUST_LOG` replaces the configured directives entirely when set.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Level for airctl itself (`--log-level`)
    pub log_level: LogLevel,

    /// Level for the MQTT client library, which reports every ping at debug
    pub broker_level: LogLevel,

    /// One JSON object per line (`--log-json`)
    pub json_format: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            broker_level: LogLevel::Warn,
            json_format: false,
        }
    }
}

impl LogOptions {
    /// Filter used when `RUST_LOG` is not set
    pub fn filter_directives(&self) -> String {
        format!(
            "{},rumqttc={}",
            self.log_level.as_str(),
            self.broker_level.as_str()
        )
    }
}

pub fn init_logging(options: &LogOptions) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.filter_directives()));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if options.json_format {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.map_err(|e| AppError::ConfigError(format!("logging: {e}")))
}
