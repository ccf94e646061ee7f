//! Command line arguments

use std::collections::HashMap;

use crate::app::options::AppOptions;
use crate::authn::credentials::Credentials;
use crate::errors::AppError;

/// Flags that take a value, so `--flag value` works as well as `--flag=value`
const VALUE_FLAGS: &[&str] = &[
    "username",
    "password",
    "log-level",
    "broker-host",
    "broker-port",
    "ca-cert",
];

/// Parsed `--key=value` arguments
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    values: HashMap<String, String>,
}

impl CliArgs {
    pub fn parse<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut values = HashMap::new();
        let mut args = args.into_iter().peekable();

        while let Some(arg) = args.next() {
            if let Some((key, value)) = arg.split_once('=') {
                // Handle --key=value format
                let clean_key = key.trim_start_matches('-');
                values.insert(clean_key.to_string(), value.to_string());
            } else if arg.starts_with('-') {
                let clean_key = arg.trim_start_matches('-').to_string();
                let takes_value = VALUE_FLAGS.contains(&clean_key.as_str());
                match args.peek() {
                    Some(next) if takes_value && !next.starts_with('-') => {
                        let value = next.clone();
                        args.next();
                        values.insert(clean_key, value);
                    }
                    // Handle standalone flags like --version
                    _ => {
                        values.insert(clean_key, "true".to_string());
                    }
                }
            }
        }

        Self { values }
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.value(key), Some("true") | Some("1") | Some("yes"))
    }

    /// Credentials as given; emptiness is left to the login to report
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.value("username").unwrap_or_default(),
            self.value("password").unwrap_or_default(),
        )
    }

    /// Apply overrides onto `options`
    pub fn apply(&self, options: &mut AppOptions) -> Result<(), AppError> {
        if let Some(level) = self.value("log-level") {
            options.log.log_level = level.parse().map_err(AppError::ConfigError)?;
        }
        if self.flag("log-json") {
            options.log.json_format = true;
        }
        if let Some(host) = self.value("broker-host") {
            options.broker.host = host.to_string();
        }
        if let Some(port) = self.value("broker-port") {
            options.broker.port = port
                .parse()
                .map_err(|e| AppError::ConfigError(format!("broker-port '{port}': {e}")))?;
        }
        if let Some(path) = self.value("ca-cert") {
            options.broker.ca_cert_path = Some(path.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::LogLevel;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::parse(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn test_parse_both_forms() {
        let args = parse(&["--username=me@example.com", "-password", "pw", "--version"]);
        assert_eq!(args.value("username"), Some("me@example.com"));
        assert_eq!(args.value("password"), Some("pw"));
        assert!(args.flag("version"));
        assert!(!args.flag("log-json"));
    }

    #[test]
    fn test_value_flag_without_value() {
        let args = parse(&["--username", "--version"]);
        assert_eq!(args.value("username"), Some("true"));
        assert!(args.flag("version"));
    }

    #[test]
    fn test_missing_credentials_are_empty() {
        let creds = parse(&[]).credentials();
        assert_eq!(creds.username(), "");
        assert!(creds.ensure_present().is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut options = AppOptions::default();
        parse(&[
            "--log-level=warn",
            "--log-json",
            "--broker-host=localhost",
            "--broker-port=1883",
            "--ca-cert=/tmp/ca.pem",
        ])
        .apply(&mut options)
        .unwrap();

        assert_eq!(options.log.log_level, LogLevel::Warn);
        assert!(options.log.json_format);
        assert_eq!(options.broker.host, "localhost");
        assert_eq!(options.broker.port, 1883);
        assert_eq!(options.broker.ca_cert_path.as_deref(), Some("/tmp/ca.pem"));
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut options = AppOptions::default();
        assert!(parse(&["--broker-port=high"]).apply(&mut options).is_err());
        assert!(parse(&["--log-level=loud"]).apply(&mut options).is_err());
    }
}
