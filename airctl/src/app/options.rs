//! Application configuration options

use std::time::Duration;

use url::Url;

use crate::errors::AppError;
use crate::logs::LogOptions;
use crate::mqtt::client::MqttAddress;

/// Main application options
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Cloud API configuration
    pub api: ApiOptions,

    /// Broker the devices are reached through
    pub broker: MqttAddress,

    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Logging configuration
    pub log: LogOptions,
}

impl AppOptions {
    /// Reject option sets that could never work before touching the network
    pub fn validate(&self) -> Result<(), AppError> {
        for (name, base) in [
            ("auth_base_url", &self.api.auth_base_url),
            ("app_base_url", &self.api.app_base_url),
        ] {
            Url::parse(base)
                .map_err(|e| AppError::ConfigError(format!("{name} '{base}': {e}")))?;
        }
        if self.api.client_id.is_empty() {
            return Err(AppError::ConfigError("client_id is empty".to_string()));
        }
        if self.broker.host.is_empty() {
            return Err(AppError::ConfigError("MQTT host is not configured".to_string()));
        }
        Ok(())
    }
}

/// Cloud API options
#[derive(Debug, Clone)]
pub struct ApiOptions {
    /// Base URL of the login service
    pub auth_base_url: String,

    /// Base URL of the home management service
    pub app_base_url: String,

    /// Application client id sent with the login request
    pub client_id: String,

    /// Bound on every cloud HTTP call
    pub request_timeout: Duration,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            auth_base_url: "https://auth.miraie.in/simplifi/v1".to_string(),
            app_base_url: "https://app.miraie.in/simplifi/v1".to_string(),
            client_id: "PBcMcfG19njNCL8AOgvRzIC8AjQa".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for disconnecting every device on shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(10),
        }
    }
}
