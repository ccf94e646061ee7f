//! Utility functions

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Version information for the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Login scope expected by the auth endpoint, `an_<n>` with `n < 1e9`
pub fn login_scope() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("an_{}", n)
}

/// Random MQTT client identifier.
///
/// Each broker connection gets a fresh one so that several devices (or several
/// running copies of the tray) never kick each other off the broker.
pub fn broker_client_id() -> String {
    let mut rng = rand::thread_rng();
    let high: u64 = rng.gen_range(0..10_000_000_000_000_000);
    let low: u32 = rng.gen_range(0..1_000_000);
    format!("an{}{}", high, low)
}
