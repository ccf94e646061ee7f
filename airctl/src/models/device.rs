//! Controllable device descriptors

use crate::authn::token::AccessToken;

/// Static record identifying a device and how to reach it on the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub device_id: String,
    pub name: String,

    /// Candidate base topics; the first one is used
    pub topics: Vec<String>,

    /// Home the device belongs to, used as the broker username
    pub home_id: String,

    /// Copy of the login token taken when the directory was fetched
    pub token: AccessToken,
}

impl DeviceDescriptor {
    /// Base topic used for control and status
    pub fn primary_topic(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn descriptor(topics: &[&str]) -> DeviceDescriptor {
        DeviceDescriptor {
            device_id: "d-1".to_string(),
            name: "Bedroom".to_string(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
            home_id: "h-1".to_string(),
            token: AccessToken {
                access_token: "abc".to_string(),
                refresh_token: String::new(),
                expires_in: 60,
                user_id: String::new(),
                issued_at: Utc::now(),
            },
        }
    }

    #[test]
    fn test_primary_topic() {
        assert_eq!(descriptor(&["a/b", "c/d"]).primary_topic(), Some("a/b"));
        assert_eq!(descriptor(&[]).primary_topic(), None);
    }
}
