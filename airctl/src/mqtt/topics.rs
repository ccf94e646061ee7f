//! MQTT topic definitions

/// Topics derived from a device's base topic
pub struct Topics;

impl Topics {
    /// Commands for the device
    pub fn control(base: &str) -> String {
        format!("{}/control", base)
    }

    /// Status pushed by the device
    pub fn status(base: &str) -> String {
        format!("{}/status", base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_generation() {
        assert_eq!(Topics::control("u1/h1/ac-1"), "u1/h1/ac-1/control");
        assert_eq!(Topics::status("u1/h1/ac-1"), "u1/h1/ac-1/status");
    }
}
