//! Account credentials

use secrecy::{ExposeSecret, SecretString};

use crate::errors::AppError;

/// Username and password for the cloud account. Held in memory only.
#[derive(Debug, Clone)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Both fields must be non-empty before anything goes over the wire
    pub fn ensure_present(&self) -> Result<(), AppError> {
        if self.username.is_empty() || self.password().is_empty() {
            return Err(AppError::MissingCredentials);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fields_are_rejected() {
        assert!(matches!(
            Credentials::new("", "pw").ensure_present(),
            Err(AppError::MissingCredentials)
        ));
        assert!(matches!(
            Credentials::new("user", "").ensure_present(),
            Err(AppError::MissingCredentials)
        ));
        assert!(Credentials::new("user", "pw").ensure_present().is_ok());
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials::new("user@example.com", "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
