pub mod credentials;
pub mod token;
