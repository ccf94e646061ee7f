pub mod client;
pub mod topics;
