pub mod client;
pub mod homes;
