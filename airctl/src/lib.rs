//! airctl library
//!
//! Cloud session, device sessions and menu reflection for the air-conditioner
//! tray controller.

pub mod app;
pub mod authn;
pub mod device;
pub mod errors;
pub mod http;
pub mod logs;
pub mod models;
pub mod mqtt;
pub mod ui;
pub mod utils;
