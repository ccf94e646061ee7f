pub mod device;
pub mod status;
