pub mod reconciler;
pub mod session;
