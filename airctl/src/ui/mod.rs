pub mod console;
pub mod events;
pub mod menu;
