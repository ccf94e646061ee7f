//! Menu activations

use tokio::sync::mpsc;
use tracing::debug;

use crate::device::session::DeviceControl;
use crate::models::status::{AcMode, FanSpeed};
use crate::ui::menu::MenuItem;

/// User activation of a menu entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEvent {
    TogglePower,
    SetTemperature(i32),
    SetMode(AcMode),
    SetSpeed(FanSpeed),
}

impl MenuEvent {
    /// Event raised by clicking `item`, if it is clickable
    pub fn for_item(item: &MenuItem) -> Option<Self> {
        match item {
            MenuItem::Power => Some(MenuEvent::TogglePower),
            MenuItem::TemperatureOption(celsius) => Some(MenuEvent::SetTemperature(*celsius)),
            MenuItem::ModeOption(mode) => Some(MenuEvent::SetMode(mode.clone())),
            MenuItem::SpeedOption(speed) => Some(MenuEvent::SetSpeed(speed.clone())),
            _ => None,
        }
    }
}

/// Apply activations for one device until the sender side goes away.
///
/// Runs as a task owned by the device session, so it is aborted together
/// with the session on disconnect.
pub async fn listen(control: DeviceControl, mut events: mpsc::Receiver<MenuEvent>) {
    while let Some(event) = events.recv().await {
        debug!(event = ?event, "menu activated");
        control.apply(event).await;
    }
}
