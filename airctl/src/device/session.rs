//! Per-device broker session

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::device::reconciler::{StatusCell, StatusReconciler};
use crate::errors::AppError;
use crate::models::device::DeviceDescriptor;
use crate::models::status::{AcMode, ControlMessage, FanSpeed, Status};
use crate::mqtt::client::{BrokerLink, Connector};
use crate::mqtt::topics::Topics;
use crate::ui::events::{listen, MenuEvent};

/// Connection state of a device session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Publishes commands for a connected device.
///
/// Cheap to clone; listener tasks each hold one.
#[derive(Clone)]
pub struct DeviceControl {
    device: String,
    control_topic: String,
    link: Arc<dyn BrokerLink>,
    cell: Arc<StatusCell>,
}

impl DeviceControl {
    pub async fn toggle_power(&self) {
        let power = self.cell.next_power().await;
        self.publish(ControlMessage::power(power.clone())).await;
        info!(device = %self.device, power = %power, "power toggled");
    }

    pub async fn set_temperature(&self, celsius: i32) {
        let message = ControlMessage::temperature(celsius);
        let tmp = message.actmp.clone().unwrap_or_default();
        self.publish(message).await;
        info!(device = %self.device, tmp = %tmp, "temp updated");
    }

    pub async fn set_mode(&self, mode: AcMode) {
        self.publish(ControlMessage::mode(mode.clone())).await;
        info!(device = %self.device, mode = %mode, "mode updated");
    }

    pub async fn set_speed(&self, speed: FanSpeed) {
        self.publish(ControlMessage::speed(speed.clone())).await;
        info!(device = %self.device, speed = %speed, "speed updated");
    }

    /// Run the operation a menu activation asks for
    pub async fn apply(&self, event: MenuEvent) {
        match event {
            MenuEvent::TogglePower => self.toggle_power().await,
            MenuEvent::SetTemperature(celsius) => self.set_temperature(celsius).await,
            MenuEvent::SetMode(mode) => self.set_mode(mode).await,
            MenuEvent::SetSpeed(speed) => self.set_speed(speed).await,
        }
    }

    /// Fire and forget: failures are logged, never returned to the UI
    async fn publish(&self, message: ControlMessage) {
        debug!(device = %self.device, msg = ?message, "updating control");
        let payload = match message.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(device = %self.device, "Failed to encode control: {}", e);
                return;
            }
        };
        if let Err(e) = self.link.publish(&self.control_topic, payload).await {
            error!(device = %self.device, "{}", e);
        }
    }
}

/// Broker session for one device.
///
/// Owns at most one connection at a time plus every task working on its
/// behalf (connection driver, reconciler, UI listeners); all of them go away
/// on [`DeviceSession::disconnect`].
pub struct DeviceSession {
    descriptor: DeviceDescriptor,
    connector: Arc<dyn Connector>,
    cell: Arc<StatusCell>,
    state: Arc<watch::Sender<SessionState>>,
    control: Option<DeviceControl>,
    tasks: Vec<JoinHandle<()>>,
}

impl DeviceSession {
    pub fn new(descriptor: DeviceDescriptor, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            descriptor,
            connector,
            cell: Arc::new(StatusCell::new()),
            state: Arc::new(state),
            control: None,
            tasks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Snapshot of the last status the device reported
    pub fn status(&self) -> Status {
        self.cell.current()
    }

    /// Observe status changes
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.cell.subscribe()
    }

    /// Command handle, available while connected
    pub fn control(&self) -> Option<DeviceControl> {
        self.control.clone()
    }

    /// Connect to the broker and subscribe to the device's status.
    ///
    /// A single attempt; on failure the session is back to `Disconnected`.
    pub async fn connect(&mut self) -> Result<(), AppError> {
        if self.state() != SessionState::Disconnected {
            return Ok(());
        }

        let topic = self
            .descriptor
            .primary_topic()
            .ok_or(AppError::NoTopic)?
            .to_string();

        let token = &self.descriptor.token;
        if token.expires_in > 0 && token.is_expired() {
            warn!(
                device = %self.descriptor.name,
                "access token expired at {}, the broker will likely refuse it",
                token.expires_at()
            );
        }

        self.state.send_replace(SessionState::Connecting);

        let connection = match self
            .connector
            .connect(&self.descriptor, &Topics::status(&topic))
            .await
        {
            Ok(connection) => connection,
            Err(e) => {
                self.state.send_replace(SessionState::Disconnected);
                return Err(e);
            }
        };

        if let Some(driver) = connection.driver {
            self.tasks.push(driver);
        }

        let reconciler = StatusReconciler::new(self.descriptor.name.clone(), self.cell.clone());
        let state = self.state.clone();
        let device = self.descriptor.name.clone();
        let inbox = connection.inbox;
        self.tasks.push(tokio::spawn(async move {
            reconciler.run(inbox).await;
            state.send_replace(SessionState::Disconnected);
            warn!(device = %device, "device connection closed");
        }));

        self.control = Some(DeviceControl {
            device: self.descriptor.name.clone(),
            control_topic: Topics::control(&topic),
            link: connection.link,
            cell: self.cell.clone(),
        });
        self.state.send_replace(SessionState::Connected);
        Ok(())
    }

    /// Tear the connection down immediately, along with every owned task
    pub async fn disconnect(&mut self) {
        if let Some(control) = self.control.take() {
            if let Err(e) = control.link.disconnect().await {
                debug!(device = %self.descriptor.name, "disconnect request failed: {}", e);
            }
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if self.state.send_replace(SessionState::Disconnected) != SessionState::Disconnected {
            info!(device = %self.descriptor.name, "device disconnected");
        }
    }

    /// Tie a task's lifetime to this session
    pub fn own(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    /// Start a listener turning menu activations into commands
    pub fn attach_listener(&mut self, events: mpsc::Receiver<MenuEvent>) -> Result<(), AppError> {
        let control = self
            .control()
            .ok_or_else(|| AppError::ConnectError(format!("{} is not connected", self.name())))?;
        self.tasks.push(tokio::spawn(listen(control, events)));
        Ok(())
    }

    pub async fn toggle_power(&self) {
        match &self.control {
            Some(control) => control.toggle_power().await,
            None => self.warn_disconnected("toggle power"),
        }
    }

    pub async fn set_temperature(&self, celsius: i32) {
        match &self.control {
            Some(control) => control.set_temperature(celsius).await,
            None => self.warn_disconnected("set temperature"),
        }
    }

    pub async fn set_mode(&self, mode: AcMode) {
        match &self.control {
            Some(control) => control.set_mode(mode).await,
            None => self.warn_disconnected("set mode"),
        }
    }

    pub async fn set_speed(&self, speed: FanSpeed) {
        match &self.control {
            Some(control) => control.set_speed(speed).await,
            None => self.warn_disconnected("set speed"),
        }
    }

    fn warn_disconnected(&self, action: &str) {
        warn!(device = %self.descriptor.name, "cannot {}: device not connected", action);
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
