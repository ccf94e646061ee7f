//! Main application run loop

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::authn::credentials::Credentials;
use crate::device::session::DeviceSession;
use crate::errors::AppError;
use crate::http::client::HttpClient;
use crate::models::device::DeviceDescriptor;
use crate::mqtt::client::{Connector, MqttConnector};
use crate::ui::console::{self, ConsoleDevice, ConsoleView};
use crate::ui::events::MenuEvent;
use crate::ui::menu::{DeviceMenu, MenuView, SharedView};

/// Pending activations per device before clicks start waiting
const EVENT_BUFFER: usize = 16;

/// Run the tray controller.
///
/// Login and the device directory are fatal on failure. Devices that fail to
/// connect are logged and left out; the rest keep working.
pub async fn run(
    options: AppOptions,
    credentials: Credentials,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AppError> {
    info!("Initializing airctl...");
    options.validate()?;

    let http_client = HttpClient::new(&options.api)?;
    http_client.login(&credentials).await?;
    let descriptors = http_client.fetch_homes().await?;

    let connector: Arc<dyn Connector> = Arc::new(MqttConnector::new(options.broker.clone()));
    let view: SharedView<ConsoleView> = Arc::new(Mutex::new(ConsoleView::new()));
    let mut shutdown_manager = ShutdownManager::new(options.lifecycle.clone());

    let mut console_devices = Vec::new();
    for descriptor in descriptors {
        let name = descriptor.name.clone();
        match start_device(descriptor, connector.clone(), view.clone()).await {
            Ok((session, events)) => {
                console_devices.push(ConsoleDevice { name, events });
                shutdown_manager.with_session(session);
            }
            Err(e) => {
                error!(device = %name, "device unavailable: {}", e);
            }
        }
    }
    info!("{} devices online", console_devices.len());

    let console = console::run(view, console_devices);

    tokio::select! {
        _ = shutdown_signal => {
            info!("Shutdown signal received, shutting down...");
        }
        _ = console => {
            info!("Quit requested, shutting down...");
        }
    }

    shutdown_manager.shutdown().await
}

/// Connect one device and wire its menu both ways.
///
/// Returns the session and the sender the frontend uses for activations.
pub async fn start_device<V: MenuView>(
    descriptor: DeviceDescriptor,
    connector: Arc<dyn Connector>,
    view: SharedView<V>,
) -> Result<(DeviceSession, mpsc::Sender<MenuEvent>), AppError> {
    let mut session = DeviceSession::new(descriptor, connector);
    session.connect().await?;

    let menu = DeviceMenu::build(view, session.name());
    let reflector = tokio::spawn(menu.reflect(session.subscribe()));
    session.own(reflector);

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    session.attach_listener(events_rx)?;

    Ok((session, events_tx))
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    lifecycle_options: LifecycleOptions,
    sessions: Vec<DeviceSession>,
}

impl ShutdownManager {
    fn new(lifecycle_options: LifecycleOptions) -> Self {
        Self {
            lifecycle_options,
            sessions: Vec::new(),
        }
    }

    fn with_session(&mut self, session: DeviceSession) {
        self.sessions.push(session);
    }

    async fn shutdown(&mut self) -> Result<(), AppError> {
        let max_delay = self.lifecycle_options.max_shutdown_delay;
        match tokio::time::timeout(max_delay, self.shutdown_impl()).await {
            Ok(()) => {
                info!("Shutdown complete");
                Ok(())
            }
            Err(_) => Err(AppError::ShutdownError(format!(
                "devices did not disconnect within {:?}",
                max_delay
            ))),
        }
    }

    async fn shutdown_impl(&mut self) {
        info!("Disconnecting {} devices...", self.sessions.len());
        for session in self.sessions.iter_mut() {
            session.disconnect().await;
        }
    }
}
