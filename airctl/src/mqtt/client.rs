//! MQTT client implementation

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeReasonCode, TlsConfiguration, Transport,
};
use rustls::ClientConfig;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::models::device::DeviceDescriptor;
use crate::utils::broker_client_id;

/// Inbound status payloads buffered between the event loop and the reconciler
const INBOX_CAPACITY: usize = 32;

/// MQTT broker address
#[derive(Debug, Clone)]
pub struct MqttAddress {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    /// Optional path to a PEM-encoded CA certificate for broker verification.
    /// When `None` and `use_tls` is `true`, the system certificate store is used.
    pub ca_cert_path: Option<String>,
    pub keep_alive: Duration,
}

impl Default for MqttAddress {
    fn default() -> Self {
        Self {
            host: "mqtt.miraie.in".to_string(),
            port: 8883,
            use_tls: true,
            ca_cert_path: None,
            keep_alive: Duration::from_secs(30),
        }
    }
}

/// Live broker connection of one device, as seen by its session
#[async_trait]
pub trait BrokerLink: Send + Sync {
    /// Publish at QoS 0. Returns once the request is handed to the connection.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), AppError>;

    /// Ask the connection to go away without draining anything
    async fn disconnect(&self) -> Result<(), AppError>;
}

/// A connected and subscribed device connection
pub struct BrokerConnection {
    pub link: Arc<dyn BrokerLink>,

    /// Status payloads in broker delivery order; closes when the connection ends
    pub inbox: mpsc::Receiver<Vec<u8>>,

    /// Task driving the connection, if the link needs one
    pub driver: Option<JoinHandle<()>>,
}

/// Opens broker connections for devices
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect with the device's credentials and subscribe to `status_topic`
    async fn connect(
        &self,
        descriptor: &DeviceDescriptor,
        status_topic: &str,
    ) -> Result<BrokerConnection, AppError>;
}

/// Connector backed by rumqttc
pub struct MqttConnector {
    address: MqttAddress,
}

impl MqttConnector {
    pub fn new(address: MqttAddress) -> Self {
        Self { address }
    }

    fn options(&self, descriptor: &DeviceDescriptor) -> Result<MqttOptions, AppError> {
        if self.address.host.is_empty() {
            return Err(AppError::ConnectError("MQTT host is not configured".to_string()));
        }

        let mut options = MqttOptions::new(broker_client_id(), &self.address.host, self.address.port);
        options.set_keep_alive(self.address.keep_alive);
        options.set_credentials(descriptor.home_id.clone(), descriptor.token.access_token.clone());
        options.set_clean_session(true);

        if self.address.use_tls {
            options.set_transport(tls_transport(&self.address)?);
        }

        Ok(options)
    }
}

fn tls_transport(address: &MqttAddress) -> Result<Transport, AppError> {
    let mut root_cert_store = rustls::RootCertStore::empty();

    if let Some(ref ca_path) = address.ca_cert_path {
        let ca_pem = std::fs::read(ca_path)
            .map_err(|e| AppError::ConnectError(format!("Failed to read CA cert {ca_path}: {e}")))?;
        let mut cursor = std::io::Cursor::new(ca_pem);
        for cert in rustls_pemfile::certs(&mut cursor).flatten() {
            let _ = root_cert_store.add(cert);
        }
    } else {
        for cert in rustls_native_certs::load_native_certs().unwrap_or_default() {
            let _ = root_cert_store.add(cert);
        }
    }

    let client_config = ClientConfig::builder()
        .with_root_certificates(root_cert_store)
        .with_no_client_auth();

    Ok(Transport::tls_with_config(TlsConfiguration::Rustls(Arc::new(
        client_config,
    ))))
}

#[async_trait]
impl Connector for MqttConnector {
    async fn connect(
        &self,
        descriptor: &DeviceDescriptor,
        status_topic: &str,
    ) -> Result<BrokerConnection, AppError> {
        let options = self.options(descriptor)?;
        info!(
            device = %descriptor.name,
            "Connecting to MQTT broker: {}:{}", self.address.host, self.address.port
        );

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        await_connack(&mut eventloop).await?;
        info!(device = %descriptor.name, "connected to device");

        client
            .subscribe(status_topic, QoS::AtMostOnce)
            .await
            .map_err(|e| AppError::SubscribeError(e.to_string()))?;
        await_suback(&mut eventloop).await?;
        info!(device = %descriptor.name, "Subscribed to: {}", status_topic);

        let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);
        let driver = tokio::spawn(drive(
            eventloop,
            descriptor.name.clone(),
            status_topic.to_string(),
            tx,
        ));

        Ok(BrokerConnection {
            link: Arc::new(MqttLink { client }),
            inbox,
            driver: Some(driver),
        })
    }
}

async fn await_connack(eventloop: &mut EventLoop) -> Result<(), AppError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    return Ok(());
                }
                return Err(AppError::ConnectError(format!("{:?}", ack.code)));
            }
            Ok(_) => {}
            Err(e) => return Err(AppError::ConnectError(e.to_string())),
        }
    }
}

async fn await_suback(eventloop: &mut EventLoop) -> Result<(), AppError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::SubAck(ack))) => return check_suback(&ack.return_codes),
            Ok(_) => {}
            Err(e) => return Err(AppError::SubscribeError(e.to_string())),
        }
    }
}

/// Any refused filter fails the whole subscription
fn check_suback(return_codes: &[SubscribeReasonCode]) -> Result<(), AppError> {
    if return_codes
        .iter()
        .any(|code| matches!(code, SubscribeReasonCode::Failure))
    {
        return Err(AppError::SubscribeError("subscription refused".to_string()));
    }
    Ok(())
}

/// Poll the connection and forward status payloads until it ends.
///
/// There is no reconnect: a connection error ends the task and closes the
/// inbox, which the session observes as a disconnect.
async fn drive(
    mut eventloop: EventLoop,
    device: String,
    status_topic: String,
    inbox: mpsc::Sender<Vec<u8>>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if publish.topic != status_topic {
                    debug!(device = %device, "Ignoring message on topic: {}", publish.topic);
                    continue;
                }
                if inbox.send(publish.payload.to_vec()).await.is_err() {
                    return;
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!(device = %device, "MQTT disconnect sent");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(device = %device, "MQTT connection lost: {}", e);
                return;
            }
        }
    }
}

/// rumqttc handle used by a connected session
struct MqttLink {
    client: AsyncClient,
}

#[async_trait]
impl BrokerLink for MqttLink {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), AppError> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| AppError::PublishError(e.to_string()))?;
        debug!("Published control to: {}", topic);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AppError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| AppError::ConnectError(e.to_string()))
    }
}
