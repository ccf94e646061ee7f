//! Device session, status reconciliation and menu reflection working together

use std::sync::{Arc, Mutex};
use std::time::Duration;

use airctl::app::run::start_device;
use airctl::authn::token::AccessToken;
use airctl::device::session::SessionState;
use airctl::errors::AppError;
use airctl::models::device::DeviceDescriptor;
use airctl::models::status::{AcMode, FanSpeed, PowerState};
use airctl::mqtt::client::{BrokerConnection, BrokerLink, Connector};
use airctl::ui::console::ConsoleView;
use airctl::ui::events::MenuEvent;
use airctl::ui::menu::SharedView;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_test::assert_ok;

const ON_22: &[u8] = br#"{"ps":"on","actmp":"22.0","acmd":"auto","acfs":"high"}"#;

#[derive(Default)]
struct RecordingLink {
    published: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl BrokerLink for RecordingLink {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), AppError> {
        let value = serde_json::from_slice(&payload).unwrap();
        self.published.lock().unwrap().push((topic.to_string(), value));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Hands out one connection whose status feed the test controls
struct FakeBroker {
    link: Arc<RecordingLink>,
    inbox: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    seen: Mutex<Vec<(String, String, String)>>,
}

impl FakeBroker {
    fn new() -> (Arc<Self>, mpsc::Sender<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(8);
        let broker = Arc::new(Self {
            link: Arc::new(RecordingLink::default()),
            inbox: Mutex::new(Some(rx)),
            seen: Mutex::new(Vec::new()),
        });
        (broker, tx)
    }

    fn published(&self) -> Vec<(String, Value)> {
        self.link.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeBroker {
    async fn connect(
        &self,
        descriptor: &DeviceDescriptor,
        status_topic: &str,
    ) -> Result<BrokerConnection, AppError> {
        self.seen.lock().unwrap().push((
            descriptor.home_id.clone(),
            descriptor.token.access_token.clone(),
            status_topic.to_string(),
        ));
        let inbox = self
            .inbox
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| AppError::ConnectError("already connected".to_string()))?;
        Ok(BrokerConnection {
            link: self.link.clone(),
            inbox,
            driver: None,
        })
    }
}

fn descriptor(topics: &[&str]) -> DeviceDescriptor {
    DeviceDescriptor {
        device_id: "d-1".to_string(),
        name: "Living room".to_string(),
        topics: topics.iter().map(|t| t.to_string()).collect(),
        home_id: "home-1".to_string(),
        token: AccessToken {
            access_token: "tok-1".to_string(),
            expires_in: 3600,
            ..Default::default()
        },
    }
}

fn view() -> SharedView<ConsoleView> {
    Arc::new(Mutex::new(ConsoleView::new()))
}

fn rendered(view: &SharedView<ConsoleView>) -> String {
    view.lock().unwrap().render()
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Wait until the reconciler has taken everything out of the feed
async fn drain(feed: &mpsc::Sender<Vec<u8>>) {
    wait_until(|| feed.capacity() == feed.max_capacity()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn test_connect_uses_home_token_and_status_topic() {
    let (broker, _feed) = FakeBroker::new();
    let (session, _events) =
        assert_ok!(start_device(descriptor(&["u/home-1/d-1", "alt"]), broker.clone(), view()).await);

    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(
        *broker.seen.lock().unwrap(),
        vec![(
            "home-1".to_string(),
            "tok-1".to_string(),
            "u/home-1/d-1/status".to_string()
        )]
    );
}

#[tokio::test]
async fn test_device_without_topic_is_not_started() {
    let (broker, _feed) = FakeBroker::new();
    let view = view();

    let result = start_device(descriptor(&[]), broker.clone(), view.clone()).await;
    assert!(matches!(result, Err(AppError::NoTopic)));
    assert!(broker.seen.lock().unwrap().is_empty());
    // no menu for an unavailable device
    assert_eq!(rendered(&view), "");
}

#[tokio::test]
async fn test_status_push_updates_menu() {
    let (broker, feed) = FakeBroker::new();
    let view = view();
    let (session, _events) =
        assert_ok!(start_device(descriptor(&["u/home-1/d-1"]), broker, view.clone()).await);

    assert!(rendered(&view).contains("Status: OFF"));

    feed.send(ON_22.to_vec()).await.unwrap();
    wait_until(|| rendered(&view).contains("Status: ON")).await;

    let menu = rendered(&view);
    assert!(menu.contains("[x] 22"));
    assert!(menu.contains("[x] Auto"));
    assert!(menu.contains("[x] High"));
    assert!(!menu.contains("Temperature (disabled)"));
    assert_eq!(session.status().power, PowerState::On);
}

#[tokio::test]
async fn test_repeated_and_malformed_status_leave_menu_alone() {
    let (broker, feed) = FakeBroker::new();
    let view = view();
    let (session, _events) =
        assert_ok!(start_device(descriptor(&["u/home-1/d-1"]), broker, view.clone()).await);

    feed.send(ON_22.to_vec()).await.unwrap();
    wait_until(|| rendered(&view).contains("Status: ON")).await;
    let before = view.lock().unwrap().snapshot();
    let changes = view.lock().unwrap().changes();
    let status = session.status();

    for _ in 0..5 {
        feed.send(ON_22.to_vec()).await.unwrap();
    }
    feed.send(b"{\"ps\":".to_vec()).await.unwrap();
    feed.send(b"\xff\xfe".to_vec()).await.unwrap();
    feed.send(b"[]".to_vec()).await.unwrap();
    drain(&feed).await;

    assert_eq!(view.lock().unwrap().snapshot(), before);
    assert_eq!(view.lock().unwrap().changes(), changes);
    assert_eq!(session.status(), status);
}

#[tokio::test]
async fn test_menu_activations_publish_commands() {
    let (broker, feed) = FakeBroker::new();
    let (_session, events) = assert_ok!(
        start_device(descriptor(&["u/home-1/d-1"]), broker.clone(), view()).await
    );

    feed.send(ON_22.to_vec()).await.unwrap();
    drain(&feed).await;

    events.send(MenuEvent::TogglePower).await.unwrap();
    events.send(MenuEvent::TogglePower).await.unwrap();
    events.send(MenuEvent::SetTemperature(22)).await.unwrap();
    events.send(MenuEvent::SetMode(AcMode::Dry)).await.unwrap();
    events.send(MenuEvent::SetSpeed(FanSpeed::Medium)).await.unwrap();
    wait_until(|| broker.published().len() == 5).await;

    let topic = "u/home-1/d-1/control".to_string();
    assert_eq!(
        broker.published(),
        vec![
            (topic.clone(), json!({"ki": 1, "cnt": "an", "sid": "1", "ps": "off"})),
            (topic.clone(), json!({"ki": 1, "cnt": "an", "sid": "1", "ps": "on"})),
            (topic.clone(), json!({"ki": 1, "cnt": "an", "sid": "1", "actmp": "22.0"})),
            (topic.clone(), json!({"ki": 1, "cnt": "an", "sid": "1", "acmd": "dry"})),
            (topic, json!({"ki": 1, "cnt": "an", "sid": "1", "acfs": "medium"})),
        ]
    );
}

#[tokio::test]
async fn test_disconnect_tears_down_listeners() {
    let (broker, _feed) = FakeBroker::new();
    let (mut session, events) = assert_ok!(
        start_device(descriptor(&["u/home-1/d-1"]), broker.clone(), view()).await
    );

    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Disconnected);

    wait_until(|| events.is_closed()).await;
    assert!(events.send(MenuEvent::TogglePower).await.is_err());
    assert!(broker.published().is_empty());
}
