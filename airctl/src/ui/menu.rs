//! Device menus and their reflection of device status
//!
//! The rendering toolkit sits behind [`MenuView`]. Each device gets a fixed
//! tree of entries built once by [`DeviceMenu::build`]; after that the menu is
//! only ever touched by [`DeviceMenu::apply`], which compares the wanted state
//! with what it last rendered and issues just the differences.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::models::status::{AcMode, FanSpeed, PowerState, Status};
use crate::ui::events::MenuEvent;

/// Temperatures offered in the menu, in °C
pub const TEMPERATURES: RangeInclusive<i32> = 16..=28;

/// Entries of a device menu
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MenuItem {
    Device,
    Status,
    Power,
    Temperature,
    Mode,
    Speed,
    TemperatureOption(i32),
    ModeOption(AcMode),
    SpeedOption(FanSpeed),
}

/// Menu rendering toolkit
pub trait MenuView: Send + 'static {
    type Handle: Copy + Eq + std::fmt::Debug + Send + Sync + 'static;

    fn add_item(&mut self, parent: Option<Self::Handle>, title: &str, checkable: bool)
        -> Self::Handle;

    fn set_title(&mut self, item: Self::Handle, title: &str);

    fn set_enabled(&mut self, item: Self::Handle, enabled: bool);

    fn set_checked(&mut self, item: Self::Handle, checked: bool);
}

/// View shared by every device menu
pub type SharedView<V> = Arc<Mutex<V>>;

fn lock<V>(view: &SharedView<V>) -> MutexGuard<'_, V> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Toolkit handles of one device menu, keyed by entry
#[derive(Debug)]
pub struct MenuLayout<H> {
    handles: HashMap<MenuItem, H>,
}

impl<H: Copy + Eq> MenuLayout<H> {
    pub fn handle(&self, item: &MenuItem) -> Option<H> {
        self.handles.get(item).copied()
    }

    pub fn item(&self, handle: H) -> Option<&MenuItem> {
        self.handles
            .iter()
            .find(|(_, h)| **h == handle)
            .map(|(item, _)| item)
    }

    /// Event to raise when the toolkit reports a click on `handle`
    pub fn event_for(&self, handle: H) -> Option<MenuEvent> {
        self.item(handle).and_then(MenuEvent::for_item)
    }
}

/// What a device menu should show for a status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuState {
    /// `None` when the power value is not one we know; labels stay as they are
    pub powered: Option<bool>,

    /// `None` when the temperature does not parse; checks stay as they are
    pub temperature: Option<i64>,

    pub mode: AcMode,
    pub speed: FanSpeed,
}

impl MenuState {
    pub fn from_status(status: &Status) -> Self {
        Self {
            powered: match status.power {
                PowerState::On => Some(true),
                PowerState::Off => Some(false),
                PowerState::Unknown(_) => None,
            },
            temperature: status.temperature_degrees(),
            mode: status.mode.clone(),
            speed: status.speed.clone(),
        }
    }
}

/// What is currently on screen
#[derive(Debug, Clone, PartialEq, Eq)]
struct Rendered {
    powered: Option<bool>,
    temperature: Option<i32>,
    mode: Option<AcMode>,
    speed: Option<FanSpeed>,
}

enum Op<H> {
    Title(H, String),
    Enabled(H, bool),
    Checked(H, bool),
}

/// Menu of one device
pub struct DeviceMenu<V: MenuView> {
    view: SharedView<V>,
    layout: Arc<MenuLayout<V::Handle>>,
    rendered: Rendered,
}

impl<V: MenuView> DeviceMenu<V> {
    /// Add the device's entries to the view.
    ///
    /// The menu starts in the powered-off look: controls disabled, nothing
    /// checked.
    pub fn build(view: SharedView<V>, name: &str) -> Self {
        let mut handles = HashMap::new();
        {
            let mut v = lock(&view);

            let root = v.add_item(None, name, false);
            handles.insert(MenuItem::Device, root);

            let status = v.add_item(Some(root), &status_title(false), false);
            v.set_enabled(status, false);
            handles.insert(MenuItem::Status, status);

            let power = v.add_item(Some(root), &power_title(false), false);
            handles.insert(MenuItem::Power, power);

            let temperature = v.add_item(Some(root), "Temperature", false);
            v.set_enabled(temperature, false);
            handles.insert(MenuItem::Temperature, temperature);
            for celsius in TEMPERATURES {
                let option = v.add_item(Some(temperature), &celsius.to_string(), true);
                handles.insert(MenuItem::TemperatureOption(celsius), option);
            }

            let mode = v.add_item(Some(root), "Mode", false);
            v.set_enabled(mode, false);
            handles.insert(MenuItem::Mode, mode);
            for m in AcMode::ALL {
                let option = v.add_item(Some(mode), m.label(), true);
                handles.insert(MenuItem::ModeOption(m.clone()), option);
            }

            let speed = v.add_item(Some(root), "Fan Speed", false);
            v.set_enabled(speed, false);
            handles.insert(MenuItem::Speed, speed);
            for s in FanSpeed::ALL {
                let option = v.add_item(Some(speed), s.label(), true);
                handles.insert(MenuItem::SpeedOption(s.clone()), option);
            }
        }

        Self {
            view,
            layout: Arc::new(MenuLayout { handles }),
            rendered: Rendered {
                powered: Some(false),
                temperature: None,
                mode: None,
                speed: None,
            },
        }
    }

    pub fn layout(&self) -> Arc<MenuLayout<V::Handle>> {
        self.layout.clone()
    }

    /// Bring the view in line with `state`, returning how many view calls
    /// that took. Applying the same state twice makes no calls the second time.
    pub fn apply(&mut self, state: &MenuState) -> usize {
        let ops = self.plan(state);
        if ops.is_empty() {
            return 0;
        }

        let mut v = lock(&self.view);
        for op in &ops {
            match op {
                Op::Title(h, title) => v.set_title(*h, title),
                Op::Enabled(h, enabled) => v.set_enabled(*h, *enabled),
                Op::Checked(h, checked) => v.set_checked(*h, *checked),
            }
        }
        ops.len()
    }

    fn plan(&mut self, state: &MenuState) -> Vec<Op<V::Handle>> {
        let mut ops = Vec::new();
        let layout = self.layout.clone();
        let handle = |item: MenuItem| layout.handle(&item);

        if let Some(on) = state.powered {
            if self.rendered.powered != Some(on) {
                if let Some(h) = handle(MenuItem::Status) {
                    ops.push(Op::Title(h, status_title(on)));
                }
                if let Some(h) = handle(MenuItem::Power) {
                    ops.push(Op::Title(h, power_title(on)));
                }
                for item in [MenuItem::Temperature, MenuItem::Mode, MenuItem::Speed] {
                    if let Some(h) = handle(item) {
                        ops.push(Op::Enabled(h, on));
                    }
                }
                self.rendered.powered = Some(on);
            }
        }

        if let Some(degrees) = state.temperature {
            let wanted = i32::try_from(degrees)
                .ok()
                .filter(|celsius| TEMPERATURES.contains(celsius));
            if self.rendered.temperature != wanted {
                move_check(
                    &mut ops,
                    self.rendered.temperature.and_then(|c| handle(MenuItem::TemperatureOption(c))),
                    wanted.and_then(|c| handle(MenuItem::TemperatureOption(c))),
                );
                self.rendered.temperature = wanted;
            }
        }

        let wanted = Some(state.mode.clone()).filter(|m| AcMode::ALL.contains(m));
        if self.rendered.mode != wanted {
            move_check(
                &mut ops,
                self.rendered.mode.clone().and_then(|m| handle(MenuItem::ModeOption(m))),
                wanted.clone().and_then(|m| handle(MenuItem::ModeOption(m))),
            );
            self.rendered.mode = wanted;
        }

        let wanted = Some(state.speed.clone()).filter(|s| FanSpeed::ALL.contains(s));
        if self.rendered.speed != wanted {
            move_check(
                &mut ops,
                self.rendered.speed.clone().and_then(|s| handle(MenuItem::SpeedOption(s))),
                wanted.clone().and_then(|s| handle(MenuItem::SpeedOption(s))),
            );
            self.rendered.speed = wanted;
        }

        ops
    }

    /// Follow status changes until the session's status channel closes
    pub async fn reflect(mut self, mut status: watch::Receiver<Status>) {
        loop {
            let state = MenuState::from_status(&status.borrow_and_update());
            let changes = self.apply(&state);
            if changes > 0 {
                debug!(changes, state = ?state, "menu updated");
            }
            if status.changed().await.is_err() {
                return;
            }
        }
    }
}

fn move_check<H>(ops: &mut Vec<Op<H>>, from: Option<H>, to: Option<H>) {
    if let Some(h) = from {
        ops.push(Op::Checked(h, false));
    }
    if let Some(h) = to {
        ops.push(Op::Checked(h, true));
    }
}

fn status_title(on: bool) -> String {
    let power = if on { PowerState::On } else { PowerState::Off };
    format!("Status: {}", power.label())
}

/// The power entry names the action it performs
fn power_title(on: bool) -> String {
    let action = if on { PowerState::Off } else { PowerState::On };
    action.label().to_string()
}
