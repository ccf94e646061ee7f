//! Headless frontend: an in-memory menu tree driven from stdin
//!
//! Stands in for a tray toolkit. Menu changes are logged, and typed commands
//! are turned into the same activations a click would raise.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::models::status::{AcMode, FanSpeed};
use crate::ui::events::MenuEvent;
use crate::ui::menu::{MenuView, SharedView};

/// One entry of the in-memory menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub parent: Option<usize>,
    pub title: String,
    pub enabled: bool,
    pub checkable: bool,
    pub checked: bool,
}

/// In-memory menu tree
#[derive(Debug, Default)]
pub struct ConsoleView {
    nodes: Vec<Node>,
    changes: usize,
}

impl ConsoleView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self, item: usize) -> &str {
        self.nodes.get(item).map(|n| n.title.as_str()).unwrap_or_default()
    }

    pub fn is_enabled(&self, item: usize) -> bool {
        self.nodes.get(item).is_some_and(|n| n.enabled)
    }

    pub fn checked_items(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|i| self.nodes[*i].checked)
            .collect()
    }

    /// Number of mutating calls received after the tree was built
    pub fn changes(&self) -> usize {
        self.changes
    }

    pub fn snapshot(&self) -> Vec<Node> {
        self.nodes.clone()
    }

    fn depth(&self, mut item: usize) -> usize {
        let mut depth = 0;
        while let Some(parent) = self.nodes.get(item).and_then(|n| n.parent) {
            depth += 1;
            item = parent;
        }
        depth
    }

    /// Indented text rendering of the whole tree
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_children(None, &mut out);
        out
    }

    fn render_children(&self, parent: Option<usize>, out: &mut String) {
        for (i, node) in self.nodes.iter().enumerate() {
            if node.parent != parent {
                continue;
            }
            let mark = match (node.checkable, node.checked) {
                (true, true) => "[x] ",
                (true, false) => "[ ] ",
                _ => "",
            };
            let disabled = if node.enabled { "" } else { " (disabled)" };
            out.push_str(&format!(
                "{}{}{}{}\n",
                "  ".repeat(self.depth(i)),
                mark,
                node.title,
                disabled
            ));
            self.render_children(Some(i), out);
        }
    }

    fn node(&mut self, item: usize) -> Option<&mut Node> {
        self.changes += 1;
        self.nodes.get_mut(item)
    }
}

impl MenuView for ConsoleView {
    type Handle = usize;

    fn add_item(&mut self, parent: Option<usize>, title: &str, checkable: bool) -> usize {
        self.nodes.push(Node {
            parent,
            title: title.to_string(),
            enabled: true,
            checkable,
            checked: false,
        });
        self.nodes.len() - 1
    }

    fn set_title(&mut self, item: usize, title: &str) {
        if let Some(node) = self.node(item) {
            debug!(from = %node.title, to = %title, "menu title");
            node.title = title.to_string();
        }
    }

    fn set_enabled(&mut self, item: usize, enabled: bool) {
        if let Some(node) = self.node(item) {
            debug!(item = %node.title, enabled, "menu enabled");
            node.enabled = enabled;
        }
    }

    fn set_checked(&mut self, item: usize, checked: bool) {
        if let Some(node) = self.node(item) {
            debug!(item = %node.title, checked, "menu checked");
            node.checked = checked;
        }
    }
}

/// Command typed on stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    List,
    Show,
    Quit,
    /// Activation for the device at this 1-based position
    Device { index: usize, event: MenuEvent },
}

pub const HELP: &str = "\
commands:
  list                    devices and their numbers
  show                    print the menu tree
  <n> power               toggle power
  <n> temp <16-28>        set temperature
  <n> mode <auto|dry|fan>
  <n> speed <auto|quiet|low|medium|high>
  quit";

pub fn parse_command(line: &str) -> Result<Command, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["help"] | ["?"] => Ok(Command::Help),
        ["list"] => Ok(Command::List),
        ["show"] => Ok(Command::Show),
        ["quit"] | ["exit"] => Ok(Command::Quit),
        [index, rest @ ..] => {
            let index: usize = index
                .parse()
                .ok()
                .filter(|i| *i > 0)
                .ok_or_else(|| format!("unknown command: {}", line.trim()))?;
            let event = match rest {
                ["power"] => MenuEvent::TogglePower,
                ["temp", value] => {
                    let celsius: i32 = value
                        .parse()
                        .map_err(|_| format!("invalid temperature: {}", value))?;
                    MenuEvent::SetTemperature(celsius)
                }
                ["mode", value] => MenuEvent::SetMode(value.parse::<AcMode>()?),
                ["speed", value] => MenuEvent::SetSpeed(value.parse::<FanSpeed>()?),
                _ => return Err(format!("unknown command: {}", line.trim())),
            };
            Ok(Command::Device { index, event })
        }
        [] => Err("empty command".to_string()),
    }
}

/// Device reachable from the console
pub struct ConsoleDevice {
    pub name: String,
    pub events: mpsc::Sender<MenuEvent>,
}

/// Read commands from stdin until `quit`.
///
/// When stdin closes the frontend goes quiet and leaves shutdown to signals.
pub async fn run(view: SharedView<ConsoleView>, devices: Vec<ConsoleDevice>) {
    info!("console ready, type 'help' for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("stdin closed, console input disabled");
                return std::future::pending().await;
            }
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                return std::future::pending().await;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(Command::Help) => println!("{}", HELP),
            Ok(Command::List) => {
                for (i, device) in devices.iter().enumerate() {
                    println!("{}  {}", i + 1, device.name);
                }
            }
            Ok(Command::Show) => {
                let tree = view
                    .lock()
                    .map(|v| v.render())
                    .unwrap_or_else(|poisoned| poisoned.into_inner().render());
                print!("{}", tree);
            }
            Ok(Command::Quit) => return,
            Ok(Command::Device { index, event }) => match devices.get(index - 1) {
                Some(device) => {
                    if device.events.send(event).await.is_err() {
                        warn!(device = %device.name, "device is no longer listening");
                    }
                }
                None => println!("no device {}", index),
            },
            Err(e) => println!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("quit"), Ok(Command::Quit));
        assert_eq!(parse_command(" list "), Ok(Command::List));
        assert_eq!(
            parse_command("1 power"),
            Ok(Command::Device { index: 1, event: MenuEvent::TogglePower })
        );
        assert_eq!(
            parse_command("2 temp 22"),
            Ok(Command::Device { index: 2, event: MenuEvent::SetTemperature(22) })
        );
        assert_eq!(
            parse_command("1 mode Dry"),
            Ok(Command::Device { index: 1, event: MenuEvent::SetMode(AcMode::Dry) })
        );
        assert_eq!(
            parse_command("1 speed quiet"),
            Ok(Command::Device { index: 1, event: MenuEvent::SetSpeed(FanSpeed::Quiet) })
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_command("").is_err());
        assert!(parse_command("0 power").is_err());
        assert!(parse_command("1 temp warm").is_err());
        assert!(parse_command("1 mode cool").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn test_render_tree() {
        let mut view = ConsoleView::new();
        let root = view.add_item(None, "Bedroom", false);
        let mode = view.add_item(Some(root), "Mode", false);
        let dry = view.add_item(Some(mode), "Dry", true);
        view.add_item(Some(mode), "Fan", true);
        view.set_checked(dry, true);
        view.set_enabled(mode, false);

        assert_eq!(
            view.render(),
            "Bedroom\n  Mode (disabled)\n    [x] Dry\n    [ ] Fan\n"
        );
        assert_eq!(view.changes(), 2);
    }
}
