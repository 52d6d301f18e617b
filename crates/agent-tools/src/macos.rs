//! macOS UI automation through `peekaboo`.
//!
//! Every command runs with `--json-output`; results arrive in an
//! [`Envelope`] and failures are reported in-band, sometimes together with a
//! non-zero exit code.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::exec::{ArgList, CommandRunner, Invocation};
use crate::output::{Envelope, ToolOutput};
use crate::poll::{PollOptions, poll_until};
use crate::{Result, ToolError};

pub const DEFAULT_PROGRAM: &str = "peekaboo";

const TOOL: &str = "peekaboo";

// ─── Types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Screen,
    Window,
    Frontmost,
}

impl CaptureMode {
    fn as_str(self) -> &'static str {
        match self {
            CaptureMode::Screen => "screen",
            CaptureMode::Window => "window",
            CaptureMode::Frontmost => "frontmost",
        }
    }
}

/// What `see` should capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeeTarget {
    pub app: Option<String>,
    pub window_title: Option<String>,
    pub mode: Option<CaptureMode>,
    /// Draw element ids onto the screenshot
    pub annotate: bool,
    /// Where to save the screenshot
    pub path: Option<PathBuf>,
}

impl SeeTarget {
    pub fn app(name: impl Into<String>) -> Self {
        Self {
            app: Some(name.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiSnapshot {
    #[serde(alias = "session_id", alias = "snapshotId")]
    pub snapshot_id: String,
    #[serde(default, alias = "ui_elements")]
    pub elements: Vec<UiElement>,
    #[serde(default, alias = "screenshot_raw")]
    pub screenshot_path: Option<String>,
    #[serde(default)]
    pub application_name: Option<String>,
    #[serde(default)]
    pub window_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiElement {
    /// Id usable with `click --on`, e.g. `B3`
    pub id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub is_actionable: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl UiElement {
    /// Case-insensitive match against title, label, value and identifier.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        [&self.title, &self.label, &self.value, &self.identifier]
            .into_iter()
            .flatten()
            .any(|text| text.to_lowercase().contains(&query))
    }
}

impl UiSnapshot {
    pub fn find(&self, query: &str) -> Option<&UiElement> {
        self.elements.iter().find(|e| e.matches(query))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Element id from a previous `see`
    Element(String),
    /// Text of the element to find
    Query(String),
    Coordinates { x: i32, y: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickTarget {
    pub locator: Locator,
    /// Snapshot the element id belongs to; the latest one when absent
    pub snapshot: Option<String>,
    pub app: Option<String>,
    pub double: bool,
    pub right: bool,
}

impl ClickTarget {
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            snapshot: None,
            app: None,
            double: false,
            right: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeOptions {
    pub app: Option<String>,
    /// Select-all and delete before typing
    pub clear: bool,
    pub delay_ms: Option<u32>,
    pub press_return: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    fn as_str(self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Left => "left",
            ScrollDirection::Right => "right",
        }
    }
}

impl std::str::FromStr for ScrollDirection {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            "left" => Ok(ScrollDirection::Left),
            "right" => Ok(ScrollDirection::Right),
            other => Err(ToolError::InvalidArgument(format!(
                "unknown scroll direction `{other}`"
            ))),
        }
    }
}

// ─── Client ───────────────────────────────────────────────────────────────

pub struct Peekaboo<R> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> Peekaboo<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            program: DEFAULT_PROGRAM.to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Capture the screen or a window and list its UI elements.
    pub fn see(&self, target: &SeeTarget) -> Result<UiSnapshot> {
        let mut args = ArgList::from_words(&["see"]);
        args.opt_if("--app", target.app.as_deref())
            .opt_if("--window-title", target.window_title.as_deref())
            .opt_if("--mode", target.mode.map(CaptureMode::as_str))
            .opt_if("--path", target.path.as_ref().map(|p| p.display()))
            .flag("--annotate", target.annotate);
        let snapshot: UiSnapshot = self.call(args)?.into_result(TOOL)?;
        tracing::debug!(
            snapshot = %snapshot.snapshot_id,
            elements = snapshot.elements.len(),
            "captured UI snapshot"
        );
        Ok(snapshot)
    }

    pub fn click(&self, target: &ClickTarget) -> Result<()> {
        let mut args = ArgList::from_words(&["click"]);
        match &target.locator {
            Locator::Query(text) => {
                args.arg(text);
            }
            Locator::Element(id) => {
                args.opt("--on", id);
            }
            Locator::Coordinates { x, y } => {
                args.opt("--coords", format!("{x},{y}"));
            }
        }
        args.opt_if("--snapshot", target.snapshot.as_deref())
            .opt_if("--app", target.app.as_deref())
            .flag("--double", target.double)
            .flag("--right", target.right);
        self.call::<Value>(args)?.into_unit(TOOL)
    }

    pub fn type_text(&self, text: &str, options: &TypeOptions) -> Result<()> {
        let mut args = ArgList::from_words(&["type"]);
        args.arg(text)
            .opt_if("--app", options.app.as_deref())
            .flag("--clear", options.clear)
            .opt_if("--delay", options.delay_ms)
            .flag("--return", options.press_return);
        self.call::<Value>(args)?.into_unit(TOOL)
    }

    /// Press a key combination, e.g. `["cmd", "shift", "t"]`.
    pub fn hotkey(&self, keys: &[&str]) -> Result<()> {
        if keys.is_empty() {
            return Err(ToolError::InvalidArgument("no keys given".into()));
        }
        let mut args = ArgList::from_words(&["hotkey"]);
        args.opt("--keys", keys.join(","));
        self.call::<Value>(args)?.into_unit(TOOL)
    }

    pub fn scroll(&self, direction: ScrollDirection, amount: u32) -> Result<()> {
        let mut args = ArgList::from_words(&["scroll"]);
        args.opt("--direction", direction.as_str())
            .opt("--amount", amount);
        self.call::<Value>(args)?.into_unit(TOOL)
    }

    pub fn launch_app(&self, name: &str) -> Result<()> {
        let mut args = ArgList::from_words(&["app", "launch"]);
        args.arg(name);
        self.call::<Value>(args)?.into_unit(TOOL)
    }

    pub fn focus_window(&self, app: &str, title: Option<&str>) -> Result<()> {
        let mut args = ArgList::from_words(&["window", "focus"]);
        args.opt("--app", app).opt_if("--window-title", title);
        self.call::<Value>(args)?.into_unit(TOOL)
    }

    /// Re-capture until an element matching `query` shows up.
    pub fn wait_for_element(
        &self,
        query: &str,
        app: Option<&str>,
        options: &PollOptions,
    ) -> Result<UiElement> {
        let target = SeeTarget {
            app: app.map(str::to_string),
            ..Default::default()
        };
        poll_until(&format!("UI element matching `{query}`"), options, || {
            Ok(self.see(&target)?.find(query).cloned())
        })
    }

    /// Run a command and decode its envelope. peekaboo may exit non-zero and
    /// still print an envelope describing the failure; the envelope wins.
    fn call<T: DeserializeOwned>(&self, mut args: ArgList) -> Result<Envelope<T>> {
        args.flag("--json-output", true);
        let invocation = Invocation::new(&self.program, args);
        let out = self.runner.run(&invocation)?;

        match ToolOutput::parse(&out.stdout) {
            ToolOutput::Json(value) => serde_json::from_value(value)
                .map_err(|e| ToolError::json(format!("{TOOL} {} output", invocation.args[0]), e)),
            _ if !out.success() => Err(ToolError::CommandFailed {
                program: invocation.program,
                code: out.code.unwrap_or(-1),
                stderr: out.stderr.trim().to_string(),
            }),
            other => Err(ToolError::Protocol(format!(
                "expected a JSON envelope from {TOOL}, got: {}",
                other.text()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::exec::RawOutput;
    use crate::testing::ScriptedRunner;
    use serde_json::json;

    fn snapshot_json(labels: &[&str]) -> Value {
        let elements: Vec<Value> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                json!({"id": format!("B{}", i + 1), "role": "button", "label": label,
                       "is_actionable": true, "bounds": [[0, 0], [10, 10]]})
            })
            .collect();
        json!({"success": true, "data": {
            "session_id": "42",
            "ui_elements": elements,
            "screenshot_raw": "/tmp/shot.png"
        }})
    }

    #[test]
    fn see_parses_snapshot() {
        let runner = ScriptedRunner::new();
        runner.push_json(snapshot_json(&["Save", "Cancel"]));

        let snap = Peekaboo::new(&runner)
            .see(&SeeTarget {
                app: Some("TextEdit".into()),
                mode: Some(CaptureMode::Window),
                annotate: true,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(
            runner.args(0),
            vec!["see", "--app", "TextEdit", "--mode", "window", "--annotate", "--json-output"]
        );
        assert_eq!(snap.snapshot_id, "42");
        assert_eq!(snap.screenshot_path.as_deref(), Some("/tmp/shot.png"));
        assert_eq!(snap.find("cancel").map(|e| e.id.as_str()), Some("B2"));
        assert!(snap.elements[0].extra.contains_key("bounds"));
    }

    #[test]
    fn click_locators() {
        let runner = ScriptedRunner::new();
        for _ in 0..3 {
            runner.push_json(json!({"success": true, "data": {}}));
        }
        let pb = Peekaboo::new(&runner);

        let mut by_id = ClickTarget::new(Locator::Element("B1".into()));
        by_id.snapshot = Some("42".into());
        pb.click(&by_id).unwrap();

        let mut by_text = ClickTarget::new(Locator::Query("Save".into()));
        by_text.double = true;
        pb.click(&by_text).unwrap();

        pb.click(&ClickTarget::new(Locator::Coordinates { x: 10, y: -5 }))
            .unwrap();

        assert_eq!(
            runner.args(0),
            vec!["click", "--on", "B1", "--snapshot", "42", "--json-output"]
        );
        assert_eq!(runner.args(1), vec!["click", "Save", "--double", "--json-output"]);
        assert_eq!(runner.args(2), vec!["click", "--coords", "10,-5", "--json-output"]);
    }

    #[test]
    fn reported_failure_wins_over_exit_code() {
        let runner = ScriptedRunner::new();
        runner.push(RawOutput {
            code: Some(1),
            stdout: json!({"success": false, "error": {"message": "Element not found"}})
                .to_string(),
            stderr: String::new(),
        });
        let err = Peekaboo::new(&runner)
            .click(&ClickTarget::new(Locator::Element("B9".into())))
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::ToolReported { ref message, .. } if message == "Element not found"
        ));
    }

    #[test]
    fn non_json_failure_is_command_failed() {
        let runner = ScriptedRunner::new();
        runner.push_failure(64, "Error: Unknown option '--bogus'");
        let err = Peekaboo::new(&runner)
            .launch_app("Safari")
            .unwrap_err();
        assert!(matches!(err, ToolError::CommandFailed { code: 64, .. }));
    }

    #[test]
    fn keyboard_and_window_commands() {
        let runner = ScriptedRunner::new();
        for _ in 0..5 {
            runner.push_json(json!({"success": true}));
        }
        let pb = Peekaboo::new(&runner);
        pb.type_text(
            "hello world",
            &TypeOptions {
                clear: true,
                press_return: true,
                ..Default::default()
            },
        )
        .unwrap();
        pb.hotkey(&["cmd", "s"]).unwrap();
        pb.scroll(ScrollDirection::Down, 3).unwrap();
        pb.launch_app("Safari").unwrap();
        pb.focus_window("Safari", Some("Inbox")).unwrap();

        assert_eq!(
            runner.args(0),
            vec!["type", "hello world", "--clear", "--return", "--json-output"]
        );
        assert_eq!(runner.args(1), vec!["hotkey", "--keys", "cmd,s", "--json-output"]);
        assert_eq!(
            runner.args(2),
            vec!["scroll", "--direction", "down", "--amount", "3", "--json-output"]
        );
        assert_eq!(runner.args(3), vec!["app", "launch", "Safari", "--json-output"]);
        assert_eq!(
            runner.args(4),
            vec!["window", "focus", "--app", "Safari", "--window-title", "Inbox", "--json-output"]
        );
    }

    #[test]
    fn hotkey_requires_keys() {
        let runner = ScriptedRunner::new();
        assert!(Peekaboo::new(&runner).hotkey(&[]).is_err());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn wait_for_element_recaptures() {
        let runner = ScriptedRunner::new();
        runner.push_json(snapshot_json(&["Loading"]));
        runner.push_json(snapshot_json(&["Loading", "Continue"]));

        let opts = PollOptions::new(Duration::ZERO, Duration::from_secs(5));
        let element = Peekaboo::new(&runner)
            .wait_for_element("continue", Some("Installer"), &opts)
            .unwrap();
        assert_eq!(element.id, "B2");
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn scroll_direction_from_str() {
        assert_eq!("UP".parse::<ScrollDirection>().unwrap(), ScrollDirection::Up);
        assert!("sideways".parse::<ScrollDirection>().is_err());
    }
}
