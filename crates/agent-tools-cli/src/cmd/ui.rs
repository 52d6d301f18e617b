use std::path::PathBuf;

use agent_tools::ProcessRunner;
use agent_tools::macos::{CaptureMode, ClickTarget, Locator, Peekaboo, SeeTarget, TypeOptions};
use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};

use crate::config::Config;
use crate::output::print_json;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Mode {
    Screen,
    Window,
    Frontmost,
}

impl From<Mode> for CaptureMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Screen => CaptureMode::Screen,
            Mode::Window => CaptureMode::Window,
            Mode::Frontmost => CaptureMode::Frontmost,
        }
    }
}

#[derive(Subcommand)]
pub enum UiSubcommand {
    /// Capture the screen or a window and list its elements
    See {
        #[arg(long)]
        app: Option<String>,
        #[arg(long)]
        window_title: Option<String>,
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// Draw element ids onto the screenshot
        #[arg(long)]
        annotate: bool,
        /// Save the screenshot here
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Click an element by text, id, or coordinates
    Click {
        /// Text of the element to click
        #[arg(required_unless_present_any = ["on", "coords"])]
        query: Option<String>,
        /// Element id from `ui see`, e.g. B3
        #[arg(long, conflicts_with_all = ["query", "coords"])]
        on: Option<String>,
        /// Screen coordinates as X,Y
        #[arg(long, conflicts_with = "query", value_parser = parse_coords)]
        coords: Option<(i32, i32)>,
        /// Snapshot the element id belongs to
        #[arg(long)]
        snapshot: Option<String>,
        #[arg(long)]
        app: Option<String>,
        #[arg(long)]
        double: bool,
        #[arg(long)]
        right: bool,
    },
    /// Type text into the focused element
    Type {
        text: String,
        #[arg(long)]
        app: Option<String>,
        /// Clear the field first
        #[arg(long)]
        clear: bool,
        /// Delay between keystrokes in milliseconds
        #[arg(long)]
        delay: Option<u32>,
        /// Press return afterwards
        #[arg(long = "return")]
        press_return: bool,
    },
}

pub fn run(config: &Config, subcmd: UiSubcommand, json: bool) -> Result<()> {
    let peekaboo = Peekaboo::new(ProcessRunner::new()).with_program(config.tools.peekaboo());

    match subcmd {
        UiSubcommand::See {
            app,
            window_title,
            mode,
            annotate,
            path,
        } => {
            let snapshot = peekaboo.see(&SeeTarget {
                app,
                window_title,
                mode: mode.map(CaptureMode::from),
                annotate,
                path,
            })?;
            if json {
                return print_json(&snapshot);
            }
            println!("snapshot {}", snapshot.snapshot_id);
            for element in &snapshot.elements {
                let text = element
                    .label
                    .as_deref()
                    .or(element.title.as_deref())
                    .or(element.value.as_deref())
                    .unwrap_or("");
                println!("{:<6} {:<16} {}", element.id, element.role, text);
            }
            Ok(())
        }
        UiSubcommand::Click {
            query,
            on,
            coords,
            snapshot,
            app,
            double,
            right,
        } => {
            let locator = match (on, coords, query) {
                (Some(id), _, _) => Locator::Element(id),
                (_, Some((x, y)), _) => Locator::Coordinates { x, y },
                (_, _, Some(text)) => Locator::Query(text),
                _ => anyhow::bail!("nothing to click: give a query, --on or --coords"),
            };
            peekaboo
                .click(&ClickTarget {
                    locator,
                    snapshot,
                    app,
                    double,
                    right,
                })
                .context("click failed")?;
            Ok(())
        }
        UiSubcommand::Type {
            text,
            app,
            clear,
            delay,
            press_return,
        } => {
            peekaboo.type_text(
                &text,
                &TypeOptions {
                    app,
                    clear,
                    delay_ms: delay,
                    press_return,
                },
            )?;
            Ok(())
        }
    }
}

fn parse_coords(s: &str) -> Result<(i32, i32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got `{s}`"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<i32>()
            .map_err(|e| format!("invalid coordinate `{v}`: {e}"))
    };
    Ok((parse(x)?, parse(y)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_coordinates() {
        assert_eq!(parse_coords("10,20").unwrap(), (10, 20));
        assert_eq!(parse_coords(" -5, 7").unwrap(), (-5, 7));
        assert!(parse_coords("10").is_err());
        assert!(parse_coords("a,b").is_err());
    }
}
