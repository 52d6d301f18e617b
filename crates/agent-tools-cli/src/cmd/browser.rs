use agent_tools::browser::{BrowserSession, StdioTransport};
use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::Config;
use crate::output::print_json;

#[derive(Subcommand)]
pub enum BrowserSubcommand {
    /// Open a URL and print the server's report
    Navigate {
        url: String,
        /// Also print the accessibility snapshot of the loaded page
        #[arg(long)]
        snapshot: bool,
        /// Wait until this text appears before snapshotting
        #[arg(long)]
        wait_for: Option<String>,
    },
    /// List the tools the browser server offers
    Tools,
}

pub fn run(config: &Config, subcmd: BrowserSubcommand, json: bool) -> Result<()> {
    let command = config.browser.command();
    let mut session = BrowserSession::spawn(command, &config.browser.args())
        .with_context(|| format!("Failed to start browser server `{command}`"))?;

    let result = match subcmd {
        BrowserSubcommand::Navigate {
            url,
            snapshot,
            wait_for,
        } => navigate(&mut session, &url, snapshot, wait_for.as_deref(), json),
        BrowserSubcommand::Tools => list_tools(&mut session, json),
    };

    // Shut the server down even when the command failed
    let closed = session.close();
    result?;
    closed?;
    Ok(())
}

fn navigate(
    session: &mut BrowserSession<StdioTransport>,
    url: &str,
    snapshot: bool,
    wait_for: Option<&str>,
    json: bool,
) -> Result<()> {
    let report = session.navigate(url)?;
    if let Some(text) = wait_for {
        session.wait_for_text(text, 30)?;
    }
    let page = if snapshot {
        Some(session.snapshot()?)
    } else {
        None
    };

    if json {
        return print_json(&serde_json::json!({ "navigate": report, "snapshot": page }));
    }
    println!("{report}");
    if let Some(page) = page {
        println!();
        println!("{page}");
    }
    Ok(())
}

fn list_tools(session: &mut BrowserSession<StdioTransport>, json: bool) -> Result<()> {
    let tools = session.list_tools()?;
    if json {
        return print_json(&tools);
    }
    for tool in tools {
        println!("{:<28} {}", tool.name, tool.description.unwrap_or_default());
    }
    Ok(())
}
