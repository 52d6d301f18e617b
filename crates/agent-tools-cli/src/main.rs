//! agent-tools: typed front end for the Jira, GitHub, macOS UI and browser
//! tools an AI coding agent drives

mod cmd;
mod config;
mod output;

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};

use cmd::browser::BrowserSubcommand;
use cmd::convert::{ConvertArgs, ToMarkdownArgs};
use cmd::gh::GhSubcommand;
use cmd::jira::JiraSubcommand;
use cmd::ui::UiSubcommand;
use config::Config;

#[derive(Parser)]
#[command(
    name = "agent-tools",
    about = "Typed front end for the tools an AI coding agent drives",
    version,
    propagate_version = true
)]
#[command(after_help = "Examples:
  agent-tools convert notes.md               # Markdown -> ADF JSON
  agent-tools jira view OPS-12               # Work item with markdown description
  agent-tools jira comment OPS-12 '**done**' # Comment in markdown
  agent-tools gh trigger ci.yml --wait       # Dispatch and wait for a workflow
  agent-tools init                           # Write a sample agent-tools.toml")]
struct Cli {
    /// Configuration file (default: ./agent-tools.toml when present)
    #[arg(long, global = true, env = "AGENT_TOOLS_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Quiet mode - only show errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert markdown to ADF JSON
    Convert(ConvertArgs),

    /// Render an ADF JSON document as markdown
    ToMarkdown(ToMarkdownArgs),

    /// Jira work items (acli)
    Jira {
        #[command(subcommand)]
        subcommand: JiraSubcommand,
    },

    /// GitHub Actions runs (gh)
    Gh {
        #[command(subcommand)]
        subcommand: GhSubcommand,
    },

    /// macOS UI automation (peekaboo)
    Ui {
        #[command(subcommand)]
        subcommand: UiSubcommand,
    },

    /// Browser automation through a JSON-RPC tool server
    Browser {
        #[command(subcommand)]
        subcommand: BrowserSubcommand,
    },

    /// Create a sample configuration file
    Init {
        /// Output path (default: agent-tools.toml)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the JSON schema instead
        #[arg(long)]
        schema: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn log_level(verbose: u8, quiet: bool) -> tracing::Level {
    if quiet {
        return tracing::Level::ERROR;
    }
    match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

fn with_config(
    path: Option<&Path>,
    run: impl FnOnce(&Config) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let config = Config::resolve(path)?;
    run(&config)
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(log_level(cli.verbose, cli.quiet).into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Convert(args) => {
            with_config(config_path, |config| cmd::convert::run(config, args, cli.quiet))
        }
        Commands::ToMarkdown(args) => cmd::convert::run_to_markdown(args),
        Commands::Jira { subcommand } => {
            with_config(config_path, |config| cmd::jira::run(config, subcommand, cli.json))
        }
        Commands::Gh { subcommand } => {
            with_config(config_path, |config| cmd::gh::run(config, subcommand, cli.json))
        }
        Commands::Ui { subcommand } => {
            with_config(config_path, |config| cmd::ui::run(config, subcommand, cli.json))
        }
        Commands::Browser { subcommand } => {
            with_config(config_path, |config| cmd::browser::run(config, subcommand, cli.json))
        }
        Commands::Init {
            output,
            schema,
            force,
        } => cmd::init::run(output.as_deref(), schema, force),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
