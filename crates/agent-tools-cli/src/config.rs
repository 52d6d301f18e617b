//! Configuration file support for the agent-tools CLI
//!
//! Loads settings from `agent-tools.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use agent_tools::PollOptions;
use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "agent-tools.toml";

/// Schema URL for the configuration file
pub const SCHEMA_URL: &str = "https://raw.githubusercontent.com/agent-tools/agent-tools/main/crates/agent-tools-cli/schema/agent-tools.schema.json";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30 * 60;

/// Root configuration structure
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Executable paths of the wrapped tools
    #[serde(skip_serializing_if = "ToolsConfig::is_empty")]
    pub tools: ToolsConfig,
    /// Jira defaults
    #[serde(skip_serializing_if = "JiraConfig::is_empty")]
    pub jira: JiraConfig,
    /// GitHub defaults and run polling
    #[serde(skip_serializing_if = "GithubConfig::is_empty")]
    pub github: GithubConfig,
    /// Browser automation server
    #[serde(skip_serializing_if = "BrowserConfig::is_empty")]
    pub browser: BrowserConfig,
    /// Markdown to ADF conversion
    #[serde(skip_serializing_if = "ConvertConfig::is_empty")]
    pub convert: ConvertConfig,
}

/// Executable paths; each defaults to the tool's name on `PATH`
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct ToolsConfig {
    /// Atlassian CLI (default: "acli")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acli: Option<String>,
    /// GitHub CLI (default: "gh")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gh: Option<String>,
    /// macOS UI automation CLI (default: "peekaboo")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peekaboo: Option<String>,
}

impl ToolsConfig {
    fn is_empty(&self) -> bool {
        self.acli.is_none() && self.gh.is_none() && self.peekaboo.is_none()
    }

    pub fn acli(&self) -> &str {
        self.acli
            .as_deref()
            .unwrap_or(agent_tools::jira::DEFAULT_PROGRAM)
    }

    pub fn gh(&self) -> &str {
        self.gh
            .as_deref()
            .unwrap_or(agent_tools::github::DEFAULT_PROGRAM)
    }

    pub fn peekaboo(&self) -> &str {
        self.peekaboo
            .as_deref()
            .unwrap_or(agent_tools::macos::DEFAULT_PROGRAM)
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct JiraConfig {
    /// Project key used by `jira create` when `--project` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_project: Option<String>,
}

impl JiraConfig {
    fn is_empty(&self) -> bool {
        self.default_project.is_none()
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct GithubConfig {
    /// Repository as OWNER/REPO (default: the repository of the working directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    /// Seconds between run status checks (default: 10)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
    /// Seconds to wait for a run before giving up (default: 1800)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl GithubConfig {
    fn is_empty(&self) -> bool {
        self.repo.is_none() && self.poll_interval_secs.is_none() && self.timeout_secs.is_none()
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions::new(
            Duration::from_secs(self.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS)),
            Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        )
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct BrowserConfig {
    /// Program that starts the JSON-RPC browser server (default: "npx")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Arguments for the server program (default: ["@playwright/mcp@latest"])
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

impl BrowserConfig {
    fn is_empty(&self) -> bool {
        self.command.is_none() && self.args.is_none()
    }

    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or("npx")
    }

    pub fn args(&self) -> Vec<String> {
        self.args
            .clone()
            .unwrap_or_else(|| vec!["@playwright/mcp@latest".to_string()])
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct ConvertConfig {
    /// Keep single line breaks as hard breaks (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_line_breaks: Option<bool>,
    /// Pretty-print ADF JSON (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretty: Option<bool>,
}

impl ConvertConfig {
    fn is_empty(&self) -> bool {
        self.preserve_line_breaks.is_none() && self.pretty.is_none()
    }
}

impl Config {
    /// Load configuration from a specific file path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Try to load configuration from a directory (looks for `agent-tools.toml`)
    ///
    /// Returns `Ok(None)` if the config file doesn't exist.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// An explicit path must exist; otherwise the working directory is
    /// searched and defaults apply when nothing is found.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let cwd: PathBuf = std::env::current_dir().context("Failed to get current directory")?;
        Ok(Self::load_from_dir(&cwd)?.unwrap_or_default())
    }

    /// Generate JSON schema for the configuration
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Config)
    }

    /// Generate JSON schema as a string
    pub fn json_schema_string() -> Result<String> {
        let schema = Self::json_schema();
        serde_json::to_string_pretty(&schema).context("Failed to serialize JSON schema")
    }

    /// Serialize configuration to TOML string with schema directive
    pub fn to_toml_with_schema(&self) -> Result<String> {
        let toml_content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        Ok(format!("#:schema {}\n\n{}", SCHEMA_URL, toml_content))
    }

    /// Sample configuration written by `init`
    pub fn sample() -> Self {
        Config {
            tools: ToolsConfig {
                acli: Some("acli".to_string()),
                gh: Some("gh".to_string()),
                peekaboo: Some("peekaboo".to_string()),
            },
            jira: JiraConfig {
                default_project: None, // user should specify
            },
            github: GithubConfig {
                repo: None, // detected by gh
                poll_interval_secs: Some(DEFAULT_POLL_INTERVAL_SECS),
                timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            },
            browser: BrowserConfig {
                command: Some("npx".to_string()),
                args: Some(vec!["@playwright/mcp@latest".to_string()]),
            },
            convert: ConvertConfig {
                preserve_line_breaks: Some(false),
                pretty: Some(false),
            },
        }
    }
}
