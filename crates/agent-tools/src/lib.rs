//! `agent-tools`: typed function calls for the command-line tools an AI
//! coding agent drives.
//!
//! Each wrapper turns typed options into an argument vector, runs the tool
//! through a [`CommandRunner`], and decodes its output into typed results.
//! The tools themselves do the real work.
//!
//! # Architecture
//!
//! ```text
//! Jira / GitHub / Peekaboo      ← typed options → ArgList
//!     │
//!     ▼
//! CommandRunner                 ← ProcessRunner spawns `acli`, `gh`, `peekaboo`
//!     │                            (scripted in tests)
//!     ▼
//! ToolOutput / Envelope<T>      ← stdout classified once, then deserialized
//!
//! BrowserSession<T>             ← JSON-RPC 2.0 over an RpcTransport
//!     │                            (StdioTransport owns the server process)
//!     ▼
//! ToolCallResult
//! ```
//!
//! Markdown written by the agent is converted to ADF with `md2adf` before it
//! reaches Jira, and ADF read back is rendered with the `adf-model` writer.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use agent_tools::ProcessRunner;
//! use agent_tools::github::{GitHub, RunFilter};
//!
//! let gh = GitHub::new(ProcessRunner::new()).with_repo(Some("owner/repo".into()));
//! for run in gh.list_runs(&RunFilter { limit: Some(5), ..Default::default() })? {
//!     println!("{} {} {}", run.database_id, run.status.as_str(), run.display_title);
//! }
//! # Ok::<(), agent_tools::ToolError>(())
//! ```

pub mod browser;
pub mod error;
pub mod exec;
pub mod github;
pub mod jira;
pub mod macos;
pub mod output;
pub mod poll;

#[cfg(test)]
mod testing;

pub use error::ToolError;
pub use exec::{ArgList, CommandRunner, Invocation, ProcessRunner, RawOutput};
pub use output::{Envelope, ToolOutput};
pub use poll::{PollOptions, poll_until};

pub type Result<T> = std::result::Result<T, ToolError>;
