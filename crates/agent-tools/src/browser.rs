//! Browser automation through a JSON-RPC 2.0 tool server (for example
//! `npx @playwright/mcp`) spoken over the server's stdin/stdout.
//!
//! A [`BrowserSession`] owns one server. It is opened with the
//! `initialize` handshake and shut down with [`BrowserSession::close`];
//! dropping a session without closing it kills the server process.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::{Result, ToolError};

pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Grace period for the server to exit after its stdin closes
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ─── Transport ────────────────────────────────────────────────────────────

/// Message channel to the server. One JSON value per message.
pub trait RpcTransport {
    fn send(&mut self, message: &Value) -> Result<()>;

    /// Block until the next message arrives.
    fn receive(&mut self) -> Result<Value>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Child process speaking newline-delimited JSON on stdin/stdout.
pub struct StdioTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    closed: bool,
}

impl StdioTransport {
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        tracing::debug!(program, ?args, "starting browser server");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::Protocol("server stdout was not captured".into()))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            closed: false,
        })
    }
}

impl RpcTransport for StdioTransport {
    fn send(&mut self, message: &Value) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ToolError::Protocol("transport is closed".into()))?;
        let mut line =
            serde_json::to_string(message).map_err(|e| ToolError::json("RPC message", e))?;
        line.push('\n');
        stdin.write_all(line.as_bytes())?;
        stdin.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Value> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err(ToolError::Protocol("server closed its output".into()));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_str(trimmed).map_err(|e| ToolError::json("RPC message", e));
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // EOF on stdin asks the server to exit
        drop(self.stdin.take());

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while Instant::now() < deadline {
            if let Some(status) = self.child.try_wait()? {
                tracing::debug!(%status, "browser server exited");
                return Ok(());
            }
            thread::sleep(Duration::from_millis(50));
        }
        tracing::warn!("browser server did not exit; killing it");
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

// ─── Protocol types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub server_info: ServerInfo,
    #[serde(default)]
    pub capabilities: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Content {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        data: String,
        mime_type: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<Content>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Text parts joined by newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                Content::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolsPage {
    tools: Vec<ToolInfo>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

// ─── Session ──────────────────────────────────────────────────────────────

pub struct BrowserSession<T> {
    transport: T,
    next_id: u64,
    server: InitializeResult,
}

impl BrowserSession<StdioTransport> {
    /// Start `program args...` and open a session on it.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        Self::open(StdioTransport::spawn(program, args)?)
    }
}

impl<T: RpcTransport> BrowserSession<T> {
    /// Perform the `initialize` handshake on a fresh transport.
    pub fn open(transport: T) -> Result<Self> {
        let mut session = Self {
            transport,
            next_id: 1,
            server: InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                server_info: ServerInfo::default(),
                capabilities: Value::Null,
            },
        };

        let result = session.request(
            "initialize",
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "agent-tools", "version": env!("CARGO_PKG_VERSION")}
            }),
        )?;
        session.server =
            serde_json::from_value(result).map_err(|e| ToolError::json("initialize result", e))?;
        session.notify("notifications/initialized", None)?;

        tracing::info!(
            server = %session.server.server_info.name,
            version = %session.server.server_info.version,
            protocol = %session.server.protocol_version,
            "browser session open"
        );
        Ok(session)
    }

    pub fn server(&self) -> &InitializeResult {
        &self.server
    }

    pub fn list_tools(&mut self) -> Result<Vec<ToolInfo>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(c) => json!({"cursor": c}),
                None => json!({}),
            };
            let page: ToolsPage = serde_json::from_value(self.request("tools/list", params)?)
                .map_err(|e| ToolError::json("tools/list result", e))?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }
    }

    /// Call a server tool. A result flagged `isError` becomes
    /// [`ToolError::ToolReported`].
    pub fn call_tool(&mut self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        tracing::debug!(tool = name, "calling browser tool");
        let result = self.request("tools/call", json!({"name": name, "arguments": arguments}))?;
        let result: ToolCallResult =
            serde_json::from_value(result).map_err(|e| ToolError::json("tools/call result", e))?;
        if result.is_error {
            return Err(ToolError::ToolReported {
                tool: name.to_string(),
                message: result.text(),
            });
        }
        Ok(result)
    }

    pub fn navigate(&mut self, url: &str) -> Result<String> {
        let parsed = Url::parse(url)
            .map_err(|e| ToolError::InvalidArgument(format!("invalid URL `{url}`: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https" | "file" | "about") {
            return Err(ToolError::InvalidArgument(format!(
                "unsupported URL scheme `{}`",
                parsed.scheme()
            )));
        }
        Ok(self
            .call_tool("browser_navigate", json!({"url": parsed.as_str()}))?
            .text())
    }

    /// Accessibility snapshot of the current page; element refs in it are
    /// what `click` and `type_text` expect.
    pub fn snapshot(&mut self) -> Result<String> {
        Ok(self.call_tool("browser_snapshot", json!({}))?.text())
    }

    /// `element` is a human-readable description used for permission
    /// prompts, `reference` the exact ref from the snapshot.
    pub fn click(&mut self, element: &str, reference: &str) -> Result<String> {
        Ok(self
            .call_tool("browser_click", json!({"element": element, "ref": reference}))?
            .text())
    }

    pub fn type_text(
        &mut self,
        element: &str,
        reference: &str,
        text: &str,
        submit: bool,
    ) -> Result<String> {
        Ok(self
            .call_tool(
                "browser_type",
                json!({"element": element, "ref": reference, "text": text, "submit": submit}),
            )?
            .text())
    }

    /// Evaluate a JavaScript function expression in the page, e.g.
    /// `() => document.title`.
    pub fn evaluate(&mut self, function: &str) -> Result<String> {
        Ok(self
            .call_tool("browser_evaluate", json!({"function": function}))?
            .text())
    }

    pub fn wait_for_text(&mut self, text: &str, seconds: u32) -> Result<String> {
        Ok(self
            .call_tool("browser_wait_for", json!({"text": text, "time": seconds}))?
            .text())
    }

    /// Shut the server down. Closing the browser page first lets the server
    /// release its profile; a failure there does not prevent shutdown.
    pub fn close(mut self) -> Result<()> {
        if let Err(e) = self.call_tool("browser_close", json!({})) {
            tracing::debug!(error = %e, "browser_close failed");
        }
        self.transport.close()
    }

    fn notify(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        let mut message = json!({"jsonrpc": "2.0", "method": method});
        if let Some(params) = params {
            message["params"] = params;
        }
        self.transport.send(&message)
    }

    /// Send a request and wait for the response with the same id.
    fn request(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;
        self.transport.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))?;

        loop {
            let mut message = self.transport.receive()?;

            if let Some(incoming) = message.get("method").and_then(Value::as_str) {
                match message.get("id").cloned() {
                    // Server-to-client request
                    Some(req_id) => self.answer_server_request(req_id, incoming)?,
                    None => tracing::trace!(method = incoming, "skipping notification"),
                }
                continue;
            }

            if message.get("id").and_then(Value::as_u64) != Some(id) {
                tracing::debug!(expected = id, got = ?message.get("id"), "skipping unrelated response");
                continue;
            }

            if let Some(error) = message
                .get_mut("error")
                .map(Value::take)
                .filter(|e| !e.is_null())
            {
                let error: RpcError =
                    serde_json::from_value(error).map_err(|e| ToolError::json("RPC error", e))?;
                return Err(ToolError::Rpc {
                    code: error.code,
                    message: error.message,
                });
            }
            return message
                .get_mut("result")
                .map(Value::take)
                .ok_or_else(|| ToolError::Protocol(format!("response to `{method}` has no result")));
        }
    }

    fn answer_server_request(&mut self, id: Value, method: &str) -> Result<()> {
        let reply = if method == "ping" {
            json!({"jsonrpc": "2.0", "id": id, "result": {}})
        } else {
            tracing::debug!(method, "declining server request");
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": format!("method `{method}` not supported")}
            })
        };
        self.transport.send(&reply)
    }
}
