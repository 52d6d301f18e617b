//! Typed views over tool stdout.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Result, ToolError};

/// Raw stdout classified once: nothing, a JSON value, or free text.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Json(Value),
    Text(String),
    Empty,
}

impl ToolOutput {
    pub fn parse(stdout: &str) -> Self {
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return ToolOutput::Empty;
        }
        match serde_json::from_str(trimmed) {
            Ok(value) => ToolOutput::Json(value),
            Err(_) => ToolOutput::Text(trimmed.to_string()),
        }
    }

    /// Deserialize the JSON payload; text or empty output is a protocol error.
    pub fn into_json<T: DeserializeOwned>(self, context: &str) -> Result<T> {
        match self {
            ToolOutput::Json(value) => {
                serde_json::from_value(value).map_err(|e| ToolError::json(context, e))
            }
            ToolOutput::Text(text) => Err(ToolError::Protocol(format!(
                "expected JSON from {context}, got: {}",
                truncate(&text, 200)
            ))),
            ToolOutput::Empty => Err(ToolError::Protocol(format!(
                "expected JSON from {context}, got no output"
            ))),
        }
    }

    /// Human-readable rendering of whatever came back.
    pub fn text(&self) -> String {
        match self {
            ToolOutput::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Empty => String::new(),
        }
    }
}

/// `{"success": bool, "data": T, "error": {...}}` wrapper used by tools that
/// report failures in-band.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<EnvelopeError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvelopeError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl<T> Envelope<T> {
    /// The payload on success; the reported message otherwise.
    pub fn into_result(self, tool: &str) -> Result<T> {
        if !self.success {
            return Err(self.failure(tool));
        }
        self.data.ok_or_else(|| ToolError::Protocol(format!("{tool} succeeded without data")))
    }

    /// Success check for commands whose payload is not needed.
    pub fn into_unit(self, tool: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(self.failure(tool))
        }
    }

    fn failure(self, tool: &str) -> ToolError {
        let message = match self.error {
            Some(EnvelopeError { message, code }) => match code {
                Some(code) if !message.is_empty() => format!("{message} ({code})"),
                Some(code) => code,
                None if message.is_empty() => "unknown error".to_string(),
                None => message,
            },
            None => "unknown error".to_string(),
        };
        ToolError::ToolReported {
            tool: tool.to_string(),
            message,
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
