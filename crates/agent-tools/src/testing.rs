//! Recording fake runner for wrapper tests.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::exec::{CommandRunner, Invocation, RawOutput};
use crate::{Result, ToolError};

#[derive(Default)]
pub struct ScriptedRunner {
    outputs: RefCell<VecDeque<RawOutput>>,
    calls: RefCell<Vec<Invocation>>,
    /// Contents of files passed via `--from-json`, captured before the
    /// caller deletes them
    payloads: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, output: RawOutput) {
        self.outputs.borrow_mut().push_back(output);
    }

    pub fn push_ok(&self, stdout: &str) {
        self.push(RawOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        });
    }

    pub fn push_json(&self, value: serde_json::Value) {
        self.push_ok(&value.to_string());
    }

    pub fn push_failure(&self, code: i32, stderr: &str) {
        self.push(RawOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        });
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Argument vector of the n-th call
    pub fn args(&self, n: usize) -> Vec<String> {
        self.calls.borrow()[n].args.clone()
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.borrow().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<RawOutput> {
        let mut args = invocation.args.iter();
        while let Some(arg) = args.next() {
            if arg == "--from-json" {
                if let Some(path) = args.next() {
                    self.payloads
                        .borrow_mut()
                        .push(std::fs::read_to_string(path)?);
                }
            }
        }
        self.calls.borrow_mut().push(invocation.clone());
        self.outputs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ToolError::Protocol(format!("no scripted output for `{invocation}`")))
    }
}
