//! Jira work items through the Atlassian CLI (`acli jira workitem ...`).
//!
//! Descriptions and comments are written in markdown and sent as ADF, the
//! structured document format Jira stores rich text in. Descriptions read
//! back from Jira are rendered to markdown again with the `adf-model` writer.

use std::io::Write;

use adf_model::{Document, WriterOptions, document_to_markdown};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::exec::{ArgList, CommandRunner, Invocation};
use crate::output::ToolOutput;
use crate::{Result, ToolError};

pub const DEFAULT_PROGRAM: &str = "acli";

// ─── Types ────────────────────────────────────────────────────────────────

/// A work item as returned by `view --json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub fields: IssueFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueFields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: Option<Named>,
    #[serde(default)]
    pub issuetype: Option<Named>,
    #[serde(default)]
    pub priority: Option<Named>,
    #[serde(default)]
    pub assignee: Option<User>,
    #[serde(default)]
    pub reporter: Option<User>,
    #[serde(default)]
    pub labels: Vec<String>,
    /// ADF document, or a plain string on older instances
    #[serde(default)]
    pub description: Option<Value>,
    /// Everything else requested via `--fields`
    #[serde(flatten)]
    pub other: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Named {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

impl User {
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email_address.as_deref())
            .or(self.account_id.as_deref())
            .unwrap_or("")
    }
}

impl Issue {
    pub fn summary(&self) -> &str {
        self.fields.summary.as_deref().unwrap_or("")
    }

    pub fn status(&self) -> Option<&str> {
        self.fields.status.as_ref().map(|s| s.name.as_str())
    }

    /// The description rendered as markdown, or `None` when the item has none.
    pub fn description_markdown(&self) -> Option<String> {
        match self.fields.description.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            value => Some(adf_value_to_markdown(value)),
        }
    }
}

/// One row of a search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueSummary {
    pub key: String,
    pub summary: String,
    pub status: Option<String>,
    pub issue_type: Option<String>,
    pub assignee: Option<String>,
}

impl From<Issue> for IssueSummary {
    fn from(issue: Issue) -> Self {
        let IssueFields {
            summary,
            status,
            issuetype,
            assignee,
            ..
        } = issue.fields;
        IssueSummary {
            key: issue.key,
            summary: summary.unwrap_or_default(),
            status: status.map(|s| s.name),
            issue_type: issuetype.map(|t| t.name),
            assignee: assignee.map(|u| u.label().to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub jql: String,
    pub limit: Option<u32>,
    pub fields: Vec<String>,
}

impl SearchQuery {
    pub fn new(jql: impl Into<String>) -> Self {
        Self {
            jql: jql.into(),
            ..Default::default()
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Fields for a new work item. The description is markdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewIssue {
    /// Falls back to the client's default project
    pub project: Option<String>,
    pub issue_type: String,
    pub summary: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    pub key: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// Payload of `create --from-json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePayload<'a> {
    project_key: &'a str,
    #[serde(rename = "type")]
    issue_type: &'a str,
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignee: Option<&'a str>,
    #[serde(rename = "label", skip_serializing_if = "no_labels")]
    labels: &'a [String],
    #[serde(rename = "parentIssueId", skip_serializing_if = "Option::is_none")]
    parent: Option<&'a str>,
}

fn no_labels(labels: &&[String]) -> bool {
    labels.is_empty()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    List(Vec<Issue>),
    Wrapped { issues: Vec<Issue> },
}

// ─── Client ───────────────────────────────────────────────────────────────

pub struct Jira<R> {
    runner: R,
    program: String,
    default_project: Option<String>,
}

impl<R: CommandRunner> Jira<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            program: DEFAULT_PROGRAM.to_string(),
            default_project: None,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_default_project(mut self, project: Option<String>) -> Self {
        self.default_project = project;
        self
    }

    pub fn view(&self, key: &str, fields: &[String]) -> Result<Issue> {
        validate_key(key)?;
        let mut args = self.args(&["view"]);
        args.arg(key).flag("--json", true);
        if !fields.is_empty() {
            args.opt("--fields", fields.join(","));
        }
        self.json(args, "jira workitem view")
    }

    pub fn search(&self, query: &SearchQuery) -> Result<Vec<IssueSummary>> {
        if query.jql.trim().is_empty() {
            return Err(ToolError::InvalidArgument("JQL query is empty".into()));
        }
        let mut args = self.args(&["search"]);
        args.opt("--jql", &query.jql)
            .opt_if("--limit", query.limit)
            .flag("--json", true);
        if !query.fields.is_empty() {
            args.opt("--fields", query.fields.join(","));
        }

        let response: SearchResponse = self.json(args, "jira workitem search")?;
        let issues = match response {
            SearchResponse::List(issues) | SearchResponse::Wrapped { issues } => issues,
        };
        tracing::debug!(count = issues.len(), "jira search finished");
        Ok(issues.into_iter().map(IssueSummary::from).collect())
    }

    /// Create a work item. The markdown description is converted to ADF and
    /// handed to the CLI in a temporary JSON file.
    pub fn create(&self, issue: &NewIssue) -> Result<CreatedIssue> {
        let project = issue
            .project
            .as_deref()
            .or(self.default_project.as_deref())
            .ok_or_else(|| ToolError::InvalidArgument("no project given and no default project configured".into()))?;
        if issue.summary.trim().is_empty() {
            return Err(ToolError::InvalidArgument("summary is empty".into()));
        }

        let payload = CreatePayload {
            project_key: project,
            issue_type: if issue.issue_type.is_empty() {
                "Task"
            } else {
                &issue.issue_type
            },
            summary: &issue.summary,
            description: issue.description.as_deref().map(md2adf::convert),
            assignee: issue.assignee.as_deref(),
            labels: &issue.labels,
            parent: issue.parent.as_deref(),
        };

        let mut file = tempfile::Builder::new()
            .prefix("agent-tools-workitem-")
            .suffix(".json")
            .tempfile()?;
        serde_json::to_writer(&mut file, &payload)
            .map_err(|e| ToolError::json("work item payload", e))?;
        file.flush()?;

        let mut args = self.args(&["create"]);
        args.opt("--from-json", file.path().display())
            .flag("--json", true);
        let out = self.runner.run_checked(&self.invocation(args))?;

        let created = match ToolOutput::parse(&out.stdout) {
            ToolOutput::Json(value) => serde_json::from_value(value)
                .map_err(|e| ToolError::json("jira workitem create", e))?,
            ToolOutput::Text(text) => CreatedIssue {
                key: find_issue_key(&text).ok_or_else(|| {
                    ToolError::Protocol(format!("no work item key in create output: {text}"))
                })?,
                id: None,
            },
            ToolOutput::Empty => {
                return Err(ToolError::Protocol("create printed nothing".into()));
            }
        };
        tracing::info!(key = %created.key, "created work item");
        Ok(created)
    }

    /// Add a comment; the markdown body is sent as ADF.
    pub fn comment(&self, key: &str, markdown: &str) -> Result<()> {
        validate_key(key)?;
        let body = md2adf::convert_to_json(markdown)
            .map_err(|e| ToolError::json("comment body", e))?;
        let mut args = self.args(&["comment", "create"]);
        args.opt("--key", key).opt("--body", body);
        self.runner.run_checked(&self.invocation(args))?;
        Ok(())
    }

    pub fn transition(&self, key: &str, status: &str) -> Result<()> {
        validate_key(key)?;
        let mut args = self.args(&["transition"]);
        args.opt("--key", key).opt("--status", status).flag("--yes", true);
        self.runner.run_checked(&self.invocation(args))?;
        Ok(())
    }

    /// `assignee` is an email, an account id, or `@me`.
    pub fn assign(&self, key: &str, assignee: &str) -> Result<()> {
        validate_key(key)?;
        let mut args = self.args(&["assign"]);
        args.opt("--key", key)
            .opt("--assignee", assignee)
            .flag("--yes", true);
        self.runner.run_checked(&self.invocation(args))?;
        Ok(())
    }

    pub fn edit_summary(&self, key: &str, summary: &str) -> Result<()> {
        validate_key(key)?;
        let mut args = self.args(&["edit"]);
        args.opt("--key", key)
            .opt("--summary", summary)
            .flag("--yes", true);
        self.runner.run_checked(&self.invocation(args))?;
        Ok(())
    }

    fn args(&self, words: &[&str]) -> ArgList {
        let mut args = ArgList::from_words(&["jira", "workitem"]);
        for word in words {
            args.arg(*word);
        }
        args
    }

    fn invocation(&self, args: ArgList) -> Invocation {
        Invocation::new(&self.program, args)
    }

    fn json<T: serde::de::DeserializeOwned>(&self, args: ArgList, context: &str) -> Result<T> {
        let out = self.runner.run_checked(&self.invocation(args))?;
        ToolOutput::parse(&out.stdout).into_json(context)
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────

fn is_issue_key(s: &str) -> bool {
    let Some((project, number)) = s.rsplit_once('-') else {
        return false;
    };
    let mut chars = project.chars();
    chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        && !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit())
}

fn validate_key(key: &str) -> Result<()> {
    if is_issue_key(key) {
        Ok(())
    } else {
        Err(ToolError::InvalidArgument(format!(
            "`{key}` is not a work item key (expected e.g. PROJ-123)"
        )))
    }
}

/// First `PROJ-123`-shaped token in free text.
fn find_issue_key(text: &str) -> Option<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .map(|token| token.trim_matches('-'))
        .find(|token| is_issue_key(token))
        .map(str::to_string)
}

/// Render an ADF value. Documents using node types outside the model
/// degrade to their plain text, one line per block.
fn adf_value_to_markdown(value: &Value) -> String {
    match serde_json::from_value::<Document>(value.clone()) {
        Ok(doc) => document_to_markdown(&doc, &WriterOptions::default()),
        Err(e) => {
            tracing::debug!(error = %e, "description is not plain ADF; extracting text");
            let mut out = String::new();
            collect_text(value, &mut out);
            let trimmed = out.trim_end().to_string();
            if trimmed.is_empty() {
                trimmed
            } else {
                trimmed + "\n"
            }
        }
    }
}

fn collect_text(value: &Value, out: &mut String) {
    let Some(obj) = value.as_object() else {
        return;
    };
    match obj.get("type").and_then(Value::as_str) {
        Some("text") => {
            if let Some(text) = obj.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
        Some("hardBreak") => out.push('\n'),
        kind => {
            if let Some(children) = obj.get("content").and_then(Value::as_array) {
                for child in children {
                    collect_text(child, out);
                }
            }
            let inline_container = children_are_inline(obj);
            if kind != Some("doc") && inline_container && !out.ends_with('\n') {
                out.push('\n');
            }
        }
    }
}

fn children_are_inline(obj: &serde_json::Map<String, Value>) -> bool {
    obj.get("content")
        .and_then(Value::as_array)
        .is_some_and(|children| {
            children.iter().any(|c| {
                c.get("type").and_then(Value::as_str) == Some("text")
                    || c.get("type").and_then(Value::as_str) == Some("hardBreak")
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use serde_json::json;

    fn jira(runner: &ScriptedRunner) -> Jira<&ScriptedRunner> {
        Jira::new(runner).with_default_project(Some("OPS".into()))
    }

    #[test]
    fn view_builds_arguments_and_parses_issue() {
        let runner = ScriptedRunner::new();
        runner.push_json(json!({
            "key": "OPS-7",
            "id": "10007",
            "fields": {
                "summary": "Disk full",
                "status": {"name": "In Progress"},
                "labels": ["infra"],
                "customfield_1": 3,
                "description": {
                    "type": "doc", "version": 1,
                    "content": [{"type": "paragraph", "content": [
                        {"type": "text", "text": "Clean "},
                        {"type": "text", "text": "/var", "marks": [{"type": "code"}]}
                    ]}]
                }
            }
        }));

        let issue = jira(&runner)
            .view("OPS-7", &["summary".into(), "status".into()])
            .unwrap();

        assert_eq!(
            runner.args(0),
            vec!["jira", "workitem", "view", "OPS-7", "--json", "--fields", "summary,status"]
        );
        assert_eq!(runner.calls()[0].program, "acli");
        assert_eq!(issue.summary(), "Disk full");
        assert_eq!(issue.status(), Some("In Progress"));
        assert_eq!(issue.fields.labels, vec!["infra"]);
        assert_eq!(issue.fields.other["customfield_1"], json!(3));
        assert_eq!(
            issue.description_markdown().as_deref(),
            Some("Clean `/var`\n")
        );
    }

    #[test]
    fn view_rejects_malformed_keys() {
        let runner = ScriptedRunner::new();
        for key in ["", "ops-1", "OPS", "OPS-", "OPS-1a", "-1"] {
            let err = jira(&runner).view(key, &[]).unwrap_err();
            assert!(matches!(err, ToolError::InvalidArgument(_)), "{key}");
        }
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn search_accepts_bare_and_wrapped_lists() {
        let runner = ScriptedRunner::new();
        runner.push_json(json!([
            {"key": "OPS-1", "fields": {"summary": "a", "assignee": {"displayName": "Kim"}}}
        ]));
        runner.push_json(json!({"issues": [
            {"key": "OPS-2", "fields": {"summary": "b", "issuetype": {"name": "Bug"}}}
        ]}));

        let client = jira(&runner);
        let first = client
            .search(&SearchQuery::new("project = OPS").limit(5))
            .unwrap();
        let second = client.search(&SearchQuery::new("status = Open")).unwrap();

        assert_eq!(
            runner.args(0),
            vec!["jira", "workitem", "search", "--jql", "project = OPS", "--limit", "5", "--json"]
        );
        assert_eq!(first[0].key, "OPS-1");
        assert_eq!(first[0].assignee.as_deref(), Some("Kim"));
        assert_eq!(second[0].issue_type.as_deref(), Some("Bug"));
    }

    #[test]
    fn search_rejects_empty_jql() {
        let runner = ScriptedRunner::new();
        assert!(jira(&runner).search(&SearchQuery::new("  ")).is_err());
    }

    #[test]
    fn create_sends_adf_description_in_temp_file() {
        let runner = ScriptedRunner::new();
        runner.push_json(json!({"key": "OPS-42", "id": "10042"}));

        let created = jira(&runner)
            .create(&NewIssue {
                summary: "Rotate keys".into(),
                description: Some("Use **vault**".into()),
                labels: vec!["security".into()],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(created.key, "OPS-42");

        let args = runner.args(0);
        assert_eq!(&args[..3], &["jira", "workitem", "create"]);
        assert_eq!(args[3], "--from-json");
        assert_eq!(args[5], "--json");
        // removed once the call returns
        assert!(!std::path::Path::new(&args[4]).exists());

        let payload: Value = serde_json::from_str(&runner.payloads()[0]).unwrap();
        assert_eq!(payload["projectKey"], "OPS");
        assert_eq!(payload["type"], "Task");
        assert_eq!(payload["summary"], "Rotate keys");
        assert_eq!(payload["label"], json!(["security"]));
        assert!(payload.get("assignee").is_none());
        assert_eq!(
            payload["description"],
            json!({
                "type": "doc", "version": 1,
                "content": [{"type": "paragraph", "content": [
                    {"type": "text", "text": "Use "},
                    {"type": "text", "text": "vault", "marks": [{"type": "strong"}]}
                ]}]
            })
        );
    }

    #[test]
    fn create_reads_key_from_text_output() {
        let runner = ScriptedRunner::new();
        runner.push_ok("✓ Work item OPS-43 created: https://x.atlassian.net/browse/OPS-43\n");
        let created = jira(&runner)
            .create(&NewIssue {
                project: Some("OPS".into()),
                issue_type: "Bug".into(),
                summary: "Crash".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(created.key, "OPS-43");
        let payload: Value = serde_json::from_str(&runner.payloads()[0]).unwrap();
        assert_eq!(payload["type"], "Bug");
        assert!(payload.get("description").is_none());
    }

    #[test]
    fn create_requires_project() {
        let runner = ScriptedRunner::new();
        let err = Jira::new(&runner)
            .create(&NewIssue {
                summary: "x".into(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument(_)));
    }

    #[test]
    fn comment_sends_adf_body() {
        let runner = ScriptedRunner::new();
        runner.push_ok("");
        jira(&runner).comment("OPS-1", "Done in *v2*").unwrap();

        let args = runner.args(0);
        assert_eq!(&args[..6], &["jira", "workitem", "comment", "create", "--key", "OPS-1"]);
        assert_eq!(args[6], "--body");
        let body: Document = serde_json::from_str(&args[7]).unwrap();
        assert_eq!(body, md2adf::convert("Done in *v2*"));
    }

    #[test]
    fn mutations_pass_yes() {
        let runner = ScriptedRunner::new();
        runner.push_ok("");
        runner.push_ok("");
        runner.push_ok("");
        let client = jira(&runner);
        client.transition("OPS-1", "Done").unwrap();
        client.assign("OPS-1", "@me").unwrap();
        client.edit_summary("OPS-1", "New title").unwrap();

        assert_eq!(
            runner.args(0),
            vec!["jira", "workitem", "transition", "--key", "OPS-1", "--status", "Done", "--yes"]
        );
        assert_eq!(
            runner.args(1),
            vec!["jira", "workitem", "assign", "--key", "OPS-1", "--assignee", "@me", "--yes"]
        );
        assert_eq!(
            runner.args(2),
            vec!["jira", "workitem", "edit", "--key", "OPS-1", "--summary", "New title", "--yes"]
        );
    }

    #[test]
    fn failed_transition_surfaces_stderr() {
        let runner = ScriptedRunner::new();
        runner.push_failure(1, "No transition named 'Shipped'");
        let err = jira(&runner).transition("OPS-1", "Shipped").unwrap_err();
        assert!(err.to_string().contains("No transition named"));
    }

    #[test]
    fn description_with_unknown_nodes_falls_back_to_text() {
        let issue: Issue = serde_json::from_value(json!({
            "key": "OPS-3",
            "fields": {"description": {
                "type": "doc", "version": 1,
                "content": [
                    {"type": "panel", "attrs": {"panelType": "info"}, "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "Heads up"}]}
                    ]},
                    {"type": "paragraph", "content": [
                        {"type": "mention", "attrs": {"id": "1"}},
                        {"type": "text", "text": "please review"}
                    ]}
                ]
            }}
        }))
        .unwrap();
        assert_eq!(
            issue.description_markdown().as_deref(),
            Some("Heads up\nplease review\n")
        );
    }

    #[test]
    fn description_absent_or_string() {
        let none: Issue = serde_json::from_value(json!({"key": "A-1", "fields": {}})).unwrap();
        assert_eq!(none.description_markdown(), None);
        let null: Issue =
            serde_json::from_value(json!({"key": "A-1", "fields": {"description": null}})).unwrap();
        assert_eq!(null.description_markdown(), None);
        let plain: Issue =
            serde_json::from_value(json!({"key": "A-1", "fields": {"description": "hi"}}))
                .unwrap();
        assert_eq!(plain.description_markdown().as_deref(), Some("hi"));
    }

    #[test]
    fn finds_keys_in_text() {
        assert_eq!(find_issue_key("Created OPS-12.").as_deref(), Some("OPS-12"));
        assert_eq!(find_issue_key("no key here"), None);
    }
}
