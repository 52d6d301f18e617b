use agent_tools::github::WorkflowRun;
use agent_tools::jira::IssueSummary;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

#[derive(Tabled)]
struct RunRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "STATUS")]
    status: &'static str,
    #[tabled(rename = "CONCLUSION")]
    conclusion: String,
    #[tabled(rename = "WORKFLOW")]
    workflow: String,
    #[tabled(rename = "BRANCH")]
    branch: String,
    #[tabled(rename = "TITLE")]
    title: String,
}

#[derive(Tabled)]
struct IssueRow<'a> {
    #[tabled(rename = "KEY")]
    key: &'a str,
    #[tabled(rename = "TYPE")]
    issue_type: &'a str,
    #[tabled(rename = "STATUS")]
    status: &'a str,
    #[tabled(rename = "ASSIGNEE")]
    assignee: &'a str,
    #[tabled(rename = "SUMMARY")]
    summary: &'a str,
}

pub fn runs_table(runs: &[WorkflowRun]) -> String {
    let rows = runs.iter().map(|run| RunRow {
        id: run.database_id,
        status: run.status.as_str(),
        conclusion: run.conclusion.clone(),
        workflow: run.workflow_name.clone(),
        branch: run.head_branch.clone(),
        title: run.display_title.clone(),
    });
    Table::new(rows).with(Style::blank()).to_string()
}

pub fn issues_table(issues: &[IssueSummary]) -> String {
    let rows = issues.iter().map(|issue| IssueRow {
        key: &issue.key,
        issue_type: issue.issue_type.as_deref().unwrap_or(""),
        status: issue.status.as_deref().unwrap_or(""),
        assignee: issue.assignee.as_deref().unwrap_or(""),
        summary: &issue.summary,
    });
    Table::new(rows).with(Style::blank()).to_string()
}
