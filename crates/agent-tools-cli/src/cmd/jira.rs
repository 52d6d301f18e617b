use std::path::PathBuf;

use agent_tools::ProcessRunner;
use agent_tools::jira::{Jira, NewIssue, SearchQuery};
use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::Config;
use crate::output::{issues_table, print_json};

#[derive(Subcommand)]
pub enum JiraSubcommand {
    /// Show a work item with its description as markdown
    View {
        /// Work item key, e.g. OPS-123
        key: String,
        /// Fields to fetch (comma separated)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// Search work items with JQL
    Search {
        jql: String,
        /// Maximum number of results
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Create a work item; the description is markdown
    Create {
        summary: String,
        /// Project key (default: jira.default_project from the config)
        #[arg(long)]
        project: Option<String>,
        /// Work item type
        #[arg(long = "type", default_value = "Task")]
        issue_type: String,
        /// Markdown description
        #[arg(long, conflicts_with = "description_file")]
        description: Option<String>,
        /// Read the markdown description from a file
        #[arg(long)]
        description_file: Option<PathBuf>,
        /// Assignee email, account id, or @me
        #[arg(long)]
        assignee: Option<String>,
        /// Labels (comma separated)
        #[arg(long, value_delimiter = ',')]
        labels: Vec<String>,
        /// Parent work item key
        #[arg(long)]
        parent: Option<String>,
    },
    /// Add a markdown comment
    Comment {
        key: String,
        /// Comment body (markdown)
        #[arg(required_unless_present = "file")]
        body: Option<String>,
        /// Read the comment body from a file
        #[arg(long, conflicts_with = "body")]
        file: Option<PathBuf>,
    },
    /// Move a work item to another status
    Transition { key: String, status: String },
}

pub fn run(config: &Config, subcmd: JiraSubcommand, json: bool) -> Result<()> {
    let jira = Jira::new(ProcessRunner::new())
        .with_program(config.tools.acli())
        .with_default_project(config.jira.default_project.clone());

    match subcmd {
        JiraSubcommand::View { key, fields } => {
            let issue = jira.view(&key, &fields)?;
            if json {
                return print_json(&issue);
            }
            println!("{}  {}", issue.key, issue.summary());
            if let Some(status) = issue.status() {
                println!("Status: {status}");
            }
            if let Some(assignee) = &issue.fields.assignee {
                println!("Assignee: {}", assignee.label());
            }
            if let Some(description) = issue.description_markdown() {
                println!();
                print!("{description}");
            }
            Ok(())
        }
        JiraSubcommand::Search { jql, limit } => {
            let issues = jira.search(&SearchQuery::new(jql).limit(limit))?;
            if json {
                return print_json(&issues);
            }
            if issues.is_empty() {
                println!("No work items found.");
            } else {
                println!("{}", issues_table(&issues));
            }
            Ok(())
        }
        JiraSubcommand::Create {
            summary,
            project,
            issue_type,
            description,
            description_file,
            assignee,
            labels,
            parent,
        } => {
            let description = match description_file {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read: {}", path.display()))?,
                ),
                None => description,
            };
            let created = jira.create(&NewIssue {
                project,
                issue_type,
                summary,
                description,
                assignee,
                labels,
                parent,
            })?;
            if json {
                print_json(&created)
            } else {
                println!("{}", created.key);
                Ok(())
            }
        }
        JiraSubcommand::Comment { key, body, file } => {
            let body = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read: {}", path.display()))?,
                None => body.unwrap_or_default(),
            };
            jira.comment(&key, &body)?;
            if !json {
                println!("Commented on {key}");
            }
            Ok(())
        }
        JiraSubcommand::Transition { key, status } => {
            jira.transition(&key, &status)?;
            if !json {
                println!("{key} → {status}");
            }
            Ok(())
        }
    }
}
