//! GitHub Actions runs and pull requests through `gh`.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::exec::{ArgList, CommandRunner, Invocation};
use crate::output::ToolOutput;
use crate::poll::{PollOptions, poll_until};
use crate::{Result, ToolError};

pub const DEFAULT_PROGRAM: &str = "gh";

/// Fields requested from `gh run list/view --json`
const RUN_FIELDS: &str =
    "databaseId,name,displayTitle,status,conclusion,headBranch,headSha,event,workflowName,createdAt,url";

const PR_FIELDS: &str = "number,title,state,url,headRefName,baseRefName,isDraft";

// ─── Types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Requested,
    Queued,
    Pending,
    Waiting,
    InProgress,
    Completed,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Requested => "requested",
            RunStatus::Queued => "queued",
            RunStatus::Pending => "pending",
            RunStatus::Waiting => "waiting",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub database_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_title: String,
    pub status: RunStatus,
    /// Empty until the run completes
    #[serde(default)]
    pub conclusion: String,
    #[serde(default)]
    pub head_branch: String,
    #[serde(default)]
    pub head_sha: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub workflow_name: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub url: String,
}

impl WorkflowRun {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn succeeded(&self) -> bool {
        self.is_completed() && self.conclusion == "success"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFilter {
    /// Workflow name or file, e.g. `ci.yml`
    pub workflow: Option<String>,
    pub branch: Option<String>,
    pub status: Option<String>,
    pub commit: Option<String>,
    pub event: Option<String>,
    pub user: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowDispatch {
    pub workflow: String,
    /// Branch or tag; the repository default branch when absent
    pub git_ref: Option<String>,
    pub inputs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub base: Option<String>,
    pub head: Option<String>,
    pub draft: bool,
    pub labels: Vec<String>,
    pub reviewers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub url: String,
    #[serde(default)]
    pub head_ref_name: String,
    #[serde(default)]
    pub base_ref_name: String,
    #[serde(default)]
    pub is_draft: bool,
}

// ─── Client ───────────────────────────────────────────────────────────────

pub struct GitHub<R> {
    runner: R,
    program: String,
    repo: Option<String>,
}

impl<R: CommandRunner> GitHub<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            program: DEFAULT_PROGRAM.to_string(),
            repo: None,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// `OWNER/REPO` passed as `--repo` to every call
    pub fn with_repo(mut self, repo: Option<String>) -> Self {
        self.repo = repo;
        self
    }

    pub fn list_runs(&self, filter: &RunFilter) -> Result<Vec<WorkflowRun>> {
        let mut args = ArgList::from_words(&["run", "list"]);
        args.opt("--json", RUN_FIELDS)
            .opt_if("--workflow", filter.workflow.as_deref())
            .opt_if("--branch", filter.branch.as_deref())
            .opt_if("--status", filter.status.as_deref())
            .opt_if("--commit", filter.commit.as_deref())
            .opt_if("--event", filter.event.as_deref())
            .opt_if("--user", filter.user.as_deref())
            .opt_if("--limit", filter.limit);
        self.json(args, "gh run list")
    }

    pub fn view_run(&self, id: u64) -> Result<WorkflowRun> {
        let mut args = ArgList::from_words(&["run", "view"]);
        args.arg(id.to_string()).opt("--json", RUN_FIELDS);
        self.json(args, "gh run view")
    }

    pub fn trigger_workflow(&self, dispatch: &WorkflowDispatch) -> Result<()> {
        if dispatch.workflow.trim().is_empty() {
            return Err(ToolError::InvalidArgument("workflow is empty".into()));
        }
        let mut args = ArgList::from_words(&["workflow", "run"]);
        args.arg(&dispatch.workflow)
            .opt_if("--ref", dispatch.git_ref.as_deref())
            .opt_each("-f", dispatch.inputs.iter().map(|(k, v)| format!("{k}={v}")));
        self.exec(args)?;
        tracing::info!(workflow = %dispatch.workflow, "workflow dispatched");
        Ok(())
    }

    pub fn rerun(&self, id: u64, failed_only: bool) -> Result<()> {
        let mut args = ArgList::from_words(&["run", "rerun"]);
        args.arg(id.to_string()).flag("--failed", failed_only);
        self.exec(args)?;
        Ok(())
    }

    /// Open a pull request and return its URL.
    pub fn create_pr(&self, pr: &NewPullRequest) -> Result<String> {
        if pr.title.trim().is_empty() {
            return Err(ToolError::InvalidArgument("pull request title is empty".into()));
        }
        let mut args = ArgList::from_words(&["pr", "create"]);
        args.opt("--title", &pr.title)
            .opt("--body", &pr.body)
            .opt_if("--base", pr.base.as_deref())
            .opt_if("--head", pr.head.as_deref())
            .flag("--draft", pr.draft)
            .opt_each("--label", &pr.labels)
            .opt_each("--reviewer", &pr.reviewers);
        let out = self.exec(args)?;

        // gh prints progress lines before the URL
        out.stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| line.starts_with("https://"))
            .map(str::to_string)
            .ok_or_else(|| ToolError::Protocol(format!("no PR URL in gh output: {}", out.stdout.trim())))
    }

    pub fn view_pr(&self, number: u64) -> Result<PullRequest> {
        let mut args = ArgList::from_words(&["pr", "view"]);
        args.arg(number.to_string()).opt("--json", PR_FIELDS);
        self.json(args, "gh pr view")
    }

    /// Poll a run until it completes. The returned run may have failed;
    /// check [`WorkflowRun::succeeded`].
    pub fn wait_for_run(&self, id: u64, options: &PollOptions) -> Result<WorkflowRun> {
        poll_until(&format!("workflow run {id}"), options, || {
            let run = self.view_run(id)?;
            tracing::info!(id, status = run.status.as_str(), "run status");
            Ok(run.is_completed().then_some(run))
        })
    }

    /// Dispatch a workflow, find the run it created, and wait for it.
    ///
    /// The new run is the first run of the workflow (on the dispatched ref)
    /// whose id was not listed before the dispatch. `options` applies to each
    /// of the two waits separately.
    pub fn trigger_and_wait(
        &self,
        dispatch: &WorkflowDispatch,
        options: &PollOptions,
    ) -> Result<WorkflowRun> {
        let filter = RunFilter {
            workflow: Some(dispatch.workflow.clone()),
            branch: dispatch.git_ref.clone(),
            event: Some("workflow_dispatch".into()),
            limit: Some(20),
            ..Default::default()
        };
        let known: HashSet<u64> = self
            .list_runs(&filter)?
            .into_iter()
            .map(|r| r.database_id)
            .collect();

        self.trigger_workflow(dispatch)?;

        let run = poll_until(
            &format!("new run of {}", dispatch.workflow),
            options,
            || {
                Ok(self
                    .list_runs(&filter)?
                    .into_iter()
                    .find(|r| !known.contains(&r.database_id)))
            },
        )?;
        tracing::info!(id = run.database_id, url = %run.url, "found dispatched run");

        if run.is_completed() {
            return Ok(run);
        }
        self.wait_for_run(run.database_id, options)
    }

    fn exec(&self, mut args: ArgList) -> Result<crate::exec::RawOutput> {
        args.opt_if("--repo", self.repo.as_deref());
        self.runner
            .run_checked(&Invocation::new(&self.program, args))
    }

    fn json<T: serde::de::DeserializeOwned>(&self, args: ArgList, context: &str) -> Result<T> {
        let out = self.exec(args)?;
        ToolOutput::parse(&out.stdout).into_json(context)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::ScriptedRunner;
    use serde_json::{Value, json};

    fn run_json(id: u64, status: &str, conclusion: &str) -> Value {
        json!({
            "databaseId": id,
            "name": "CI",
            "displayTitle": "Fix build",
            "status": status,
            "conclusion": conclusion,
            "headBranch": "main",
            "event": "workflow_dispatch",
            "workflowName": "CI",
            "createdAt": "2026-10-01T10:00:00Z",
            "url": format!("https://github.com/o/r/actions/runs/{id}")
        })
    }

    fn fast() -> PollOptions {
        PollOptions::new(Duration::ZERO, Duration::from_secs(5))
    }

    #[test]
    fn list_runs_builds_filter_flags() {
        let runner = ScriptedRunner::new();
        runner.push_json(json!([run_json(1, "completed", "success")]));

        let runs = GitHub::new(&runner)
            .with_repo(Some("o/r".into()))
            .list_runs(&RunFilter {
                workflow: Some("ci.yml".into()),
                branch: Some("main".into()),
                limit: Some(3),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(
            runner.args(0),
            vec![
                "run", "list", "--json", RUN_FIELDS, "--workflow", "ci.yml", "--branch", "main",
                "--limit", "3", "--repo", "o/r"
            ]
        );
        assert_eq!(runs.len(), 1);
        assert!(runs[0].succeeded());
    }

    #[test]
    fn unknown_status_does_not_fail_parsing() {
        let run: WorkflowRun =
            serde_json::from_value(run_json(5, "stale_or_new", "")).unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
        assert!(!run.is_completed());
    }

    #[test]
    fn trigger_passes_ref_and_inputs() {
        let runner = ScriptedRunner::new();
        runner.push_ok("");
        let mut inputs = BTreeMap::new();
        inputs.insert("target".to_string(), "staging".to_string());
        inputs.insert("dry_run".to_string(), "true".to_string());

        GitHub::new(&runner)
            .trigger_workflow(&WorkflowDispatch {
                workflow: "deploy.yml".into(),
                git_ref: Some("release".into()),
                inputs,
            })
            .unwrap();

        assert_eq!(
            runner.args(0),
            vec![
                "workflow", "run", "deploy.yml", "--ref", "release", "-f", "dry_run=true", "-f",
                "target=staging"
            ]
        );
    }

    #[test]
    fn rerun_failed_only() {
        let runner = ScriptedRunner::new();
        runner.push_ok("");
        GitHub::new(&runner).rerun(99, true).unwrap();
        assert_eq!(runner.args(0), vec!["run", "rerun", "99", "--failed"]);
    }

    #[test]
    fn create_pr_returns_url() {
        let runner = ScriptedRunner::new();
        runner.push_ok("Creating pull request for feat into main\n\nhttps://github.com/o/r/pull/12\n");

        let url = GitHub::new(&runner)
            .create_pr(&NewPullRequest {
                title: "Add feature".into(),
                body: "Body".into(),
                base: Some("main".into()),
                draft: true,
                reviewers: vec!["kim".into()],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(url, "https://github.com/o/r/pull/12");
        assert_eq!(
            runner.args(0),
            vec![
                "pr", "create", "--title", "Add feature", "--body", "Body", "--base", "main",
                "--draft", "--reviewer", "kim"
            ]
        );
    }

    #[test]
    fn view_pr_parses() {
        let runner = ScriptedRunner::new();
        runner.push_json(json!({
            "number": 12, "title": "Add feature", "state": "OPEN",
            "url": "https://github.com/o/r/pull/12",
            "headRefName": "feat", "baseRefName": "main", "isDraft": true
        }));
        let pr = GitHub::new(&runner).view_pr(12).unwrap();
        assert_eq!(pr.head_ref_name, "feat");
        assert!(pr.is_draft);
        assert_eq!(runner.args(0), vec!["pr", "view", "12", "--json", PR_FIELDS]);
    }

    #[test]
    fn wait_for_run_polls_until_completed() {
        let runner = ScriptedRunner::new();
        runner.push_json(run_json(7, "queued", ""));
        runner.push_json(run_json(7, "in_progress", ""));
        runner.push_json(run_json(7, "completed", "failure"));

        let run = GitHub::new(&runner).wait_for_run(7, &fast()).unwrap();
        assert!(run.is_completed());
        assert!(!run.succeeded());
        assert_eq!(runner.calls().len(), 3);
    }

    #[test]
    fn wait_for_run_times_out() {
        let runner = ScriptedRunner::new();
        runner.push_json(run_json(7, "in_progress", ""));
        let opts = PollOptions::new(Duration::ZERO, Duration::ZERO);
        let err = GitHub::new(&runner).wait_for_run(7, &opts).unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }

    #[test]
    fn trigger_and_wait_follows_the_new_run() {
        let runner = ScriptedRunner::new();
        // existing runs
        runner.push_json(json!([run_json(1, "completed", "success")]));
        // dispatch
        runner.push_ok("");
        // not visible yet, then visible
        runner.push_json(json!([run_json(1, "completed", "success")]));
        runner.push_json(json!([run_json(2, "queued", ""), run_json(1, "completed", "success")]));
        // wait
        runner.push_json(run_json(2, "completed", "success"));

        let run = GitHub::new(&runner)
            .trigger_and_wait(
                &WorkflowDispatch {
                    workflow: "ci.yml".into(),
                    ..Default::default()
                },
                &fast(),
            )
            .unwrap();

        assert_eq!(run.database_id, 2);
        assert!(run.succeeded());
        assert_eq!(&runner.args(1)[..3], &["workflow", "run", "ci.yml"]);
        assert_eq!(&runner.args(4)[..3], &["run", "view", "2"]);
    }

    #[test]
    fn gh_failure_is_command_failed() {
        let runner = ScriptedRunner::new();
        runner.push_failure(4, "HTTP 404: Not Found");
        let err = GitHub::new(&runner).view_run(1).unwrap_err();
        assert!(matches!(err, ToolError::CommandFailed { code: 4, .. }));
    }
}
