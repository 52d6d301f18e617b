use std::collections::BTreeMap;
use std::time::Duration;

use agent_tools::ProcessRunner;
use agent_tools::github::{GitHub, RunFilter, WorkflowDispatch, WorkflowRun};
use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;
use crate::output::{print_json, runs_table};

#[derive(Subcommand)]
pub enum GhSubcommand {
    /// List recent workflow runs
    Runs {
        /// Workflow name or file
        #[arg(long, short)]
        workflow: Option<String>,
        #[arg(long, short)]
        branch: Option<String>,
        /// queued, in_progress, completed, success, failure, ...
        #[arg(long, short)]
        status: Option<String>,
        #[arg(long, short = 'L', default_value_t = 10)]
        limit: u32,
    },
    /// Wait for a run to complete; fails when the run did not succeed
    Wait {
        run_id: u64,
        /// Seconds between checks (default: github.poll_interval_secs)
        #[arg(long)]
        interval: Option<u64>,
        /// Seconds before giving up (default: github.timeout_secs)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Dispatch a workflow
    Trigger {
        /// Workflow name or file
        workflow: String,
        /// Branch or tag to run on
        #[arg(long = "ref")]
        git_ref: Option<String>,
        /// Workflow input as KEY=VALUE (repeatable)
        #[arg(short = 'f', long = "field", value_parser = parse_key_val)]
        fields: Vec<(String, String)>,
        /// Wait for the dispatched run to complete
        #[arg(long)]
        wait: bool,
    },
}

pub fn run(config: &Config, subcmd: GhSubcommand, json: bool) -> Result<()> {
    let gh = GitHub::new(ProcessRunner::new())
        .with_program(config.tools.gh())
        .with_repo(config.github.repo.clone());

    match subcmd {
        GhSubcommand::Runs {
            workflow,
            branch,
            status,
            limit,
        } => {
            let runs = gh.list_runs(&RunFilter {
                workflow,
                branch,
                status,
                limit: Some(limit),
                ..Default::default()
            })?;
            if json {
                return print_json(&runs);
            }
            if runs.is_empty() {
                println!("No runs found.");
            } else {
                println!("{}", runs_table(&runs));
            }
            Ok(())
        }
        GhSubcommand::Wait {
            run_id,
            interval,
            timeout,
        } => {
            let mut poll = config.github.poll_options();
            if let Some(secs) = interval {
                poll.interval = Duration::from_secs(secs);
            }
            if let Some(secs) = timeout {
                poll.timeout = Duration::from_secs(secs);
            }
            let run = gh.wait_for_run(run_id, &poll)?;
            report(&run, json)
        }
        GhSubcommand::Trigger {
            workflow,
            git_ref,
            fields,
            wait,
        } => {
            let dispatch = WorkflowDispatch {
                workflow,
                git_ref,
                inputs: fields.into_iter().collect::<BTreeMap<_, _>>(),
            };
            if wait {
                let run = gh.trigger_and_wait(&dispatch, &config.github.poll_options())?;
                return report(&run, json);
            }
            gh.trigger_workflow(&dispatch)?;
            if !json {
                println!("Dispatched {}", dispatch.workflow);
            }
            Ok(())
        }
    }
}

fn report(run: &WorkflowRun, json: bool) -> Result<()> {
    if json {
        print_json(run)?;
    } else {
        println!("{} {} {}", run.database_id, run.conclusion, run.url);
    }
    if !run.succeeded() {
        anyhow::bail!("run {} concluded with `{}`", run.database_id, run.conclusion);
    }
    Ok(())
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_inputs() {
        assert_eq!(
            parse_key_val("env=prod=eu").unwrap(),
            ("env".to_string(), "prod=eu".to_string())
        );
        assert_eq!(parse_key_val("flag=").unwrap(), ("flag".to_string(), String::new()));
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }
}
