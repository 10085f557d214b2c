//! GitHub commands: workflow runs, pull requests, issues

use super::{print_failure, print_success, resolve};
use crate::core::{create_spinner, Orchestrator};
use crate::github::{CreatedItem, IssueRequest, PullRequestRequest};

pub struct PullRequestArgs {
    pub title: String,
    /// `None` uses the current branch
    pub head: Option<String>,
    pub base: String,
    pub body: Option<String>,
    pub draft: bool,
}

fn print_created(name: &str, kind: &str, item: &CreatedItem) {
    print_success(name, name.len(), format!("{kind} #{} {}", item.number, item.title));
    println!("   └─ {}", item.html_url);
}

/// Handles the runs command
pub async fn handle_runs_command(orchestrator: &Orchestrator, key: &str) -> bool {
    let Some(entry) = resolve(orchestrator, key) else {
        return false;
    };
    let spinner = create_spinner(format!("Fetching workflow runs for {}", entry.full_name()));
    let result = orchestrator.workflow_runs(&entry.id).await;
    spinner.finish_and_clear();

    match result {
        Ok(runs) if runs.is_empty() => {
            print_success(&entry.name, entry.name.len(), "no workflow runs");
            true
        }
        Ok(runs) => {
            for run in runs {
                let name = run.name.as_deref().unwrap_or("workflow");
                let branch = run.head_branch.as_deref().unwrap_or("-");
                let state = run
                    .conclusion
                    .as_deref()
                    .or(run.status.as_deref())
                    .unwrap_or("unknown");
                let when = run
                    .created_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!("{} {name:<30} {branch:<20} {state:<12} {when}", run.symbol());
            }
            true
        }
        Err(e) => {
            print_failure(&entry.name, entry.name.len(), e);
            false
        }
    }
}

/// Handles the pr command
pub async fn handle_pr_command(
    orchestrator: &Orchestrator,
    key: &str,
    args: PullRequestArgs,
) -> bool {
    let Some(entry) = resolve(orchestrator, key) else {
        return false;
    };

    let head = match args.head {
        Some(head) => head,
        None => match orchestrator.get_status(&entry.id).await {
            Ok(summary) => match summary.branch {
                Some(branch) => branch,
                None => {
                    print_failure(&entry.name, entry.name.len(), "detached HEAD, pass --head");
                    return false;
                }
            },
            Err(e) => {
                print_failure(&entry.name, entry.name.len(), e);
                return false;
            }
        },
    };

    let request = PullRequestRequest {
        title: args.title,
        head,
        base: args.base,
        body: args.body,
        draft: args.draft,
    };
    match orchestrator.create_pull_request(&entry.id, &request).await {
        Ok(item) => {
            print_created(&entry.name, "pull request", &item);
            true
        }
        Err(e) => {
            print_failure(&entry.name, entry.name.len(), e);
            false
        }
    }
}

/// Handles the issue command
pub async fn handle_issue_command(
    orchestrator: &Orchestrator,
    key: &str,
    title: String,
    body: Option<String>,
    labels: Vec<String>,
) -> bool {
    let Some(entry) = resolve(orchestrator, key) else {
        return false;
    };
    let request = IssueRequest { title, body, labels };
    match orchestrator.create_issue(&entry.id, &request).await {
        Ok(item) => {
            print_created(&entry.name, "issue", &item);
            true
        }
        Err(e) => {
            print_failure(&entry.name, entry.name.len(), e);
            false
        }
    }
}
