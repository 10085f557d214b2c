//! CLI command handlers
//!
//! Every invocation scans the storage roots first, then resolves repositories
//! by id, name or `owner/name` and drives the [`Orchestrator`].

pub mod cli;
mod changes;
mod exec;
mod github;
mod repos;
mod sync;

pub use cli::{Cli, Command, ConcurrencyArgs, Selection};

use anyhow::{Context, Result};
use std::fmt::Display;
use tokio_util::sync::CancellationToken;

use crate::core::{
    create_spinner, get_batch_concurrency, set_terminal_title, set_terminal_title_and_flush,
    Collaborators, Orchestrator, RepositoryEntry, Settings,
};
use crate::error::{OperationOutcome, RepoResult};
use crate::utils::clean_error_message;

const SCANNING_MESSAGE: &str = "🔍 Scanning for git repositories...";
pub(crate) const NO_REPOS_MESSAGE: &str = "No git repositories found.";

/// Builds the orchestrator, scans, and runs the selected command.
/// Returns `false` when any repository operation failed.
pub async fn run(cli: Cli, mut settings: Settings, cancel: CancellationToken) -> Result<bool> {
    if !cli.roots.is_empty() {
        settings.roots = cli.roots.clone();
    }
    let collaborators =
        Collaborators::system(&settings).context("failed to initialize collaborators")?;
    let orchestrator = Orchestrator::new(settings, collaborators);

    let title = format!("repodeck {}", command_name(&cli.command));
    set_terminal_title(&format!("🚀 {title}"));

    let result: Result<bool> = async {
        let spinner = create_spinner(SCANNING_MESSAGE);
        let scanned = orchestrator.discover().await;
        spinner.finish_and_clear();
        let added = scanned.context("repository scan failed")?;
        Ok(dispatch(cli.command, &orchestrator, added, cancel).await)
    }
    .await;

    set_terminal_title_and_flush(&format!("✅ {title}"));
    result
}

async fn dispatch(
    command: Command,
    orchestrator: &Orchestrator,
    added: Vec<RepositoryEntry>,
    cancel: CancellationToken,
) -> bool {
    use changes::StageAction;
    use sync::SyncDirection;

    match command {
        Command::List { all } => repos::handle_list_command(orchestrator, all),
        Command::Scan => repos::handle_scan_command(orchestrator, &added),
        Command::Status {
            selection,
            concurrency,
        } => changes::handle_status_command(orchestrator, &selection, &concurrency).await,
        Command::Stage { repo, file } => {
            changes::handle_stage_command(orchestrator, &repo, &file, StageAction::Stage).await
        }
        Command::Unstage { repo, file } => {
            changes::handle_stage_command(orchestrator, &repo, &file, StageAction::Unstage).await
        }
        Command::Toggle { repo, file } => {
            changes::handle_stage_command(orchestrator, &repo, &file, StageAction::Toggle).await
        }
        Command::Commit { repo, message } => {
            changes::handle_commit_command(orchestrator, &repo, &message).await
        }
        Command::Checkout { repo, branch } => {
            changes::handle_checkout_command(orchestrator, &repo, &branch).await
        }
        Command::Branches { repo } => changes::handle_branches_command(orchestrator, &repo).await,
        Command::Diff { repo, file, staged } => {
            changes::handle_diff_command(orchestrator, &repo, &file, staged).await
        }
        Command::Push {
            selection,
            concurrency,
        } => {
            sync::handle_sync_command(orchestrator, SyncDirection::Push, &selection, &concurrency)
                .await
        }
        Command::Pull {
            selection,
            concurrency,
        } => {
            sync::handle_sync_command(orchestrator, SyncDirection::Pull, &selection, &concurrency)
                .await
        }
        Command::Delete { repo } => repos::handle_delete_command(orchestrator, &repo).await,
        Command::Ignore { repo } => repos::handle_ignore_command(orchestrator, &repo, true),
        Command::Unignore { repo } => repos::handle_ignore_command(orchestrator, &repo, false),
        Command::Exec {
            commands,
            selection,
            concurrency,
        } => {
            exec::handle_exec_command(orchestrator, commands, &selection, &concurrency, cancel)
                .await
        }
        Command::Runs { repo } => github::handle_runs_command(orchestrator, &repo).await,
        Command::Pr {
            repo,
            title,
            head,
            base,
            body,
            draft,
        } => {
            let request = github::PullRequestArgs {
                title,
                head,
                base,
                body,
                draft,
            };
            github::handle_pr_command(orchestrator, &repo, request).await
        }
        Command::Issue {
            repo,
            title,
            body,
            labels,
        } => github::handle_issue_command(orchestrator, &repo, title, body, labels).await,
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::List { .. } => "list",
        Command::Scan => "scan",
        Command::Status { .. } => "status",
        Command::Stage { .. } => "stage",
        Command::Unstage { .. } => "unstage",
        Command::Toggle { .. } => "toggle",
        Command::Commit { .. } => "commit",
        Command::Checkout { .. } => "checkout",
        Command::Branches { .. } => "branches",
        Command::Push { .. } => "push",
        Command::Pull { .. } => "pull",
        Command::Diff { .. } => "diff",
        Command::Delete { .. } => "delete",
        Command::Ignore { .. } => "ignore",
        Command::Unignore { .. } => "unignore",
        Command::Exec { .. } => "exec",
        Command::Runs { .. } => "runs",
        Command::Pr { .. } => "pr",
        Command::Issue { .. } => "issue",
    }
}

/// Resolves the selection. Unknown keys are reported and skipped.
/// Returns the entries and whether every key resolved.
pub(crate) fn select(
    orchestrator: &Orchestrator,
    selection: &Selection,
) -> (Vec<RepositoryEntry>, bool) {
    if selection.repos.is_empty() {
        let entries = orchestrator
            .list()
            .into_iter()
            .filter(|entry| selection.include_ignored || !entry.is_ignored)
            .collect();
        return (entries, true);
    }

    let mut entries: Vec<RepositoryEntry> = Vec::with_capacity(selection.repos.len());
    let mut all_found = true;
    for key in &selection.repos {
        match orchestrator.find(key) {
            Ok(entry) if !entries.iter().any(|e| e.id == entry.id) => entries.push(entry),
            Ok(_) => {}
            Err(e) => {
                print_failure(key, key.len(), &e);
                all_found = false;
            }
        }
    }
    (entries, all_found)
}

/// Resolves a single repository key, printing the failure if it is unknown
pub(crate) fn resolve(orchestrator: &Orchestrator, key: &str) -> Option<RepositoryEntry> {
    match orchestrator.find(key) {
        Ok(entry) => Some(entry),
        Err(e) => {
            print_failure(key, key.len(), &e);
            None
        }
    }
}

pub(crate) fn concurrency_for(orchestrator: &Orchestrator, args: &ConcurrencyArgs) -> usize {
    get_batch_concurrency(args.jobs, orchestrator.settings().jobs, args.sequential)
}

pub(crate) fn max_name_length(entries: &[RepositoryEntry]) -> usize {
    entries.iter().map(|e| e.name.len()).max().unwrap_or(0)
}

pub(crate) fn print_success(name: &str, width: usize, message: impl Display) {
    println!("🟢 {name:width$}  {message}");
}

pub(crate) fn print_failure(name: &str, width: usize, error: impl Display) {
    println!("🔴 {name:width$}  {}", clean_error_message(&error.to_string()));
}

/// Prints one result line; returns whether it succeeded
pub(crate) fn report<T: Display>(name: &str, width: usize, result: RepoResult<T>) -> bool {
    let outcome = OperationOutcome::from(result);
    if outcome.is_success {
        print_success(name, width, &outcome.message);
    } else {
        print_failure(name, width, &outcome.message);
    }
    outcome.is_success
}
