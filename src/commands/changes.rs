//! Working tree commands: status, stage/unstage/toggle, commit, checkout,
//! branches, diff

use futures::stream::{self, StreamExt};

use super::{
    concurrency_for, max_name_length, print_failure, print_success, report, resolve, select,
};
use super::{ConcurrencyArgs, Selection, NO_REPOS_MESSAGE};
use crate::core::Orchestrator;
use crate::git::RepositorySummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageAction {
    Stage,
    Unstage,
    Toggle,
}

/// `main ↑2 ↓1 • 3 changed`
fn branch_line(summary: &RepositorySummary) -> String {
    let mut line = summary
        .branch
        .clone()
        .unwrap_or_else(|| "detached HEAD".to_string());
    if summary.upstream.is_none() && summary.branch.is_some() {
        line.push_str(" (no tracking)");
    }
    if summary.ahead > 0 {
        line.push_str(&format!(" ↑{}", summary.ahead));
    }
    if summary.behind > 0 {
        line.push_str(&format!(" ↓{}", summary.behind));
    }
    if summary.is_clean() {
        line.push_str(" • clean");
    } else {
        line.push_str(&format!(" • {} changed", summary.elements.len()));
    }
    line
}

fn print_elements(summary: &RepositorySummary) {
    let count = summary.elements.len();
    for (i, element) in summary.elements.iter().enumerate() {
        let tree_char = if i == count - 1 { "└─" } else { "├─" };
        let area = if element.is_staged { "staged" } else { "" };
        let path = match &element.original_path {
            Some(from) => format!("{from} → {}", element.path),
            None => element.path.clone(),
        };
        println!(
            "   {tree_char} {} {:<10} {:<6} {path}",
            element.state.symbol(),
            element.state.text(),
            area
        );
    }
}

/// Handles the status command
pub async fn handle_status_command(
    orchestrator: &Orchestrator,
    selection: &Selection,
    concurrency: &ConcurrencyArgs,
) -> bool {
    let (entries, mut all_ok) = select(orchestrator, selection);
    if entries.is_empty() {
        println!("{NO_REPOS_MESSAGE}");
        return all_ok;
    }
    let width = max_name_length(&entries);
    let show_files = !selection.repos.is_empty();

    // Compute concurrently, print in list order
    let results: Vec<_> = stream::iter(entries.iter())
        .map(|entry| async move { (entry, orchestrator.get_status(&entry.id).await) })
        .buffered(concurrency_for(orchestrator, concurrency))
        .collect()
        .await;

    for (entry, result) in results {
        match result {
            Ok(summary) => {
                let symbol = if summary.is_clean() { "🟢" } else { "🟡" };
                println!("{symbol} {:width$}  {}", entry.name, branch_line(&summary));
                if show_files {
                    print_elements(&summary);
                }
            }
            Err(e) => {
                print_failure(&entry.name, width, e);
                all_ok = false;
            }
        }
    }
    all_ok
}

/// Handles the stage, unstage and toggle commands
pub async fn handle_stage_command(
    orchestrator: &Orchestrator,
    key: &str,
    file: &str,
    action: StageAction,
) -> bool {
    let Some(entry) = resolve(orchestrator, key) else {
        return false;
    };
    let result = match action {
        StageAction::Stage => orchestrator.stage_file(&entry.id, file).await,
        StageAction::Unstage => orchestrator.unstage_file(&entry.id, file).await,
        StageAction::Toggle => orchestrator.toggle_stage(&entry.id, file).await,
    };

    let width = entry.name.len();
    match result {
        Ok(summary) => {
            let staged = summary.elements_for(file).any(|e| e.is_staged);
            let message = if staged {
                format!("{file} staged")
            } else {
                format!("{file} unstaged")
            };
            print_success(&entry.name, width, message);
            print_elements(&summary);
            true
        }
        Err(e) => {
            print_failure(&entry.name, width, e);
            false
        }
    }
}

/// Handles the commit command
pub async fn handle_commit_command(orchestrator: &Orchestrator, key: &str, message: &str) -> bool {
    let Some(entry) = resolve(orchestrator, key) else {
        return false;
    };
    let result = orchestrator
        .commit(&entry.id, message)
        .await
        .map(|commit| format!("committed {}", &commit[..commit.len().min(8)]));
    report(&entry.name, entry.name.len(), result)
}

/// Handles the checkout command
pub async fn handle_checkout_command(orchestrator: &Orchestrator, key: &str, branch: &str) -> bool {
    let Some(entry) = resolve(orchestrator, key) else {
        return false;
    };
    let result = orchestrator
        .checkout(&entry.id, branch)
        .await
        .map(|summary| branch_line(&summary));
    report(&entry.name, entry.name.len(), result)
}

/// Handles the branches command
pub async fn handle_branches_command(orchestrator: &Orchestrator, key: &str) -> bool {
    let Some(entry) = resolve(orchestrator, key) else {
        return false;
    };
    match orchestrator.branches(&entry.id).await {
        Ok(branches) => {
            for branch in branches {
                let marker = if branch.is_current { "*" } else { " " };
                let kind = if branch.is_remote { "remote" } else { "local" };
                println!("{marker} {:<40} {kind}", branch.name);
            }
            true
        }
        Err(e) => {
            print_failure(&entry.name, entry.name.len(), e);
            false
        }
    }
}

/// Handles the diff command
pub async fn handle_diff_command(
    orchestrator: &Orchestrator,
    key: &str,
    file: &str,
    staged: bool,
) -> bool {
    let Some(entry) = resolve(orchestrator, key) else {
        return false;
    };
    match orchestrator.diff(&entry.id, file, staged).await {
        Ok(diff) if diff.is_empty() => {
            print_success(&entry.name, entry.name.len(), "no differences");
            true
        }
        Ok(diff) => {
            println!("{diff}");
            true
        }
        Err(e) => {
            print_failure(&entry.name, entry.name.len(), e);
            false
        }
    }
}
