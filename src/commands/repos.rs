//! Registry commands: list, scan, delete, ignore

use super::{max_name_length, print_failure, print_success, resolve, NO_REPOS_MESSAGE};
use crate::core::config::PATH_DISPLAY_WIDTH;
use crate::core::{Orchestrator, RepositoryEntry};
use crate::utils::shorten_path;

fn print_entries(orchestrator: &Orchestrator, entries: &[RepositoryEntry]) {
    let width = max_name_length(entries);
    let directories = orchestrator.registry().working_directories();
    for entry in entries {
        let symbol = if entry.is_ignored { "⚪" } else { "🟢" };
        let path = directories
            .get(&entry.id)
            .map(|p| shorten_path(&p.to_string_lossy(), PATH_DISPLAY_WIDTH))
            .unwrap_or_default();
        let remote = if entry.owner.is_empty() {
            "no remote".to_string()
        } else {
            entry.full_name()
        };
        println!(
            "{symbol} {:width$}  {:<16}  {path:<pw$}  {remote}",
            entry.name,
            entry.id,
            pw = PATH_DISPLAY_WIDTH
        );
    }
}

/// Handles the list command
pub fn handle_list_command(orchestrator: &Orchestrator, all: bool) -> bool {
    let entries: Vec<RepositoryEntry> = orchestrator
        .list()
        .into_iter()
        .filter(|entry| all || !entry.is_ignored)
        .collect();

    if entries.is_empty() {
        println!("{NO_REPOS_MESSAGE}");
        return true;
    }
    print_entries(orchestrator, &entries);

    let ignored = orchestrator.list().iter().filter(|e| e.is_ignored).count();
    let repo_word = if entries.len() == 1 { "repository" } else { "repositories" };
    if !all && ignored > 0 {
        println!("\n{} {repo_word} • {ignored} ignored (use --all to show)", entries.len());
    } else {
        println!("\n{} {repo_word}", entries.len());
    }
    true
}

/// Handles the scan command: the scan itself already ran, report what it found
pub fn handle_scan_command(orchestrator: &Orchestrator, added: &[RepositoryEntry]) -> bool {
    if added.is_empty() {
        println!("{NO_REPOS_MESSAGE}");
        return true;
    }
    print_entries(orchestrator, added);
    let repo_word = if added.len() == 1 { "repository" } else { "repositories" };
    println!("\n🔍 Found {} {repo_word}", added.len());
    true
}

/// Handles the delete command
pub async fn handle_delete_command(orchestrator: &Orchestrator, key: &str) -> bool {
    let Some(entry) = resolve(orchestrator, key) else {
        return false;
    };
    let width = entry.name.len();
    match orchestrator.delete_repository(&entry.id).await {
        Ok(_) if orchestrator.settings().remove_files_on_delete => {
            print_success(&entry.name, width, "removed (working directory deleted)");
            true
        }
        Ok(_) => {
            print_success(&entry.name, width, "removed");
            true
        }
        Err(e) => {
            print_failure(&entry.name, width, e);
            false
        }
    }
}

/// Handles the ignore and unignore commands
pub fn handle_ignore_command(orchestrator: &Orchestrator, key: &str, flag: bool) -> bool {
    let Some(entry) = resolve(orchestrator, key) else {
        return false;
    };
    let width = entry.name.len();
    match orchestrator.set_ignored(&entry.id, flag) {
        Ok(_) => {
            print_success(&entry.name, width, if flag { "ignored" } else { "no longer ignored" });
            true
        }
        Err(e) => {
            print_failure(&entry.name, width, e);
            false
        }
    }
}
