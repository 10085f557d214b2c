//! Git operations backed by the `git` binary

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

use super::backend::{BranchInfo, GitBackend, RemoteOptions, Signature};
use super::status::{parse_porcelain, RepositorySummary};
use crate::core::config::{DEFAULT_REMOTE, GIT_OPERATION_TIMEOUT_SECS};
use crate::error::{RepoError, RepoResult};
use crate::utils::collapse_message;

// Git command arguments
const GIT_STATUS_ARGS: &[&str] = &[
    "status",
    "--porcelain=v1",
    "-z",
    "--branch",
    "--untracked-files=all",
];
const GIT_REMOTE_URL_ARGS: &[&str] = &["config", "--get", "remote.origin.url"];
const GIT_HEAD_EXISTS_ARGS: &[&str] = &["rev-parse", "--verify", "--quiet", "HEAD"];
const GIT_UPSTREAM_ARGS: &[&str] = &[
    "rev-parse",
    "--abbrev-ref",
    "--symbolic-full-name",
    "@{upstream}",
];
const GIT_AHEAD_ARGS: &[&str] = &["rev-list", "--count", "@{upstream}..HEAD"];
const GIT_BRANCH_LIST_ARGS: &[&str] = &["branch", "--all", "--format=%(HEAD)|%(refname)"];
const GIT_REMOTE_BRANCHES_ARGS: &[&str] = &[
    "for-each-ref",
    "--format=%(refname:short)",
    "refs/remotes",
];

// Token handed to git through the environment, never on the command line
const TOKEN_ENV: &str = "REPODECK_GIT_TOKEN";
const TOKEN_CREDENTIAL_HELPER: &str =
    "credential.helper=!f() { echo username=x-access-token; echo \"password=${REPODECK_GIT_TOKEN}\"; }; f";

// Status messages
const STATUS_UP_TO_DATE: &str = "up to date";
const STATUS_ALREADY_UP_TO_DATE: &str = "already up to date";

/// Environment applied to every git invocation. Pathspecs are literal so a
/// file named `*.md` never expands to other files.
const GIT_ENV: &[(&str, &str)] = &[
    ("GIT_TERMINAL_PROMPT", "0"),
    ("GCM_INTERACTIVE", "never"),
    ("GIT_LITERAL_PATHSPECS", "1"),
    ("LC_ALL", "C"),
];

/// Runs a git command in the specified directory with the default timeout
/// Returns (success, stdout, stderr)
pub async fn run_git(path: &Path, args: &[&str]) -> RepoResult<(bool, String, String)> {
    run_git_with(
        path,
        args,
        &[],
        Duration::from_secs(GIT_OPERATION_TIMEOUT_SECS),
        args.first().copied().unwrap_or("git"),
    )
    .await
}

/// Runs a git command with extra environment variables and an explicit timeout.
/// The child is killed if the timeout elapses.
pub async fn run_git_with(
    path: &Path,
    args: &[&str],
    envs: &[(&str, &str)],
    timeout: Duration,
    operation: &str,
) -> RepoResult<(bool, String, String)> {
    trace!(path = %path.display(), ?args, "git");

    let mut command = Command::new("git");
    command
        .args(args)
        .current_dir(path)
        .kill_on_drop(true)
        .envs(GIT_ENV.iter().copied())
        .envs(envs.iter().copied());

    match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => Ok((
            output.status.success(),
            String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        )),
        Ok(Err(e)) => Err(RepoError::failed(format!("failed to run git: {e}"))),
        Err(_) => Err(RepoError::Timeout {
            operation: operation.to_string(),
            seconds: timeout.as_secs(),
        }),
    }
}

/// Maps git's failure output onto the error taxonomy
pub(crate) fn classify_failure(operation: &str, stdout: &str, stderr: &str) -> RepoError {
    let combined = format!("{stderr}\n{stdout}");
    let lower = combined.to_lowercase();
    let detail = collapse_message(if stderr.is_empty() { stdout } else { stderr });

    if lower.contains("would be overwritten by")
        || lower.contains("please commit your changes or stash them")
    {
        RepoError::DirtyWorkingTree
    } else if lower.contains("automatic merge failed")
        || lower.contains("merge conflict")
        || (lower.contains("conflict") && lower.contains("merge"))
    {
        RepoError::MergeConflict(collapse_message(&combined))
    } else if lower.contains("non-fast-forward")
        || lower.contains("[rejected]")
        || lower.contains("fetch first")
        || lower.contains("not possible to fast-forward")
    {
        RepoError::NonFastForward(detail)
    } else if lower.contains("authentication failed")
        || lower.contains("could not read username")
        || lower.contains("could not read password")
        || lower.contains("permission denied (publickey)")
        || lower.contains("invalid username or password")
        || lower.contains("terminal prompts disabled")
        || lower.contains("returned error: 401")
        || lower.contains("returned error: 403")
    {
        RepoError::AuthFailed(detail)
    } else if lower.contains("nothing to commit") || lower.contains("no changes added to commit") {
        RepoError::NothingToCommit
    } else {
        RepoError::failed(format!("{operation} failed: {detail}"))
    }
}

fn reject_option_like(kind: &str, value: &str) -> RepoResult<()> {
    if value.trim().is_empty() {
        return Err(RepoError::InvalidInput(format!("{kind} must not be empty")));
    }
    if value.starts_with('-') {
        return Err(RepoError::InvalidInput(format!("{kind} must not start with '-': {value}")));
    }
    Ok(())
}

/// [`GitBackend`] that runs the `git` binary as a subprocess
#[derive(Debug, Clone)]
pub struct ShellGit {
    timeout: Duration,
}

impl Default for ShellGit {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(GIT_OPERATION_TIMEOUT_SECS),
        }
    }
}

impl ShellGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeout for local (non-network) git commands
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn git(
        &self,
        path: &Path,
        args: &[&str],
        operation: &str,
    ) -> RepoResult<(bool, String, String)> {
        run_git_with(path, args, &[], self.timeout, operation).await
    }

    /// Runs a git command that must succeed, returning stdout
    async fn git_ok(&self, path: &Path, args: &[&str], operation: &str) -> RepoResult<String> {
        let (success, stdout, stderr) = self.git(path, args, operation).await?;
        if success {
            Ok(stdout)
        } else {
            Err(classify_failure(operation, &stdout, &stderr))
        }
    }

    async fn has_head(&self, path: &Path) -> RepoResult<bool> {
        Ok(self.git(path, GIT_HEAD_EXISTS_ARGS, "rev-parse").await?.0)
    }

    async fn upstream(&self, path: &Path) -> RepoResult<Option<String>> {
        let (success, stdout, _) = self.git(path, GIT_UPSTREAM_ARGS, "rev-parse").await?;
        Ok(if success && !stdout.is_empty() {
            Some(stdout)
        } else {
            None
        })
    }

    async fn is_tracked(&self, path: &Path, file: &str) -> RepoResult<bool> {
        let (tracked, _, _) = self
            .git(path, &["ls-files", "--error-unmatch", "--", file], "ls-files")
            .await?;
        Ok(tracked)
    }

    async fn local_branch_exists(&self, path: &Path, branch: &str) -> RepoResult<bool> {
        let reference = format!("refs/heads/{branch}");
        let (exists, _, _) = self
            .git(path, &["show-ref", "--verify", "--quiet", &reference], "show-ref")
            .await?;
        Ok(exists)
    }

    /// Finds the remote-tracking ref for `branch`, preferring `origin`
    async fn remote_branch(&self, path: &Path, branch: &str) -> RepoResult<Option<String>> {
        let refs = self
            .git_ok(path, GIT_REMOTE_BRANCHES_ARGS, "for-each-ref")
            .await?;
        let candidates: Vec<&str> = refs
            .lines()
            .map(str::trim)
            .filter(|r| !r.ends_with("/HEAD"))
            .collect();

        if candidates.contains(&branch) && branch.contains('/') {
            return Ok(Some(branch.to_string()));
        }
        let preferred = format!("{DEFAULT_REMOTE}/{branch}");
        if candidates.contains(&preferred.as_str()) {
            return Ok(Some(preferred));
        }
        let suffix = format!("/{branch}");
        Ok(candidates
            .into_iter()
            .find(|r| r.ends_with(&suffix))
            .map(str::to_string))
    }

    fn credential_args(
        options: &RemoteOptions,
    ) -> (Vec<&'static str>, Vec<(&'static str, String)>) {
        match &options.credentials.token {
            Some(token) => (
                vec!["-c", "credential.helper=", "-c", TOKEN_CREDENTIAL_HELPER],
                vec![(TOKEN_ENV, token.clone())],
            ),
            None => (Vec::new(), Vec::new()),
        }
    }

    async fn run_remote(
        &self,
        path: &Path,
        options: &RemoteOptions,
        prefix: &[&str],
        args: &[&str],
        operation: &str,
    ) -> RepoResult<(bool, String, String)> {
        let (credential_args, envs) = Self::credential_args(options);
        let mut full_args: Vec<&str> = credential_args;
        full_args.extend_from_slice(prefix);
        full_args.extend_from_slice(args);
        let envs: Vec<(&str, &str)> = envs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        run_git_with(path, &full_args, &envs, options.timeout, operation).await
    }
}

#[async_trait]
impl GitBackend for ShellGit {
    async fn remote_url(&self, path: &Path) -> RepoResult<Option<String>> {
        let (success, url, _) = self.git(path, GIT_REMOTE_URL_ARGS, "config").await?;
        Ok(if success && !url.trim().is_empty() {
            Some(url.trim().to_string())
        } else {
            None
        })
    }

    async fn status(&self, path: &Path) -> RepoResult<RepositorySummary> {
        let output = self.git_ok(path, GIT_STATUS_ARGS, "status").await?;
        let (header, elements) = parse_porcelain(&output);
        let remote_url = self.remote_url(path).await?;

        Ok(RepositorySummary {
            elements,
            branch: header.branch,
            upstream: header.upstream,
            ahead: header.ahead,
            behind: header.behind,
            remote_url,
        })
    }

    async fn is_known_path(&self, path: &Path, file: &str) -> RepoResult<bool> {
        if std::fs::symlink_metadata(path.join(file)).is_ok() {
            return Ok(true);
        }
        if self.is_tracked(path, file).await? {
            return Ok(true);
        }
        // Staged deletions are gone from both the tree and the index
        if self.has_head(path).await? {
            let object = format!("HEAD:{file}");
            let (in_head, _, _) = self.git(path, &["cat-file", "-e", &object], "cat-file").await?;
            return Ok(in_head);
        }
        Ok(false)
    }

    async fn stage(&self, path: &Path, file: &str) -> RepoResult<()> {
        let (success, stdout, stderr) = self.git(path, &["add", "--", file], "stage").await?;
        if success {
            return Ok(());
        }
        if stderr.contains("did not match any files") {
            return Err(RepoError::file_not_found(file));
        }
        Err(classify_failure("stage", &stdout, &stderr))
    }

    async fn unstage(&self, path: &Path, file: &str) -> RepoResult<()> {
        let args = if self.has_head(path).await? {
            vec!["restore", "--staged", "--", file]
        } else {
            // Unborn branch: nothing to restore from, just drop it from the index
            vec!["rm", "--cached", "--quiet", "--", file]
        };
        let (success, stdout, stderr) = self.git(path, &args, "unstage").await?;
        if success {
            return Ok(());
        }
        if stderr.contains("did not match any file") {
            return Err(RepoError::file_not_found(file));
        }
        Err(classify_failure("unstage", &stdout, &stderr))
    }

    async fn commit(&self, path: &Path, message: &str, author: &Signature) -> RepoResult<String> {
        let name = format!("user.name={}", author.name);
        let email = format!("user.email={}", author.email);
        self.git_ok(
            path,
            &["-c", &name, "-c", &email, "commit", "--quiet", "-m", message],
            "commit",
        )
        .await?;
        let head = self.git_ok(path, &["rev-parse", "HEAD"], "rev-parse").await?;
        Ok(head.trim().to_string())
    }

    async fn checkout(&self, path: &Path, branch: &str, force: bool) -> RepoResult<()> {
        reject_option_like("branch name", branch)?;

        let mut args = vec!["checkout", "--quiet"];
        if force {
            args.push("--force");
        }

        if self.local_branch_exists(path, branch).await? {
            args.push(branch);
            self.git_ok(path, &args, "checkout").await?;
            return Ok(());
        }

        let Some(remote_ref) = self.remote_branch(path, branch).await? else {
            return Err(RepoError::BranchNotFound(branch.to_string()));
        };
        let local = remote_ref
            .split_once('/')
            .map_or(remote_ref.as_str(), |(_, rest)| rest)
            .to_string();

        if self.local_branch_exists(path, &local).await? {
            args.push(&local);
        } else {
            debug!(path = %path.display(), %remote_ref, %local, "creating tracking branch");
            args.extend(["-b", local.as_str(), "--track", remote_ref.as_str()]);
        }
        self.git_ok(path, &args, "checkout").await?;
        Ok(())
    }

    async fn branches(&self, path: &Path) -> RepoResult<Vec<BranchInfo>> {
        let output = self.git_ok(path, GIT_BRANCH_LIST_ARGS, "branch").await?;
        let mut branches = Vec::new();

        for line in output.lines() {
            let Some((head, refname)) = line.split_once('|') else {
                continue;
            };
            let (name, is_remote) = if let Some(name) = refname.strip_prefix("refs/heads/") {
                (name, false)
            } else if let Some(name) = refname.strip_prefix("refs/remotes/") {
                (name, true)
            } else {
                continue; // detached HEAD pseudo-entry
            };
            if is_remote && name.ends_with("/HEAD") {
                continue;
            }
            branches.push(BranchInfo {
                name: name.to_string(),
                is_remote,
                is_current: head.trim() == "*",
            });
        }

        Ok(branches)
    }

    async fn push(&self, path: &Path, options: &RemoteOptions) -> RepoResult<String> {
        let summary = self.status(path).await?;
        let Some(branch) = summary.branch else {
            return Err(RepoError::failed("push failed: detached HEAD"));
        };

        if self.upstream(path).await?.is_none() {
            let (success, stdout, stderr) = self
                .run_remote(path, options, &[], &["push", "-u", DEFAULT_REMOTE, "HEAD"], "push")
                .await?;
            return if success {
                Ok(format!("set upstream {DEFAULT_REMOTE}/{branch} & pushed"))
            } else {
                Err(classify_failure("push", &stdout, &stderr))
            };
        }

        let ahead: u32 = match self.git(path, GIT_AHEAD_ARGS, "rev-list").await? {
            (true, count, _) => count.trim().parse().unwrap_or(0),
            _ => 0,
        };
        if ahead == 0 {
            return Ok(STATUS_UP_TO_DATE.to_string());
        }

        let (success, stdout, stderr) = self
            .run_remote(path, options, &[], &["push"], "push")
            .await?;
        if success {
            let commits_word = if ahead == 1 { "commit" } else { "commits" };
            Ok(format!("{ahead} {commits_word} pushed"))
        } else {
            Err(classify_failure("push", &stdout, &stderr))
        }
    }

    async fn pull(
        &self,
        path: &Path,
        options: &RemoteOptions,
        committer: &Signature,
    ) -> RepoResult<String> {
        if self.upstream(path).await?.is_none() {
            return Err(RepoError::failed("pull failed: no upstream configured"));
        }

        let name = format!("user.name={}", committer.name);
        let email = format!("user.email={}", committer.email);
        let (success, stdout, stderr) = self
            .run_remote(
                path,
                options,
                &["-c", &name, "-c", &email],
                &["pull", "--no-rebase", "--no-edit"],
                "pull",
            )
            .await?;

        if !success {
            return Err(classify_failure("pull", &stdout, &stderr));
        }
        if stdout.to_lowercase().contains("already up to date") {
            Ok(STATUS_ALREADY_UP_TO_DATE.to_string())
        } else {
            Ok("pulled".to_string())
        }
    }

    async fn diff(&self, path: &Path, file: &str, staged: bool) -> RepoResult<String> {
        if !staged && !self.is_tracked(path, file).await? && path.join(file).is_file() {
            // Untracked: show the whole file as an addition.
            // --no-index exits 1 when the inputs differ.
            let (_, stdout, stderr) = self
                .git(path, &["diff", "--no-index", "--", "/dev/null", file], "diff")
                .await?;
            if stdout.is_empty() && !stderr.is_empty() {
                return Err(classify_failure("diff", &stdout, &stderr));
            }
            return Ok(stdout);
        }

        let args = if staged {
            vec!["diff", "--cached", "--", file]
        } else {
            vec!["diff", "--", file]
        };
        self.git_ok(path, &args, "diff").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_non_fast_forward() {
        let stderr = " ! [rejected]        main -> main (fetch first)\nerror: failed to push some refs";
        assert!(matches!(
            classify_failure("push", "", stderr),
            RepoError::NonFastForward(_)
        ));
    }

    #[test]
    fn test_classify_auth() {
        let stderr = "fatal: could not read Username for 'https://github.com': terminal prompts disabled";
        assert!(matches!(classify_failure("push", "", stderr), RepoError::AuthFailed(_)));
    }

    #[test]
    fn test_classify_conflict_from_stdout() {
        let stdout = "Auto-merging f.txt\nCONFLICT (content): Merge conflict in f.txt\nAutomatic merge failed; fix conflicts and then commit the result.";
        assert!(matches!(
            classify_failure("pull", stdout, ""),
            RepoError::MergeConflict(_)
        ));
    }

    #[test]
    fn test_classify_dirty_tree() {
        let stderr = "error: Your local changes to the following files would be overwritten by checkout:\n\tf.txt";
        assert_eq!(classify_failure("checkout", "", stderr), RepoError::DirtyWorkingTree);
    }

    #[test]
    fn test_classify_nothing_to_commit() {
        let stdout = "On branch main\nnothing to commit, working tree clean";
        assert_eq!(classify_failure("commit", stdout, ""), RepoError::NothingToCommit);
    }

    #[test]
    fn test_classify_fallback_keeps_message() {
        let err = classify_failure("diff", "", "fatal: bad revision 'nope'");
        assert_eq!(err, RepoError::failed("diff failed: fatal: bad revision 'nope'"));
    }

    #[test]
    fn test_classify_keeps_long_messages() {
        let stderr = "error: pathspec 'feature/very-long-branch-name-for-a-release' did not match any file(s) known to git";
        let err = classify_failure("checkout", "", stderr);
        assert_eq!(err, RepoError::failed(format!("checkout failed: {stderr}")));
    }

    #[test]
    fn test_option_like_names_rejected() {
        assert!(reject_option_like("branch name", "--orphan").is_err());
        assert!(reject_option_like("branch name", " ").is_err());
        assert!(reject_option_like("branch name", "feature/x").is_ok());
    }

    #[test]
    fn test_token_only_travels_in_env() {
        let options = RemoteOptions {
            credentials: crate::git::Credentials::token("ghp_secret"),
            timeout: Duration::from_secs(5),
        };
        let (args, envs) = ShellGit::credential_args(&options);
        assert!(args.iter().all(|a| !a.contains("ghp_secret")));
        assert_eq!(envs, vec![(TOKEN_ENV, "ghp_secret".to_string())]);
    }

    #[tokio::test]
    async fn test_run_git_reports_failure_without_error() {
        if !which_git() {
            eprintln!("Git not available, skipping test");
            return;
        }
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let (success, _, stderr) = run_git(temp_dir.path(), &["rev-parse", "HEAD"])
            .await
            .expect("git should run");
        assert!(!success);
        assert!(!stderr.is_empty());
    }

    fn which_git() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}
