//! Git collaborators: ref resolution and single-file downloads.
//!
//! Build de-duplication needs the commit hash a repository ref currently
//! points at, and git-hosted tool configs need one committed file fetched.
//! Both shell out to the `git` binary; tests swap the resolver through its
//! trait.

use async_trait::async_trait;
use tokio::process::Command;

use crate::ports::RuntimeError;

/// Resolves a git ref in a remote repository to a commit hash.
#[async_trait]
pub trait RefResolver: Send + Sync {
    /// `Ok("")` means the remote could not be queried at all; callers treat
    /// that as "no match possible" rather than an error.
    async fn resolve(&self, repository: &str, git_ref: &str) -> Result<String, RuntimeError>;
}

/// Resolver backed by the `git` binary.
#[derive(Debug, Default, Clone)]
pub struct GitCliResolver;

#[async_trait]
impl RefResolver for GitCliResolver {
    async fn resolve(&self, repository: &str, git_ref: &str) -> Result<String, RuntimeError> {
        tracing::debug!(repository, git_ref, "Resolving git ref");

        let output = Command::new("git")
            .arg("ls-remote")
            .arg(repository)
            .arg(git_ref)
            .output()
            .await
            .map_err(|error| RuntimeError::Transport(format!("unable to run git: {error}")))?;

        if !output.status.success() {
            tracing::error!(
                repository,
                git_ref,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "git ls-remote failed"
            );
            return Ok(String::new());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.split_whitespace().next() {
            Some(commit) => {
                tracing::debug!(repository, git_ref, commit, "Resolved git ref");
                Ok(commit.to_string())
            }
            None => Err(RuntimeError::RefResolution(format!(
                "Failed to resolve ref '{git_ref}' for repository '{repository}', does it exist?"
            ))),
        }
    }
}

/// The file a git-hosted tool config lives in.
pub const GIT_CONFIG_FILENAME: &str = "toolforge.yaml";

/// Downloads a single file from a remote git repository.
///
/// Works through a throwaway bare repository so only one shallow fetch ever
/// hits the remote: init, add the remote, fetch the wanted ref (or resolve
/// the remote default branch), then `git show` the file.
#[derive(Debug, Clone)]
pub struct GitFileFetcher {
    workdir_root: std::path::PathBuf,
}

impl GitFileFetcher {
    /// `workdir_root` must be writable; one subdirectory per fetch is
    /// created and removed inside it.
    pub fn new(workdir_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            workdir_root: workdir_root.into(),
        }
    }

    /// Fetch `file` from `repository`, at `git_ref` or the remote's default
    /// branch when unset.
    pub async fn fetch_file(
        &self,
        repository: &str,
        file: &str,
        git_ref: Option<&str>,
    ) -> Result<String, RuntimeError> {
        let workdir = self
            .workdir_root
            .join(format!("config-fetch-{}", uuid::Uuid::new_v4().simple()));
        std::fs::create_dir_all(&workdir)
            .map_err(|error| RuntimeError::Transport(format!("unable to create workdir: {error}")))?;

        let result = self.fetch_in(&workdir, repository, file, git_ref).await;

        if let Err(error) = std::fs::remove_dir_all(&workdir) {
            tracing::warn!(workdir = %workdir.display(), %error, "Unable to clean up fetch workdir");
        }
        result
    }

    async fn fetch_in(
        &self,
        workdir: &std::path::Path,
        repository: &str,
        file: &str,
        git_ref: Option<&str>,
    ) -> Result<String, RuntimeError> {
        run_git(workdir, &["init", "--bare"]).await?;
        run_git(workdir, &["remote", "add", "origin", repository]).await?;

        let branch = match git_ref {
            Some(git_ref) => {
                run_git(workdir, &["fetch", "--depth=1", "origin", git_ref]).await?;
                git_ref.to_string()
            }
            None => {
                run_git(workdir, &["fetch", "--depth=1", "origin"]).await?;
                run_git(workdir, &["remote", "set-head", "origin", "--auto"]).await?;
                let head =
                    run_git(workdir, &["symbolic-ref", "refs/remotes/origin/HEAD"]).await?;
                head.trim()
                    .rsplit('/')
                    .next()
                    .unwrap_or("HEAD")
                    .to_string()
            }
        };

        let spec = format!("origin/{branch}:{file}");
        let output = Command::new("git")
            .arg("show")
            .arg(&spec)
            .current_dir(workdir)
            .output()
            .await
            .map_err(|error| RuntimeError::Transport(format!("unable to run git: {error}")))?;
        if !output.status.success() {
            return Err(RuntimeError::Transport(format!(
                "git failed to show '{file}' for ref 'origin/{branch}' in remote '{repository}'"
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

async fn run_git(workdir: &std::path::Path, args: &[&str]) -> Result<String, RuntimeError> {
    tracing::debug!(workdir = %workdir.display(), ?args, "Running git");
    let output = Command::new("git")
        .args(args)
        .current_dir(workdir)
        .output()
        .await
        .map_err(|error| RuntimeError::Transport(format!("unable to run git: {error}")))?;

    if !output.status.success() {
        return Err(RuntimeError::Transport(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn git_available() -> bool {
        StdCommand::new("git")
            .arg("version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn empty_repository_has_no_refs() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let status = StdCommand::new("git")
            .arg("init")
            .arg("--bare")
            .arg(dir.path())
            .output()
            .unwrap();
        assert!(status.status.success());

        let resolver = GitCliResolver;
        let result = resolver
            .resolve(dir.path().to_str().unwrap(), "main")
            .await;
        match result {
            Err(RuntimeError::RefResolution(message)) => {
                assert!(message.contains("does it exist?"));
            }
            other => panic!("expected RefResolution error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_repository_resolves_to_empty() {
        if !git_available() {
            return;
        }
        let resolver = GitCliResolver;
        let resolved = resolver
            .resolve("/definitely/not/a/repository", "main")
            .await
            .unwrap();
        assert_eq!(resolved, "");
    }

    /// Build a local repository with one committed file to fetch from.
    fn seed_repository(dir: &std::path::Path, file: &str, content: &str) -> bool {
        let run = |args: &[&str]| {
            StdCommand::new("git")
                .args(["-c", "user.name=test", "-c", "user.email=test@example.org"])
                .args(args)
                .current_dir(dir)
                .output()
                .map(|out| out.status.success())
                .unwrap_or(false)
        };
        if !run(&["init", "--initial-branch=main"]) {
            return false;
        }
        std::fs::write(dir.join(file), content).unwrap();
        run(&["add", "."]) && run(&["commit", "-m", "seed"])
    }

    #[tokio::test]
    async fn fetches_a_file_from_an_explicit_branch() {
        if !git_available() {
            return;
        }
        let source = tempfile::tempdir().unwrap();
        if !seed_repository(source.path(), GIT_CONFIG_FILENAME, "config_version: v1beta1\n") {
            return;
        }

        let workdir = tempfile::tempdir().unwrap();
        let fetcher = GitFileFetcher::new(workdir.path());
        // file:// keeps the fetch on the real transport so --depth applies
        let content = fetcher
            .fetch_file(
                &format!("file://{}", source.path().display()),
                GIT_CONFIG_FILENAME,
                Some("main"),
            )
            .await
            .unwrap();
        assert_eq!(content, "config_version: v1beta1\n");
    }

    #[tokio::test]
    async fn missing_file_fails_with_the_show_spec() {
        if !git_available() {
            return;
        }
        let source = tempfile::tempdir().unwrap();
        if !seed_repository(source.path(), GIT_CONFIG_FILENAME, "config_version: v1beta1\n") {
            return;
        }

        let workdir = tempfile::tempdir().unwrap();
        let fetcher = GitFileFetcher::new(workdir.path());
        let result = fetcher
            .fetch_file(
                &format!("file://{}", source.path().display()),
                "does-not-exist.yaml",
                Some("main"),
            )
            .await;
        match result {
            Err(RuntimeError::Transport(message)) => {
                assert!(message
                    .contains("git failed to show 'does-not-exist.yaml' for ref 'origin/main'"));
            }
            other => panic!("expected Transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_repository_fails_the_fetch() {
        if !git_available() {
            return;
        }
        let workdir = tempfile::tempdir().unwrap();
        let fetcher = GitFileFetcher::new(workdir.path());
        let result = fetcher
            .fetch_file("/definitely/not/a/repository", GIT_CONFIG_FILENAME, None)
            .await;
        assert!(result.is_err());
    }
}
