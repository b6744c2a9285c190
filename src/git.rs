//! Thin wrapper over the `git` command line for revision inspection.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::debug;

/// Runs `git` against a repository, by default the one in the current
/// working directory.
#[derive(Debug, Clone)]
pub struct Git {
    program: String,
    work_dir: Option<PathBuf>,
}

impl Git {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            work_dir: None,
        }
    }

    /// Run git inside `dir` instead of the current working directory.
    ///
    /// Changed files are then reported joined onto `dir`.
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Files touched by the most recent commit.
    ///
    /// Paths are relative to the repository root, or joined onto the
    /// directory given to [`Git::in_dir`].
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be run or there is no previous revision.
    pub async fn changed_files(&self) -> Result<Vec<PathBuf>> {
        let stdout = self.run(&["diff", "--name-only", "HEAD~1", "HEAD"]).await?;

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| match &self.work_dir {
                Some(dir) => dir.join(line),
                None => PathBuf::from(line),
            })
            .collect())
    }

    /// Contents of `path` as of the previous revision.
    ///
    /// # Errors
    ///
    /// Returns an error if the file did not exist in the previous revision.
    pub async fn previous_contents(&self, path: &Path) -> Result<String> {
        let relative = self
            .work_dir
            .as_deref()
            .and_then(|dir| path.strip_prefix(dir).ok())
            .unwrap_or(path);
        let spec = format!("HEAD~1:{}", relative.to_string_lossy());
        self.run(&["show", &spec]).await
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        debug!(program = %self.program, ?args, "Running git");

        let mut command = Command::new(&self.program);
        if let Some(dir) = &self.work_dir {
            command.current_dir(dir);
        }

        let output = command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git {} failed: {}", args.join(" "), stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_error() {
        let git = Git::new("definitely-not-a-git-binary");
        assert!(git.changed_files().await.is_err());
    }
}
