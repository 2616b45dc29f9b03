//! Spawning git against a working directory.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{GitError, GitResult};
use crate::log::{CommitRecord, LogStreamParser};

/// Result of one executed command: exit code plus captured stdout chunks.
#[derive(Clone, Debug, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: Vec<Bytes>,
}

impl CommandOutput {
    /// The captured stdout joined into one string (lossy on invalid UTF-8).
    pub fn text(&self) -> String {
        let mut joined = Vec::with_capacity(self.stdout.iter().map(Bytes::len).sum());
        for chunk in &self.stdout {
            joined.extend_from_slice(chunk);
        }
        String::from_utf8_lossy(&joined).into_owned()
    }
}

/// Outcome of a commit attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The working tree was clean; the backend had nothing to record.
    NothingToCommit,
}

/// Executes git commands in a working directory, with a per-invocation
/// timeout. A command fails only when it exits non-zero *and* wrote to
/// stderr; warnings on stderr with a zero exit pass through.
#[derive(Clone, Debug)]
pub struct GitRunner {
    program: String,
    timeout: Duration,
}

impl GitRunner {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }

    /// Run a command, delivering each stdout chunk to `on_data` as it
    /// arrives. Returns the exit code.
    pub async fn run_streaming<F>(&self, dir: &Path, args: &[&str], mut on_data: F) -> GitResult<i32>
    where
        F: FnMut(&[u8]),
    {
        let command = self.describe(args);
        debug!(%command, dir = %dir.display(), "running");
        let mut child = Command::new(&self.program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GitError::Spawn {
                command: command.clone(),
                source,
            })?;

        let mut stdout = child.stdout.take().expect("stdout is piped");
        let mut stderr = child.stderr.take().expect("stderr is piped");

        // Drain both pipes concurrently so a full pipe can never stall the
        // child, then reap it.
        let work = async {
            let mut err_buf = Vec::new();
            let read_out = async {
                let mut chunk = [0u8; 8192];
                loop {
                    match stdout.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => on_data(&chunk[..n]),
                    }
                }
            };
            let read_err = async {
                let _ = stderr.read_to_end(&mut err_buf).await;
            };
            tokio::join!(read_out, read_err);
            (child.wait().await, err_buf)
        };
        let (status, err_buf) = match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                return Err(GitError::Timeout {
                    command,
                    timeout: self.timeout,
                })
            }
        };
        let status = status.map_err(|source| GitError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        let exit_code = status.code().unwrap_or(-1);
        let stderr_text = String::from_utf8_lossy(&err_buf).into_owned();
        if exit_code != 0 && !stderr_text.trim().is_empty() {
            return Err(GitError::Command {
                command,
                exit_code,
                stdout: String::new(),
                stderr: stderr_text,
            });
        }
        Ok(exit_code)
    }

    /// Run a command and capture its stdout. On failure the captured stdout
    /// is attached to the error, so callers can inspect what the backend
    /// printed before dying.
    pub async fn run(&self, dir: &Path, args: &[&str]) -> GitResult<CommandOutput> {
        let mut chunks: Vec<Bytes> = Vec::new();
        match self
            .run_streaming(dir, args, |data| chunks.push(Bytes::copy_from_slice(data)))
            .await
        {
            Ok(exit_code) => Ok(CommandOutput {
                exit_code,
                stdout: chunks,
            }),
            Err(GitError::Command {
                command,
                exit_code,
                stderr,
                ..
            }) => Err(GitError::Command {
                command,
                exit_code,
                stdout: CommandOutput {
                    exit_code,
                    stdout: chunks,
                }
                .text(),
                stderr,
            }),
            Err(other) => Err(other),
        }
    }

    /// Run a log command, parsing the streamed output into commit records.
    pub async fn collect_commits<F>(&self, dir: &Path, args: &[&str], mut on_commit: F) -> GitResult<()>
    where
        F: FnMut(CommitRecord),
    {
        let mut parser = LogStreamParser::new();
        self.run_streaming(dir, args, |chunk| parser.push(chunk, &mut on_commit))
            .await?;
        parser.finish(&mut on_commit);
        Ok(())
    }

    /// Commit history with per-file change lines, oldest first, optionally
    /// restricted to commits after `since`.
    pub async fn log_with_changes<F>(
        &self,
        dir: &Path,
        since: Option<&str>,
        on_commit: F,
    ) -> GitResult<()>
    where
        F: FnMut(CommitRecord),
    {
        let mut args = vec![
            "log".to_string(),
            "--name-status".to_string(),
            "--no-renames".to_string(),
            "--date=iso-strict".to_string(),
            "--reverse".to_string(),
        ];
        if let Some(since) = since {
            args.push(format!("{since}.."));
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.collect_commits(dir, &arg_refs, on_commit).await
    }

    /// Commit history for one file path, oldest first.
    pub async fn log_for_path<F>(&self, dir: &Path, file_path: &str, on_commit: F) -> GitResult<()>
    where
        F: FnMut(CommitRecord),
    {
        let args = [
            "log",
            "--date=iso-strict",
            "--no-renames",
            "--reverse",
            "--",
            file_path,
        ];
        self.collect_commits(dir, &args, on_commit).await
    }

    /// Returns `true` when the directory is under version control.
    pub async fn repository_exists(&self, dir: &Path) -> bool {
        tokio::fs::try_exists(dir.join(".git")).await.unwrap_or(false)
    }

    /// Create the directory hierarchy and initialize a repository in it.
    pub async fn init_repository(&self, dir: &Path) -> GitResult<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| GitError::Io {
                path: dir.display().to_string(),
                source,
            })?;
        self.run(dir, &["init"]).await?;
        Ok(())
    }

    /// Stage every change in the working tree.
    pub async fn add_all(&self, dir: &Path) -> GitResult<()> {
        self.run(dir, &["add", "."]).await?;
        Ok(())
    }

    /// Stage the removal of the given files.
    pub async fn remove_files(&self, dir: &Path, files: &[String]) -> GitResult<()> {
        let mut args = vec!["rm", "--"];
        args.extend(files.iter().map(String::as_str));
        self.run(dir, &args).await?;
        Ok(())
    }

    /// Commit staged and tracked changes.
    ///
    /// The committer identity is derived from the author string and passed
    /// per invocation, so commits succeed on hosts with no git identity
    /// configured. A clean working tree is the benign
    /// [`CommitOutcome::NothingToCommit`], never an error.
    pub async fn commit(&self, dir: &Path, message: &str, author: &str) -> GitResult<CommitOutcome> {
        let (name, email) = split_author(author);
        let name_cfg = format!("user.name={name}");
        let email_cfg = format!("user.email={email}");
        let author_arg = format!("--author={author}");
        let args = [
            "-c",
            name_cfg.as_str(),
            "-c",
            email_cfg.as_str(),
            "-c",
            "commit.gpgsign=false",
            "commit",
            "-a",
            "-m",
            message,
            author_arg.as_str(),
        ];
        match self.run(dir, &args).await {
            Ok(output) => {
                if output.exit_code == 0 {
                    Ok(CommitOutcome::Committed)
                } else if output.text().contains("nothing to commit") {
                    Ok(CommitOutcome::NothingToCommit)
                } else {
                    Err(GitError::Command {
                        command: self.describe(&args),
                        exit_code: output.exit_code,
                        stdout: output.text(),
                        stderr: String::new(),
                    })
                }
            }
            Err(GitError::Command { stdout, .. }) if stdout.contains("nothing to commit") => {
                Ok(CommitOutcome::NothingToCommit)
            }
            Err(err) => Err(err),
        }
    }

    /// Read a file's text content as committed at the given revision
    /// (current tip when unspecified).
    pub async fn read_file_at_revision(
        &self,
        dir: &Path,
        file_path: &str,
        revision: Option<&str>,
    ) -> GitResult<String> {
        let object = format!("{}:{}", revision.unwrap_or("HEAD"), file_path);
        let output = self.run(dir, &["show", &object]).await?;
        Ok(output.text())
    }
}

/// Split a `Name <email>` author string; degrade gracefully on free-form
/// input so the backend never sees an empty ident.
fn split_author(author: &str) -> (String, String) {
    let fallback_name = "system";
    let fallback_email = "system@system";
    match (author.find('<'), author.rfind('>')) {
        (Some(open), Some(close)) if close > open => {
            let name = author[..open].trim();
            let email = author[open + 1..close].trim();
            (
                if name.is_empty() { fallback_name } else { name }.to_string(),
                if email.is_empty() { fallback_email } else { email }.to_string(),
            )
        }
        _ => {
            let name = author.trim();
            (
                if name.is_empty() { fallback_name } else { name }.to_string(),
                fallback_email.to_string(),
            )
        }
    }
}
