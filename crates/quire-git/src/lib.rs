//! Git command execution and commit-log parsing for the quire content store.
//!
//! The store treats git as an external tool: every repository operation is a
//! spawned `git` subprocess with captured (or streamed) output, and history
//! is recovered by parsing `git log` text into structured commit records.
//!
//! # Key Types
//!
//! - [`GitRunner`] — spawns git against a working directory with a timeout
//! - [`CommandOutput`] — exit code plus captured stdout chunks
//! - [`CommitOutcome`] — distinguishes a real commit from "nothing to commit"
//! - [`CommitRecord`] — one parsed commit: version info, comment, change lines
//! - [`LogStreamParser`] — incremental splitter for streamed log output

pub mod error;
pub mod log;
pub mod runner;

pub use error::{GitError, GitResult};
pub use log::{parse_changed_files, parse_commit_log, CommitRecord, LogStreamParser};
pub use runner::{CommandOutput, CommitOutcome, GitRunner};
