//! Parsing of git log output into structured commit records.
//!
//! Log text is split on commit-boundary markers (a line starting with
//! `commit `). Each block carries a header (id, author, date), then a blank
//! line, the comment section, another blank line, and the per-file change
//! lines produced by `--name-status`.
//!
//! [`LogStreamParser`] performs the same split incrementally over raw output
//! chunks, so a long history can be consumed while the command is still
//! running, without buffering the whole stream.

use std::collections::BTreeMap;

use chrono::DateTime;
use tracing::{debug, warn};

use quire_types::{ChangeStatus, Version};

/// One parsed commit from the backing log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitRecord {
    pub version_id: String,
    /// Milliseconds since the UNIX epoch, UTC.
    pub timestamp: i64,
    pub author: String,
    pub comment: Vec<String>,
    /// Raw per-file change lines (`<status>\t<path>`).
    pub data: Vec<String>,
}

impl CommitRecord {
    pub fn version(&self) -> Version {
        Version::new(&self.version_id, self.timestamp, &self.author)
    }
}

/// Parse a complete log text into its commit records, oldest first when the
/// log was produced with `--reverse`.
pub fn parse_commit_log(text: &str) -> Vec<CommitRecord> {
    let mut records = Vec::new();
    let mut parser = LogStreamParser::new();
    parser.push(text.as_bytes(), &mut |record| records.push(record));
    parser.finish(&mut |record| records.push(record));
    records
}

/// Parse one commit block. Returns `None` when the block carries no usable
/// commit header (id and date are required).
pub fn parse_commit_record(block: &str) -> Option<CommitRecord> {
    let mut version_id: Option<String> = None;
    let mut author: Option<String> = None;
    let mut timestamp: Option<i64> = None;
    let mut comment: Vec<String> = Vec::new();
    let mut data: Vec<String> = Vec::new();

    // Section 0 is the header; the first blank line opens the comment
    // section, the second opens the data section. Later blanks are skipped.
    let mut section = 0u8;
    for raw in block.lines() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if section == 0 {
            if line.trim().is_empty() {
                section = 1;
            } else if let Some(rest) = line.strip_prefix("commit ") {
                version_id = rest.split_whitespace().next().map(str::to_string);
            } else if let Some(rest) = line.strip_prefix("Author:") {
                author = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("Date:") {
                timestamp = parse_git_date(rest.trim());
            }
            // Other headers (Merge:, Commit:, ...) carry nothing we track.
            continue;
        }
        if line.trim().is_empty() {
            if section == 1 {
                section = 2;
            }
            continue;
        }
        let trimmed = line.trim().to_string();
        if section == 1 {
            comment.push(trimmed);
        } else {
            data.push(trimmed);
        }
    }

    let version_id = version_id?;
    let Some(timestamp) = timestamp else {
        warn!(%version_id, "skipping commit with unparseable date");
        return None;
    };
    Some(CommitRecord {
        version_id,
        timestamp,
        author: author.unwrap_or_default(),
        comment,
        data,
    })
}

/// Extract `path -> status` from one commit's change lines.
///
/// Each line is tab-separated; the status is the last character of the first
/// field, so both `--name-status` lines and raw `whatchanged` lines parse.
/// Unknown markers are skipped without touching the result.
pub fn parse_changed_files(data_lines: &[String]) -> BTreeMap<String, ChangeStatus> {
    let mut files = BTreeMap::new();
    for line in data_lines {
        let mut parts = line.splitn(2, '\t');
        let status_field = parts.next().unwrap_or_default();
        let Some(path) = parts.next() else {
            continue;
        };
        let Some(marker) = status_field.chars().last() else {
            continue;
        };
        match ChangeStatus::from_marker(marker) {
            Some(status) => {
                files.insert(path.to_string(), status);
            }
            None => debug!(%marker, %path, "skipping unrecognized change status"),
        }
    }
    files
}

fn parse_git_date(text: &str) -> Option<i64> {
    // `--date=iso-strict` is RFC 3339; the space-separated `--date=iso`
    // shape is accepted as a fallback.
    DateTime::parse_from_rfc3339(text)
        .ok()
        .or_else(|| DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S %z").ok())
        .map(|dt| dt.timestamp_millis())
}

/// Incremental splitter for streamed log output.
///
/// Bytes are buffered until a full commit block (delimited by the next
/// `commit ` line start) is available, then the block is parsed and emitted.
/// Working on bytes keeps chunk boundaries inside multi-byte characters from
/// corrupting the text.
#[derive(Debug, Default)]
pub struct LogStreamParser {
    buf: Vec<u8>,
}

impl LogStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of raw output, emitting every block it completes.
    pub fn push(&mut self, chunk: &[u8], on_commit: &mut dyn FnMut(CommitRecord)) {
        self.buf.extend_from_slice(chunk);
        loop {
            let Some(start) = find_boundary(&self.buf, 0) else {
                return;
            };
            let Some(next) = find_boundary(&self.buf, start + 1) else {
                return;
            };
            let block = String::from_utf8_lossy(&self.buf[start..next]).into_owned();
            self.buf.drain(..next);
            if let Some(record) = parse_commit_record(&block) {
                on_commit(record);
            }
        }
    }

    /// Flush the trailing block once the stream has ended.
    pub fn finish(mut self, on_commit: &mut dyn FnMut(CommitRecord)) {
        if let Some(start) = find_boundary(&self.buf, 0) {
            let block = String::from_utf8_lossy(&self.buf[start..]).into_owned();
            self.buf.clear();
            if let Some(record) = parse_commit_record(&block) {
                on_commit(record);
            }
        }
    }
}

/// Position of the next `commit ` found at a line start, at or after `from`.
fn find_boundary(buf: &[u8], from: usize) -> Option<usize> {
    const NEEDLE: &[u8] = b"commit ";
    let mut i = from;
    while i + NEEDLE.len() <= buf.len() {
        if (i == 0 || buf[i - 1] == b'\n') && &buf[i..i + NEEDLE.len()] == NEEDLE {
            return Some(i);
        }
        match buf[i..].iter().position(|&b| b == b'\n') {
            Some(newline) => i += newline + 1,
            None => return None,
        }
    }
    None
}
